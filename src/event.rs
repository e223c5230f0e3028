use crate::channel::{ChannelMap, DetectorId, SideId};
use crate::cluster::{clusterize, sort_by_channel, trim_unused_transients, ReadoutCluster};
use crate::condense::{Condenser, Incomplete, PulseTimer, WaveformTable};
use crate::energy::check_match;
use crate::outcome::{DetectorOutcome, Orphan, Outcome};
use crate::record::{ReadoutRecord, RecordGroup, RefinedRecord};
use crate::Config;
use std::fmt;

/// Readouts on one electrode plane of one detector, sorted by channel id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Side {
    records: Vec<ReadoutRecord>,
    // `None` until clusterized. Invalidated whenever `records` change.
    clusters: Option<Vec<ReadoutCluster>>,
}

impl Side {
    pub fn new(mut records: Vec<ReadoutRecord>) -> Self {
        sort_by_channel(&mut records);
        Self {
            records,
            clusters: None,
        }
    }

    pub fn records(&self) -> &[ReadoutRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of the ADC values of all triggered strips.
    pub fn total_energy(&self) -> f32 {
        self.records
            .iter()
            .filter(|r| r.trigger)
            .map(|r| r.adc_value)
            .sum()
    }

    /// Recompute the clusters from scratch.
    pub fn clusterize(&mut self) {
        self.clusters = Some(clusterize(&self.records));
    }

    pub fn is_clusterized(&self) -> bool {
        self.clusters.is_some()
    }

    /// Empty if the side has not been clusterized.
    pub fn clusters(&self) -> &[ReadoutCluster] {
        self.clusters.as_deref().unwrap_or_default()
    }

    /// See [`trim_unused_transients`]. Discards any previous clusters.
    pub fn trim_unused_transients(&mut self) {
        self.records = trim_unused_transients(&self.records);
        self.clusters = None;
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut starts = self.clusters().iter().scan(0, |start, cluster| {
            let current = *start;
            *start += cluster.num_strips();
            Some(current)
        });
        // The first cluster always starts at 0 and needs no separator.
        let _ = starts.next();
        let mut next_start = starts.next();

        for (i, record) in self.records.iter().enumerate() {
            if next_start == Some(i) {
                writeln!(f)?;
                next_start = starts.next();
            }
            writeln!(f, "    {record}")?;
        }
        Ok(())
    }
}

/// The AC and DC sides of one physical detector module.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Detector {
    pub ac: Side,
    pub dc: Side,
    total_energy: Option<f32>,
}

impl Detector {
    pub fn new(ac: Side, dc: Side) -> Self {
        Self {
            ac,
            dc,
            total_energy: None,
        }
    }

    pub fn side(&self, side: SideId) -> &Side {
        match side {
            SideId::Ac => &self.ac,
            SideId::Dc => &self.dc,
        }
    }

    /// Returns which side has readouts if exactly one of them is empty.
    pub fn orphan(&self) -> Option<Orphan> {
        match (self.ac.is_empty(), self.dc.is_empty()) {
            (true, false) => Some(Orphan::DcOnly),
            (false, true) => Some(Orphan::AcOnly),
            _ => None,
        }
    }

    pub fn has_orphans(&self) -> bool {
        self.orphan().is_some()
    }

    /// Check whether the AC and DC energies agree. On success the detector's
    /// total energy is set to the larger of the two; otherwise it is cleared.
    pub fn passes_energy_match(&mut self, sigma: f32) -> bool {
        let (ac, dc) = (self.ac.total_energy(), self.dc.total_energy());
        let passes = check_match(ac, dc, sigma);
        self.total_energy = passes.then(|| ac.max(dc));

        passes
    }

    /// Set only after a successful [`Detector::passes_energy_match`].
    pub fn total_energy(&self) -> Option<f32> {
        self.total_energy
    }

    /// Orphan and energy-match outcomes for this detector alone.
    pub fn check(&mut self, sigma: f32) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        if let Some(orphan) = self.orphan() {
            outcomes.push(Outcome::Orphan(orphan));
        }
        if !self.passes_energy_match(sigma) {
            outcomes.push(Outcome::EnergyMatchFailure);
        }
        outcomes
    }

    fn sides_mut(&mut self) -> [&mut Side; 2] {
        [&mut self.ac, &mut self.dc]
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  AC")?;
        write!(f, "{}", self.ac)?;
        writeln!(f, "  DC")?;
        write!(f, "{}", self.dc)
    }
}

/// Both detector modules' readouts for one candidate event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Event {
    pub ge1: Detector,
    pub ge2: Detector,
    total_energy: Option<f32>,
}

impl Event {
    /// Split records by detector and side. Records with channel ids outside
    /// the map are dropped.
    ///
    /// Trigger flags are used as they are; see [`Event::from_group`] to
    /// correct them first.
    pub fn new(records: impl IntoIterator<Item = ReadoutRecord>, map: ChannelMap) -> Self {
        let mut buckets: [Vec<ReadoutRecord>; 4] = Default::default();
        for record in records {
            let index = match map.classify(record.channel) {
                Some((DetectorId::Ge1, SideId::Ac)) => 0,
                Some((DetectorId::Ge1, SideId::Dc)) => 1,
                Some((DetectorId::Ge2, SideId::Ac)) => 2,
                Some((DetectorId::Ge2, SideId::Dc)) => 3,
                None => continue,
            };
            buckets[index].push(record);
        }
        let [ge1_ac, ge1_dc, ge2_ac, ge2_dc] = buckets;

        Self {
            ge1: Detector::new(Side::new(ge1_ac), Side::new(ge1_dc)),
            ge2: Detector::new(Side::new(ge2_ac), Side::new(ge2_dc)),
            total_energy: None,
        }
    }

    /// Build an event from a record group, correcting the trigger flags first
    /// if the configuration asks for it.
    ///
    /// # Examples
    ///
    /// ```
    /// # use strips::record::RecordGroup;
    /// # use std::str::FromStr;
    /// use strips::{event::Event, Config};
    ///
    /// let group = RecordGroup::from_str("0 100 10 0 0 0 0\n0 98 86 0 0 0 1")?;
    /// let mut event = Event::from_group(group, &Config::default());
    ///
    /// assert!(!event.has_orphans());
    /// assert!(event.passes_energy_match(2.0));
    /// assert_eq!(event.total_energy(), Some(100.0));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_group(group: RecordGroup, config: &Config) -> Self {
        let mut records = group.into_records();
        if config.refine_triggers {
            crate::record::correct_triggers(&mut records, config.trigger_threshold);
        }

        Self::new(records, config.channel_map())
    }

    pub fn detector(&self, detector: DetectorId) -> &Detector {
        match detector {
            DetectorId::Ge1 => &self.ge1,
            DetectorId::Ge2 => &self.ge2,
        }
    }

    /// Sides in the fixed order GeI AC, GeI DC, GeII AC, GeII DC.
    pub fn sides(&self) -> [&Side; 4] {
        [&self.ge1.ac, &self.ge1.dc, &self.ge2.ac, &self.ge2.dc]
    }

    fn sides_mut(&mut self) -> impl Iterator<Item = &mut Side> {
        let [ge1_ac, ge1_dc] = self.ge1.sides_mut();
        let [ge2_ac, ge2_dc] = self.ge2.sides_mut();
        [ge1_ac, ge1_dc, ge2_ac, ge2_dc].into_iter()
    }

    pub fn has_orphans(&self) -> bool {
        self.ge1.has_orphans() || self.ge2.has_orphans()
    }

    /// Both detectors are always checked, so each one's total energy is up
    /// to date afterwards. The event total is the sum of both detector totals
    /// if both pass, and cleared otherwise.
    pub fn passes_energy_match(&mut self, sigma: f32) -> bool {
        let ge1 = self.ge1.passes_energy_match(sigma);
        let ge2 = self.ge2.passes_energy_match(sigma);
        self.total_energy = match (self.ge1.total_energy, self.ge2.total_energy) {
            (Some(e1), Some(e2)) => Some(e1 + e2),
            _ => None,
        };

        ge1 && ge2
    }

    /// Set only after a successful [`Event::passes_energy_match`].
    pub fn total_energy(&self) -> Option<f32> {
        self.total_energy
    }

    /// Orphan and energy-match outcomes of both detectors. Also updates the
    /// total energies as [`Event::passes_energy_match`] does.
    pub fn check(&mut self, sigma: f32) -> Vec<DetectorOutcome> {
        let ge1 = self.ge1.check(sigma);
        let ge2 = self.ge2.check(sigma);
        self.total_energy = match (self.ge1.total_energy, self.ge2.total_energy) {
            (Some(e1), Some(e2)) => Some(e1 + e2),
            _ => None,
        };

        ge1.into_iter()
            .map(|outcome| (DetectorId::Ge1, outcome))
            .chain(ge2.into_iter().map(|outcome| (DetectorId::Ge2, outcome)))
            .map(|(detector, outcome)| DetectorOutcome { detector, outcome })
            .collect()
    }

    pub fn clusterize(&mut self) {
        self.sides_mut().for_each(Side::clusterize);
    }

    pub fn trim_unused_transients(&mut self) {
        self.sides_mut().for_each(Side::trim_unused_transients);
    }

    /// Condense the clusters of all four sides, in [`Event::sides`] order.
    ///
    /// Fails as a whole if any cluster cannot be condensed. The error lists
    /// every such cluster, not only the first.
    pub fn condense<P, W>(
        &self,
        condenser: &Condenser<'_, P, W>,
    ) -> Result<Vec<RefinedRecord>, Incomplete>
    where
        P: PulseTimer + ?Sized,
        W: WaveformTable + ?Sized,
    {
        let mut refined = Vec::new();
        let mut unsupported = Vec::new();
        for cluster in self.sides().into_iter().flat_map(Side::clusters) {
            match condenser.condense(cluster) {
                Ok(record) => refined.push(record),
                Err(error) => unsupported.push(error),
            }
        }

        if unsupported.is_empty() {
            Ok(refined)
        } else {
            Err(Incomplete { unsupported })
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", DetectorId::Ge1)?;
        write!(f, "{}", self.ge1)?;
        writeln!(f, "{}", DetectorId::Ge2)?;
        write!(f, "{}", self.ge2)
    }
}
