use crate::record::ReadoutRecord;

/// A contiguous run of strip readouts attributed to one localized charge
/// deposit.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadoutCluster {
    records: Vec<ReadoutRecord>,
}

impl ReadoutCluster {
    /// Records are (re-)sorted by channel id.
    pub fn new(mut records: Vec<ReadoutRecord>) -> Self {
        sort_by_channel(&mut records);
        Self { records }
    }

    pub fn records(&self) -> &[ReadoutRecord] {
        &self.records
    }

    /// Number of triggered strips.
    pub fn num_trigs(&self) -> usize {
        self.records.iter().filter(|r| r.trigger).count()
    }

    pub fn num_strips(&self) -> usize {
        self.records.len()
    }

    /// Trigger flags in channel order.
    pub fn trigger_pattern(&self) -> Vec<bool> {
        self.records.iter().map(|r| r.trigger).collect()
    }
}

pub(crate) fn sort_by_channel(records: &mut [ReadoutRecord]) {
    records.sort_by_key(|r| r.channel);
}

/// Start indices of every cluster in a side's sorted records.
///
/// A new cluster starts at `i + 1` whenever strips `i` and `i + 1` are both
/// untriggered and some strip after `i + 1` is triggered. Index 0 is always
/// the first start; an empty input has no clusters.
///
/// # Examples
///
/// ```
/// # use strips::record::ReadoutRecord;
/// use strips::cluster::boundaries;
///
/// let records: Vec<_> = [false, false, true, false, false, true]
///     .into_iter()
///     .enumerate()
///     .map(|(i, trigger)| ReadoutRecord {
///         timestamp: 0,
///         adc_value: if trigger { 100.0 } else { 1.0 },
///         channel: i as u16,
///         trigger,
///         pileup: false,
///         retrigger: false,
///         rid: 0,
///     })
///     .collect();
/// assert_eq!(boundaries(&records), vec![0, 1, 4]);
/// ```
pub fn boundaries(records: &[ReadoutRecord]) -> Vec<usize> {
    if records.is_empty() {
        return Vec::new();
    }
    // triggered_from[i]: some strip at position >= i is triggered.
    let mut triggered_from = vec![false; records.len() + 1];
    for i in (0..records.len()).rev() {
        triggered_from[i] = records[i].trigger || triggered_from[i + 1];
    }

    let mut starts = vec![0];
    starts.extend(
        records
            .windows(2)
            .enumerate()
            .filter(|(i, pair)| !pair[0].trigger && !pair[1].trigger && triggered_from[i + 2])
            .map(|(i, _)| i + 1),
    );

    starts
}

/// Split a side's sorted records into clusters.
///
/// The clusters cover the input exactly: concatenating them in order gives
/// back `records`.
pub fn clusterize(records: &[ReadoutRecord]) -> Vec<ReadoutCluster> {
    let starts = boundaries(records);
    starts
        .iter()
        .zip(starts.iter().skip(1).copied().chain([records.len()]))
        .map(|(&start, end)| ReadoutCluster::new(records[start..end].to_vec()))
        .collect()
}

/// Remove untriggered strips that cannot belong to any cluster.
///
/// Every rule is evaluated against the untrimmed input, and all removals are
/// applied at the end. An interior strip `i` is dropped when:
/// - it and both neighbours are untriggered, or
/// - it and its left neighbour are untriggered, its right neighbour is
///   triggered, and the right neighbour is not the adjacent channel.
///
/// The first (last) strip is dropped when it and its right (left) neighbour
/// are untriggered. Inputs with fewer than two records are returned as is.
pub fn trim_unused_transients(records: &[ReadoutRecord]) -> Vec<ReadoutRecord> {
    let len = records.len();
    if len < 2 {
        return records.to_vec();
    }
    let t = |i: usize| records[i].trigger;
    let p = |i: usize| u32::from(records[i].channel);

    let mut keep = vec![true; len];
    for i in 1..len - 1 {
        if t(i - 1) || t(i) {
            continue;
        }
        if !t(i + 1) || p(i + 1).saturating_sub(p(i)) > 1 {
            keep[i] = false;
        }
    }
    if !t(0) && !t(1) {
        keep[0] = false;
    }
    if !t(len - 2) && !t(len - 1) {
        keep[len - 1] = false;
    }

    records
        .iter()
        .zip(keep)
        .filter(|(_, keep)| *keep)
        .map(|(record, _)| *record)
        .collect()
}
