use crate::cluster::ReadoutCluster;
use crate::record::RefinedRecord;
use crate::transient::{Asymmetry, Flank, TransientWindow};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Read-only lookup of digitized waveforms by readout id.
pub trait WaveformTable {
    fn waveform(&self, rid: u32) -> Option<&[f32]>;
}

impl WaveformTable for HashMap<u32, Vec<f32>> {
    fn waveform(&self, rid: u32) -> Option<&[f32]> {
        self.get(&rid).map(Vec::as_slice)
    }
}

impl WaveformTable for BTreeMap<u32, Vec<f32>> {
    fn waveform(&self, rid: u32) -> Option<&[f32]> {
        self.get(&rid).map(Vec::as_slice)
    }
}

impl<W: WaveformTable + ?Sized> WaveformTable for &W {
    fn waveform(&self, rid: u32) -> Option<&[f32]> {
        (**self).waveform(rid)
    }
}

/// Pulse-shape timing extractor. Returns the time at which a waveform reaches
/// 50% of its rise amplitude.
///
/// Any `Fn(&[f32]) -> f32` is a [`PulseTimer`].
pub trait PulseTimer {
    fn t50(&self, waveform: &[f32]) -> f32;
}

impl<F> PulseTimer for F
where
    F: Fn(&[f32]) -> f32,
{
    fn t50(&self, waveform: &[f32]) -> f32 {
        self(waveform)
    }
}

/// The error type returned when condensing a cluster whose number of triggered
/// strips is not exactly one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NotImplemented {
    /// Lowest channel id in the offending cluster.
    pub channel: Option<u16>,
    pub num_trigs: usize,
}

impl fmt::Display for NotImplemented {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "condensing a cluster with {} triggered strips is not implemented",
            self.num_trigs
        )?;
        if let Some(channel) = self.channel {
            write!(f, " (starting at channel {channel})")?;
        }
        Ok(())
    }
}

impl std::error::Error for NotImplemented {}

/// The error type returned when some clusters of an event cannot be condensed.
///
/// Lists every offending cluster, in the order they were condensed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Incomplete {
    pub unsupported: Vec<NotImplemented>,
}

impl fmt::Display for Incomplete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event is incomplete: ")?;
        let reasons = self
            .unsupported
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{reasons}")
    }
}

impl std::error::Error for Incomplete {}

/// Converts clusters into [`RefinedRecord`]s.
pub struct Condenser<'a, P: ?Sized, W: ?Sized> {
    timer: &'a P,
    table: &'a W,
    window: TransientWindow,
}

impl<P: ?Sized, W: ?Sized> Clone for Condenser<'_, P, W> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: ?Sized, W: ?Sized> Copy for Condenser<'_, P, W> {}

impl<'a, P, W> Condenser<'a, P, W>
where
    P: PulseTimer + ?Sized,
    W: WaveformTable + ?Sized,
{
    pub fn new(timer: &'a P, table: &'a W, window: TransientWindow) -> Self {
        Self {
            timer,
            table,
            window,
        }
    }

    /// Condense a cluster with exactly one triggered strip.
    ///
    /// The refined record takes its shared fields from the triggered strip.
    /// `t50` is set only if the triggered strip's waveform is available and
    /// its timing is finite. For a `[0, 1, 0]` trigger pattern, `r` and
    /// `sigma_r` are set only if both flanking waveforms are available and
    /// rise above their noise.
    pub fn condense(&self, cluster: &ReadoutCluster) -> Result<RefinedRecord, NotImplemented> {
        let mut triggered = cluster.records().iter().filter(|r| r.trigger);
        let record = match (triggered.next(), triggered.next()) {
            (Some(record), None) => record,
            _ => {
                return Err(NotImplemented {
                    channel: cluster.records().first().map(|r| r.channel),
                    num_trigs: cluster.num_trigs(),
                });
            }
        };

        let mut refined = RefinedRecord::from_record(record);
        refined.t50 = self
            .table
            .waveform(record.rid)
            .map(|waveform| self.timer.t50(waveform))
            .filter(|t50| t50.is_finite());

        if let [left, centre, right] = cluster.records() {
            if !left.trigger && centre.trigger && !right.trigger {
                if let Some(asymmetry) = self.asymmetry(left.rid, right.rid) {
                    refined.r = Some(asymmetry.r);
                    refined.sigma_r = Some(asymmetry.sigma_r);
                }
            }
        }

        Ok(refined)
    }

    fn asymmetry(&self, left: u32, right: u32) -> Option<Asymmetry<f32>> {
        let left = Flank::measure(self.table.waveform(left)?, &self.window);
        let right = Flank::measure(self.table.waveform(right)?, &self.window);

        Asymmetry::between(&left, &right).filter(|a| a.r.is_finite() && a.sigma_r.is_finite())
    }
}
