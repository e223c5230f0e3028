use crate::condense::{Condenser, PulseTimer, WaveformTable};
use crate::outcome::ErrorCode;
use crate::record::RecordGroup;
use crate::{reconstruct, Config, EventReport};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Reconstruct every group independently on the rayon thread pool.
///
/// Reports are returned in input order. Events share nothing but the
/// read-only timer and waveform table.
///
/// # Examples
///
/// ```
/// # use std::collections::HashMap;
/// # use std::str::FromStr;
/// use strips::batch::reconstruct_all;
/// use strips::record::RecordGroup;
/// use strips::Config;
///
/// let groups = vec![
///     RecordGroup::from_str("0 50 4 1 0 0 0\n0 52 80 1 0 0 1")?,
///     RecordGroup::from_str("0 50 4 1 0 0 0")?,
/// ];
/// let waveforms: HashMap<u32, Vec<f32>> = HashMap::new();
/// let timer = |_: &[f32]| 0.0f32;
/// let reports = reconstruct_all(groups, &Config::default(), &timer, &waveforms);
///
/// assert!(reports[0].outcomes.is_empty());
/// assert!(!reports[1].outcomes.is_empty());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn reconstruct_all<P, W>(
    groups: Vec<RecordGroup>,
    config: &Config,
    timer: &P,
    waveforms: &W,
) -> Vec<EventReport>
where
    P: PulseTimer + Sync + ?Sized,
    W: WaveformTable + Sync + ?Sized,
{
    let condenser = Condenser::new(timer, waveforms, config.window);
    groups
        .into_par_iter()
        .map(|group| reconstruct(group, config, &condenser))
        .collect()
}

/// Number of events carrying each outcome code. An event is counted once per
/// code however many of its detectors or clusters carry it. Events without
/// outcomes count as [`ErrorCode::Success`].
pub fn tally(reports: &[EventReport]) -> BTreeMap<i8, usize> {
    reports
        .par_iter()
        .map(|report| {
            report
                .codes()
                .into_iter()
                .map(ErrorCode::code)
                .collect::<BTreeSet<_>>()
        })
        .fold(BTreeMap::new, |mut counts, codes| {
            for code in codes {
                *counts.entry(code).or_insert(0) += 1;
            }
            counts
        })
        .reduce(BTreeMap::new, |mut a, b| {
            for (code, n) in b {
                *a.entry(code).or_insert(0) += n;
            }
            a
        })
}

/// Reports of the events that were fully condensed and carry no outcome.
pub fn clean(reports: &[EventReport]) -> impl Iterator<Item = &EventReport> {
    reports
        .iter()
        .filter(|r| r.codes() == [ErrorCode::Success] && r.is_complete())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::str::FromStr;

    fn groups() -> Vec<RecordGroup> {
        [
            "0 50 4 1 0 0 0\n0 52 80 1 0 0 1",
            "0 50 4 1 0 0 0",
            "0 50 4 1 0 0 0\n0 30 5 1 0 0 1\n0 81 80 1 0 0 2",
            "",
            "0 50 4 1 0 0 0\n0 500 80 1 0 0 1",
            "0 50 1 1 0 0 0\n0 50 2 1 0 0 1\n0 60 90 1 0 0 2\n0 40 91 1 0 0 3",
        ]
        .into_iter()
        .map(|s| RecordGroup::from_str(s).unwrap())
        .collect()
    }

    fn length(waveform: &[f32]) -> f32 {
        waveform.len() as f32
    }

    #[test]
    fn reconstruct_all_matches_sequential() {
        let waveforms = HashMap::from([(0u32, vec![0.0f32; 256]), (1, vec![0.0; 128])]);
        let config = Config::default();
        let parallel = reconstruct_all(groups(), &config, &length, &waveforms);

        let condenser = Condenser::new(&length, &waveforms, config.window);
        let sequential: Vec<EventReport> = groups()
            .into_iter()
            .map(|group| reconstruct(group, &config, &condenser))
            .collect();

        assert_eq!(parallel, sequential);
    }

    #[test]
    fn tally_counts_codes() {
        let waveforms: HashMap<u32, Vec<f32>> = HashMap::new();
        let reports = reconstruct_all(groups(), &Config::default(), &length, &waveforms);
        let counts = tally(&reports);

        assert_eq!(counts.get(&0), Some(&2));
        assert_eq!(counts.get(&-3), Some(&1));
        assert_eq!(counts.get(&-7), Some(&2));
        // The last group has two unsupported clusters but counts once.
        assert_eq!(counts.get(&-10), Some(&2));
        assert_eq!(clean(&reports).count(), 2);
    }
}
