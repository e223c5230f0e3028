use crate::condense::{Condenser, Incomplete, NotImplemented, PulseTimer, WaveformTable};
use crate::event::Event;
use crate::outcome::{DetectorOutcome, ErrorCode, Outcome};
use crate::record::{RecordGroup, RefinedRecord};
use bon::bon;

/// Reconstruction of many events across worker threads.
#[cfg(feature = "parallel")]
pub mod batch;
/// Mapping of channel ids to detectors and sides.
pub mod channel;
/// Clustering of a side's strips into physical deposits.
pub mod cluster;
/// Condensation of clusters into refined records.
pub mod condense;
/// AC/DC energy matching.
pub mod energy;
/// Event, detector and side aggregation.
pub mod event;
/// Typed quality outcomes.
pub mod outcome;
/// Strip readouts and their derived records.
pub mod record;
/// Transient amplitude, noise and asymmetry.
pub mod transient;

mod config;

pub use config::{Config, TRIGGER_THRESHOLD};

/// A trait that defines the interface for an observer of the reconstruction.
///
/// The default implementation of all methods is a no-op. Users are expected to
/// override the methods they are interested in. `index` is the position of the
/// event in the input.
#[allow(unused_variables)]
pub trait Observer {
    /// Called with every record group before it is reconstructed.
    fn on_group(&mut self, index: usize, group: &RecordGroup) {}
    /// Called once an event has been split, trimmed and clusterized.
    fn on_event(&mut self, index: usize, event: &Event) {}
    /// Called for every quality outcome found on an event.
    fn on_outcome(&mut self, index: usize, outcome: &DetectorOutcome) {}
    /// Called for every cluster of an event that could not be condensed.
    fn on_unsupported(&mut self, index: usize, error: &NotImplemented) {}
    /// Called for every refined record produced by an event.
    fn on_refined(&mut self, index: usize, record: &RefinedRecord) {}
    /// Called last for every event, after all of the above.
    fn on_complete(&mut self, index: usize, report: &EventReport) {}
}

impl Observer for () {}

/// Everything known about one reconstructed event.
#[derive(Clone, Debug, PartialEq)]
pub struct EventReport {
    pub event: Event,
    pub outcomes: Vec<DetectorOutcome>,
    /// All refined records of the event, or every cluster that could not be
    /// condensed.
    pub refined: Result<Vec<RefinedRecord>, Incomplete>,
}

impl EventReport {
    /// Whether every cluster of the event was condensed.
    pub fn is_complete(&self) -> bool {
        self.refined.is_ok()
    }

    /// Outcome codes, or [`ErrorCode::Success`] if there are none.
    pub fn codes(&self) -> Vec<ErrorCode> {
        if self.outcomes.is_empty() {
            return vec![ErrorCode::Success];
        }
        self.outcomes.iter().map(|o| o.outcome.code()).collect()
    }
}

/// Run the full reconstruction chain on one record group.
///
/// Events with orphan detectors or mismatched energies are still clustered and
/// condensed; the outcomes are reported for the caller to filter on.
pub fn reconstruct<P, W>(
    group: RecordGroup,
    config: &Config,
    condenser: &Condenser<'_, P, W>,
) -> EventReport
where
    P: PulseTimer + ?Sized,
    W: WaveformTable + ?Sized,
{
    let mut event = Event::from_group(group, config);
    let mut outcomes = event.check(config.sigma);

    event.trim_unused_transients();
    event.clusterize();
    let refined = event.condense(condenser);

    if let Err(incomplete) = &refined {
        let channel_map = config.channel_map();
        outcomes.extend(
            incomplete
                .unsupported
                .iter()
                .filter_map(|error| error.channel)
                .filter_map(|channel| channel_map.detector(channel))
                .map(|detector| DetectorOutcome {
                    detector,
                    outcome: Outcome::UnsupportedMultiplicity,
                }),
        );
    }

    EventReport {
        event,
        outcomes,
        refined,
    }
}

pub struct Reconstruction<P, W, O> {
    groups: Vec<RecordGroup>,
    config: Config,
    timer: P,
    waveforms: W,
    observer: O,
}

#[bon]
impl<P, W, O> Reconstruction<P, W, O> {
    #[builder]
    pub fn new(
        #[builder(field)] groups: Vec<RecordGroup>,
        #[builder(default)] config: Config,
        timer: P,
        waveforms: W,
        observer: O,
    ) -> Self {
        Self {
            groups,
            config,
            timer,
            waveforms,
            observer,
        }
    }
}

impl<P, W, O, S: reconstruction_builder::State> ReconstructionBuilder<P, W, O, S> {
    /// Add a candidate event to the [`Reconstruction`].
    pub fn add_group(mut self, group: RecordGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// Add many candidate events, in order.
    pub fn add_groups<I>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = RecordGroup>,
    {
        self.groups.extend(groups);
        self
    }
}

impl<P, W, O> Reconstruction<P, W, O>
where
    P: PulseTimer,
    W: WaveformTable,
    O: Observer,
{
    /// Reconstruct all events in the order they were added.
    pub fn run(self) -> O {
        let Self {
            groups,
            config,
            timer,
            waveforms,
            mut observer,
        } = self;
        let condenser = Condenser::new(&timer, &waveforms, config.window);

        for (index, group) in groups.into_iter().enumerate() {
            observer.on_group(index, &group);
            let report = reconstruct(group, &config, &condenser);

            observer.on_event(index, &report.event);
            for outcome in &report.outcomes {
                observer.on_outcome(index, outcome);
            }
            match &report.refined {
                Ok(records) => {
                    for record in records {
                        observer.on_refined(index, record);
                    }
                }
                Err(incomplete) => {
                    for error in &incomplete.unsupported {
                        observer.on_unsupported(index, error);
                    }
                }
            }
            observer.on_complete(index, &report);
        }

        observer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::DetectorId;
    use crate::outcome::Orphan;
    use crate::record::ReadoutRecord;
    use std::collections::HashMap;
    use std::str::FromStr;

    #[derive(Default)]
    struct TestObserver {
        groups: Vec<usize>,
        events: Vec<usize>,
        outcomes: Vec<(usize, DetectorOutcome)>,
        unsupported: Vec<(usize, NotImplemented)>,
        refined: Vec<(usize, RefinedRecord)>,
        completed: Vec<(usize, bool)>,
    }

    impl Observer for TestObserver {
        fn on_group(&mut self, index: usize, _: &RecordGroup) {
            self.groups.push(index);
        }

        fn on_event(&mut self, index: usize, _: &Event) {
            self.events.push(index);
        }

        fn on_outcome(&mut self, index: usize, outcome: &DetectorOutcome) {
            self.outcomes.push((index, *outcome));
        }

        fn on_unsupported(&mut self, index: usize, error: &NotImplemented) {
            self.unsupported.push((index, *error));
        }

        fn on_refined(&mut self, index: usize, record: &RefinedRecord) {
            self.refined.push((index, *record));
        }

        fn on_complete(&mut self, index: usize, report: &EventReport) {
            self.completed.push((index, report.is_complete()));
        }
    }

    fn peak_index(waveform: &[f32]) -> f32 {
        waveform
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, &x)| {
                if x > best.1 {
                    (i, x)
                } else {
                    best
                }
            })
            .0 as f32
    }

    fn spike(at: usize, height: f32) -> Vec<f32> {
        let mut signal: Vec<f32> = (0..256)
            .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        signal[at] = height;
        signal
    }

    // GeI: a [0, 1, 0] deposit on DC with a single strip on AC.
    fn good_group() -> RecordGroup {
        RecordGroup::from_str(
            "100 2 9 1 0 0 1
100 3 11 0 0 0 3
100 150 10 0 0 0 2
101 148 90 0 0 0 4",
        )
        .unwrap()
    }

    fn waveforms() -> HashMap<u32, Vec<f32>> {
        HashMap::from([
            (1, spike(30, 8.0)),
            (2, spike(60, 150.0)),
            (3, spike(35, 8.0)),
            (4, spike(62, 148.0)),
        ])
    }

    #[test]
    fn reconstruct_single_event() {
        let waveforms = waveforms();
        let config = Config::default();
        let condenser = Condenser::new(&peak_index, &waveforms, config.window);
        let report = reconstruct(good_group(), &config, &condenser);

        assert!(report.is_complete());
        assert!(report.outcomes.is_empty());
        assert_eq!(report.codes(), vec![ErrorCode::Success]);
        assert_eq!(report.event.total_energy(), Some(150.0));

        let refined = report.refined.unwrap();
        assert_eq!(refined.len(), 2);
        // GeI AC comes before GeI DC.
        assert_eq!(refined[0].channel, 90);
        assert_eq!(refined[0].t50, Some(62.0));
        assert_eq!(refined[0].r, None);
        assert_eq!(refined[1].channel, 10);
        assert_eq!(refined[1].t50, Some(60.0));
        assert!(refined[1].r.unwrap().abs() < 1e-6);
        assert!(refined[1].sigma_r.is_some());
    }

    #[test]
    fn reconstruct_unsupported_event() {
        let waveforms = waveforms();
        let config = Config::default();
        let condenser = Condenser::new(&peak_index, &waveforms, config.window);
        let group = RecordGroup::from_str("0 60 10 1 0 0 1\n0 60 11 1 0 0 2\n0 121 90 1 0 0 3")
            .unwrap();
        let report = reconstruct(group, &config, &condenser);

        assert!(!report.is_complete());
        assert_eq!(
            report.outcomes,
            vec![DetectorOutcome {
                detector: DetectorId::Ge1,
                outcome: Outcome::UnsupportedMultiplicity,
            }]
        );
        assert_eq!(report.codes(), vec![ErrorCode::NotImplemented]);
    }

    #[test]
    fn reconstruction_observer() {
        let orphan = RecordGroup::new(vec![ReadoutRecord {
            timestamp: 5,
            adc_value: 40.0,
            channel: 120,
            trigger: false,
            pileup: false,
            retrigger: false,
            rid: 9,
        }]);
        let unsupported =
            RecordGroup::from_str("0 60 10 1 0 0 1\n0 60 11 1 0 0 2\n0 121 90 1 0 0 3").unwrap();

        let observer = Reconstruction::builder()
            .add_group(good_group())
            .add_groups([orphan, unsupported])
            .timer(peak_index)
            .waveforms(waveforms())
            .observer(TestObserver::default())
            .build()
            .run();

        assert_eq!(observer.groups, vec![0, 1, 2]);
        assert_eq!(observer.events, vec![0, 1, 2]);
        assert_eq!(observer.completed, vec![(0, true), (1, true), (2, false)]);
        assert_eq!(
            observer.outcomes,
            vec![
                (
                    1,
                    DetectorOutcome {
                        detector: DetectorId::Ge2,
                        outcome: Outcome::Orphan(Orphan::AcOnly),
                    }
                ),
                (
                    1,
                    DetectorOutcome {
                        detector: DetectorId::Ge2,
                        outcome: Outcome::EnergyMatchFailure,
                    }
                ),
                (
                    2,
                    DetectorOutcome {
                        detector: DetectorId::Ge1,
                        outcome: Outcome::UnsupportedMultiplicity,
                    }
                ),
            ]
        );
        assert_eq!(observer.unsupported.len(), 1);
        assert_eq!(observer.unsupported[0].0, 2);
        assert_eq!(
            observer
                .refined
                .iter()
                .map(|(index, r)| (*index, r.channel))
                .collect::<Vec<_>>(),
            vec![(0, 90), (0, 10), (1, 120)]
        );
    }

    #[test]
    fn reconstruction_reports_every_unsupported_cluster() {
        // Two triggered strips on both sides of GeI.
        let group = RecordGroup::from_str(
            "0 50 1 1 0 0 1
0 50 2 1 0 0 2
0 60 90 1 0 0 3
0 40 91 1 0 0 4",
        )
        .unwrap();
        let observer = Reconstruction::builder()
            .add_group(group)
            .timer(peak_index)
            .waveforms(HashMap::<u32, Vec<f32>>::new())
            .observer(TestObserver::default())
            .build()
            .run();

        assert_eq!(observer.groups, vec![0]);
        assert_eq!(observer.events, vec![0]);
        assert_eq!(
            observer.unsupported,
            vec![
                (
                    0,
                    NotImplemented {
                        channel: Some(90),
                        num_trigs: 2,
                    }
                ),
                (
                    0,
                    NotImplemented {
                        channel: Some(1),
                        num_trigs: 2,
                    }
                ),
            ]
        );
        let unsupported = DetectorOutcome {
            detector: DetectorId::Ge1,
            outcome: Outcome::UnsupportedMultiplicity,
        };
        assert_eq!(observer.outcomes, vec![(0, unsupported), (0, unsupported)]);
        assert!(observer.refined.is_empty());
        assert_eq!(observer.completed, vec![(0, false)]);
    }

    #[test]
    fn reconstruction_respects_config() -> anyhow::Result<()> {
        let config = Config::builder().trigger_threshold(200.0).build();
        let group = RecordGroup::from_str(&good_group().to_string())?;
        let observer = Reconstruction::builder()
            .add_group(group)
            .config(config)
            .timer(peak_index)
            .waveforms(waveforms())
            .observer(TestObserver::default())
            .build()
            .run();

        // Nothing passes the threshold, so every cluster has zero triggers.
        assert!(observer.refined.is_empty());
        assert_eq!(observer.unsupported.len(), 1);
        assert_eq!(observer.unsupported[0].1.num_trigs, 0);
        Ok(())
    }
}
