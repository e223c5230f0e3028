use crate::condense::WaveformTable;
use std::fmt;
use winnow::ascii::{dec_uint, float, line_ending, space0, space1, till_line_ending};
use winnow::combinator::{alt, opt, preceded, separated, terminated};
use winnow::error::ContextError;
use winnow::Parser;

/// A single strip readout as delivered by the upstream event builder.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReadoutRecord {
    pub timestamp: u64,
    pub adc_value: f32,
    /// Numeric channel id. See [`ChannelMap`](crate::channel::ChannelMap) for
    /// how it maps to a detector and side.
    pub channel: u16,
    pub trigger: bool,
    pub pileup: bool,
    pub retrigger: bool,
    /// Reference into the waveform table.
    pub rid: u32,
}

impl ReadoutRecord {
    /// Overwrite the trigger flag from the amplitude of the readout.
    pub fn correct_trigger(&mut self, threshold: f32) {
        self.trigger = self.adc_value >= threshold;
    }
}

impl fmt::Display for ReadoutRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {}",
            self.timestamp,
            self.adc_value,
            self.channel,
            u8::from(self.trigger),
            u8::from(self.pileup),
            u8::from(self.retrigger),
            self.rid
        )
    }
}

/// Recompute the trigger flag of every record against `threshold`.
///
/// The previous value of the flag is ignored, so this is idempotent.
///
/// # Examples
///
/// ```
/// # use strips::record::{correct_triggers, ReadoutRecord};
/// let mut records = [ReadoutRecord {
///     timestamp: 0,
///     adc_value: 9.5,
///     channel: 3,
///     trigger: true,
///     pileup: false,
///     retrigger: false,
///     rid: 0,
/// }];
/// correct_triggers(&mut records, 10.0);
/// assert!(!records[0].trigger);
/// ```
pub fn correct_triggers(records: &mut [ReadoutRecord], threshold: f32) {
    for record in records {
        record.correct_trigger(threshold);
    }
}

/// Readouts that belong to one candidate event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordGroup {
    records: Vec<ReadoutRecord>,
}

impl RecordGroup {
    pub fn new(records: Vec<ReadoutRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ReadoutRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ReadoutRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// See [`correct_triggers`].
    pub fn correct_triggers(&mut self, threshold: f32) {
        correct_triggers(&mut self.records, threshold);
    }
}

impl From<Vec<ReadoutRecord>> for RecordGroup {
    fn from(records: Vec<ReadoutRecord>) -> Self {
        Self::new(records)
    }
}

impl FromIterator<ReadoutRecord> for RecordGroup {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = ReadoutRecord>,
    {
        Self::new(iter.into_iter().collect())
    }
}

impl fmt::Display for RecordGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .records
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");

        write!(f, "{text}")
    }
}

fn parse_flag(input: &mut &str) -> winnow::Result<bool> {
    alt(('0'.value(false), '1'.value(true))).parse_next(input)
}

fn parse_record(input: &mut &str) -> winnow::Result<ReadoutRecord> {
    let timestamp: u64 = preceded(space0, dec_uint).parse_next(input)?;
    let adc_value: f32 = preceded(space1, float).parse_next(input)?;
    let channel: u16 = preceded(space1, dec_uint).parse_next(input)?;
    let trigger = preceded(space1, parse_flag).parse_next(input)?;
    let pileup = preceded(space1, parse_flag).parse_next(input)?;
    let retrigger = preceded(space1, parse_flag).parse_next(input)?;
    let rid: u32 = terminated(preceded(space1, dec_uint), space0).parse_next(input)?;

    Ok(ReadoutRecord {
        timestamp,
        adc_value,
        channel,
        trigger,
        pileup,
        retrigger,
        rid,
    })
}

// Comments and blank lines carry no record.
fn parse_line(input: &mut &str) -> winnow::Result<Option<ReadoutRecord>> {
    alt((
        preceded((space0, '#'), till_line_ending).value(None),
        parse_record.map(Some),
        space0.value(None),
    ))
    .parse_next(input)
}

/// The error type returned when parsing a [`RecordGroup`] fails.
#[derive(Debug)]
pub struct ParseError {
    input: String,
    span: std::ops::Range<usize>,
    line: usize,
}

impl ParseError {
    fn from_parse(error: winnow::error::ParseError<&str, ContextError>) -> Self {
        let input = error.input().to_string();
        let line = input[..error.offset()].matches('\n').count() + 1;
        let span = error.char_span();
        Self { input, span, line }
    }

    /// One-based line of the input holding the first malformed record.
    pub fn line(&self) -> usize {
        self.line
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = format!("invalid readout record on line {}", self.line);
        let message = annotate_snippets::Level::Error.title(&title).snippet(
            annotate_snippets::Snippet::source(&self.input)
                .fold(true)
                .annotation(
                    annotate_snippets::Level::Error
                        .span(self.span.clone())
                        .label("expected `timestamp ADC_value channel trigger pileup retrigger rid`"),
                ),
        );
        let renderer = annotate_snippets::Renderer::plain();
        let rendered = renderer.render(message);
        rendered.fmt(f)
    }
}

impl std::error::Error for ParseError {}

impl std::str::FromStr for RecordGroup {
    type Err = ParseError;

    /// Parse a [`RecordGroup`] from its text form: one record per line as
    /// `timestamp ADC_value channel trigger pileup retrigger rid`. Lines
    /// starting with `#` and blank lines are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// # use strips::record::RecordGroup;
    /// # use std::str::FromStr;
    /// let group = RecordGroup::from_str("# ts adc ch trg pu rtrg rid\n100 52.5 80 1 0 0 7\n")?;
    /// assert_eq!(group.len(), 1);
    /// assert_eq!(group.records()[0].channel, 80);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let lines: Vec<Option<ReadoutRecord>> =
            terminated(separated(0.., parse_line, line_ending), opt(line_ending))
                .parse(input)
                .map_err(ParseError::from_parse)?;

        Ok(lines.into_iter().flatten().collect())
    }
}

/// Condensed per-cluster output.
///
/// The derived fields are `None` whenever they could not be computed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RefinedRecord {
    pub timestamp: u64,
    pub adc_value: f32,
    pub channel: u16,
    pub trigger: bool,
    pub t50: Option<f32>,
    /// Transient asymmetry between the right and left neighbouring strips.
    pub r: Option<f32>,
    pub sigma_r: Option<f32>,
}

impl RefinedRecord {
    /// Copy all the fields shared with a [`ReadoutRecord`], leaving the
    /// derived ones absent.
    pub fn from_record(record: &ReadoutRecord) -> Self {
        Self {
            timestamp: record.timestamp,
            adc_value: record.adc_value,
            channel: record.channel,
            trigger: record.trigger,
            t50: None,
            r: None,
            sigma_r: None,
        }
    }
}

/// A readout together with its digitized waveform.
#[derive(Clone, Debug, PartialEq)]
pub struct FullReadout {
    pub timestamp: u64,
    pub adc_value: f32,
    pub channel: u16,
    pub trigger: bool,
    pub signal: Vec<f32>,
}

/// Attach waveforms to records. Records whose `rid` is missing from the table
/// are skipped.
pub fn merge_with_signals<W>(records: &[ReadoutRecord], table: &W) -> Vec<FullReadout>
where
    W: WaveformTable + ?Sized,
{
    records
        .iter()
        .filter_map(|record| {
            table.waveform(record.rid).map(|signal| FullReadout {
                timestamp: record.timestamp,
                adc_value: record.adc_value,
                channel: record.channel,
                trigger: record.trigger,
                signal: signal.to_vec(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::str::FromStr;

    fn record(channel: u16, adc_value: f32, trigger: bool) -> ReadoutRecord {
        ReadoutRecord {
            timestamp: 1000,
            adc_value,
            channel,
            trigger,
            pileup: false,
            retrigger: false,
            rid: u32::from(channel),
        }
    }

    #[test]
    fn correct_triggers_threshold() {
        let mut records = vec![
            record(0, 9.99, true),
            record(1, 10.0, false),
            record(2, 250.0, false),
            record(3, -4.0, true),
        ];
        correct_triggers(&mut records, 10.0);

        assert_eq!(
            records.iter().map(|r| r.trigger).collect::<Vec<_>>(),
            vec![false, true, true, false]
        );
    }

    #[test]
    fn correct_triggers_idempotent() {
        let mut once = vec![record(0, 5.0, true), record(1, 15.0, false)];
        correct_triggers(&mut once, 10.0);
        let mut twice = once.clone();
        correct_triggers(&mut twice, 10.0);

        assert_eq!(once, twice);
    }

    #[test]
    fn correct_triggers_keeps_other_fields() {
        let mut records = vec![ReadoutRecord {
            pileup: true,
            retrigger: true,
            ..record(7, 3.0, true)
        }];
        correct_triggers(&mut records, 1.0);

        assert!(records[0].trigger);
        assert!(records[0].pileup);
        assert!(records[0].retrigger);
        assert_eq!(records[0].rid, 7);
    }

    #[test]
    fn record_group_from_str() {
        let mut string = String::new();
        assert_eq!(RecordGroup::from_str(&string).unwrap(), RecordGroup::default());

        string.push_str("# header\n");
        string.push_str("12 52.5 80 1 0 0 3\n");
        string.push('\n');
        string.push_str("  13 4 81 0 1 1 4  \n");
        let group = RecordGroup::from_str(&string).unwrap();

        assert_eq!(
            group.records(),
            &[
                ReadoutRecord {
                    timestamp: 12,
                    adc_value: 52.5,
                    channel: 80,
                    trigger: true,
                    pileup: false,
                    retrigger: false,
                    rid: 3,
                },
                ReadoutRecord {
                    timestamp: 13,
                    adc_value: 4.0,
                    channel: 81,
                    trigger: false,
                    pileup: true,
                    retrigger: true,
                    rid: 4,
                },
            ]
        );
    }

    #[test]
    fn record_group_to_string_round_trip() {
        let group = RecordGroup::new(vec![record(1, 12.25, true), record(40, 0.5, false)]);
        assert_eq!(group.to_string(), "1000 12.25 1 1 0 0 1\n1000 0.5 40 0 0 0 40");
        assert_eq!(RecordGroup::from_str(&group.to_string()).unwrap(), group);
    }

    #[test]
    fn record_group_from_str_invalid() {
        assert!(RecordGroup::from_str("12 52.5 80 2 0 0 3").is_err());
        assert!(RecordGroup::from_str("12 52.5 80 1 0 0").is_err());
        assert!(RecordGroup::from_str("12 52.5 80 1 0 0 3\nnot a record").is_err());
    }

    #[test]
    fn parse_error_display() {
        let error = RecordGroup::from_str("12 52.5 80 1 0 0 3\nbogus").unwrap_err();
        let message = error.to_string();
        assert!(message.contains("invalid readout record on line 2"));
        assert!(message.contains("expected `timestamp ADC_value channel trigger pileup retrigger rid`"));
    }

    #[test]
    fn parse_error_line() {
        let line = |s: &str| RecordGroup::from_str(s).unwrap_err().line();

        assert_eq!(line("12 52.5 80 2 0 0 3"), 1);
        assert_eq!(line("12 52.5 80 1 0 0 3\nbogus"), 2);
        assert_eq!(line("# header\n\n12 52.5 80 1 0 0"), 3);
    }

    #[test]
    fn refined_record_from_record() {
        let refined = RefinedRecord::from_record(&record(5, 30.0, true));

        assert_eq!(refined.timestamp, 1000);
        assert_eq!(refined.adc_value, 30.0);
        assert_eq!(refined.channel, 5);
        assert!(refined.trigger);
        assert_eq!(refined.t50, None);
        assert_eq!(refined.r, None);
        assert_eq!(refined.sigma_r, None);
    }

    #[test]
    fn merge_with_signals_skips_missing() {
        let table = HashMap::from([(1, vec![1.0, 2.0]), (3, vec![3.0])]);
        let records = [record(1, 20.0, true), record(2, 1.0, false), record(3, 2.0, false)];
        let merged = merge_with_signals(&records, &table);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].signal, vec![1.0, 2.0]);
        assert_eq!(merged[1].channel, 3);
        assert_eq!(merged[1].signal, vec![3.0]);
    }
}
