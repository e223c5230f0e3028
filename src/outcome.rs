use crate::channel::DetectorId;
use std::fmt;

/// Historical QA code table.
///
/// Only [`ErrorCode::AcOnly`], [`ErrorCode::DcOnly`],
/// [`ErrorCode::EnergyMatchFailure`] and [`ErrorCode::NotImplemented`] are
/// produced by this crate; the rest are kept so that codes written by other
/// tools can be decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum ErrorCode {
    Success = 0,
    /// Readout only worked on one side of the detector.
    Orphan = -1,
    /// No corresponding DC readouts.
    AcOnly = -2,
    /// No corresponding AC readouts.
    DcOnly = -3,
    /// Four readouts on one detector that are not two on each side, with
    /// charge sharing.
    Not22ChargeSharing = -4,
    /// Same as above, with charge loss.
    Not22ChargeLoss = -5,
    Not22Both = -6,
    EnergyMatchFailure = -7,
    ThreeInteractionMatchFailure = -8,
    NotThreeInteractions = -9,
    /// A cluster whose triggered multiplicity is not handled.
    NotImplemented = -10,
}

impl ErrorCode {
    pub fn code(self) -> i8 {
        self as i8
    }
}

/// The error type returned when converting an unknown numeric code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnknownCode(pub i8);

impl fmt::Display for UnknownCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown error code {}", self.0)
    }
}

impl std::error::Error for UnknownCode {}

impl TryFrom<i8> for ErrorCode {
    type Error = UnknownCode;

    fn try_from(code: i8) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => ErrorCode::Success,
            -1 => ErrorCode::Orphan,
            -2 => ErrorCode::AcOnly,
            -3 => ErrorCode::DcOnly,
            -4 => ErrorCode::Not22ChargeSharing,
            -5 => ErrorCode::Not22ChargeLoss,
            -6 => ErrorCode::Not22Both,
            -7 => ErrorCode::EnergyMatchFailure,
            -8 => ErrorCode::ThreeInteractionMatchFailure,
            -9 => ErrorCode::NotThreeInteractions,
            -10 => ErrorCode::NotImplemented,
            _ => return Err(UnknownCode(code)),
        })
    }
}

/// Which side of an orphan detector has readouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Orphan {
    AcOnly,
    DcOnly,
}

/// A non-fatal quality outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    Orphan(Orphan),
    EnergyMatchFailure,
    UnsupportedMultiplicity,
}

impl Outcome {
    pub fn code(&self) -> ErrorCode {
        match self {
            Outcome::Orphan(Orphan::AcOnly) => ErrorCode::AcOnly,
            Outcome::Orphan(Orphan::DcOnly) => ErrorCode::DcOnly,
            Outcome::EnergyMatchFailure => ErrorCode::EnergyMatchFailure,
            Outcome::UnsupportedMultiplicity => ErrorCode::NotImplemented,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Orphan(Orphan::AcOnly) => write!(f, "AC readouts without DC readouts"),
            Outcome::Orphan(Orphan::DcOnly) => write!(f, "DC readouts without AC readouts"),
            Outcome::EnergyMatchFailure => write!(f, "AC and DC energies do not match"),
            Outcome::UnsupportedMultiplicity => {
                write!(f, "cluster multiplicity not supported")
            }
        }
    }
}

/// An [`Outcome`] scoped to the detector it was found on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DetectorOutcome {
    pub detector: DetectorId,
    pub outcome: Outcome,
}

impl fmt::Display for DetectorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.detector, self.outcome)
    }
}
