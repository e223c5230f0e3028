use std::fmt;

/// Default number of strips per side per detector.
pub const NUMCH: u16 = 38;

/// One of the two physical detector modules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DetectorId {
    Ge1,
    Ge2,
}

impl fmt::Display for DetectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorId::Ge1 => write!(f, "GeI"),
            DetectorId::Ge2 => write!(f, "GeII"),
        }
    }
}

/// One of the two electrode planes of a detector module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SideId {
    Ac,
    Dc,
}

impl fmt::Display for SideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SideId::Ac => write!(f, "AC"),
            SideId::Dc => write!(f, "DC"),
        }
    }
}

/// Mapping from numeric channel ids to (detector, side).
///
/// Channel ids are laid out in four blocks of `num_channels` strips:
///
/// | block | detector | side |
/// |-------|----------|------|
/// | 0     | GeI      | DC   |
/// | 1     | GeII     | DC   |
/// | 2     | GeI      | AC   |
/// | 3     | GeII     | AC   |
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelMap {
    num_channels: u16,
}

impl ChannelMap {
    pub fn new(num_channels: u16) -> Self {
        Self { num_channels }
    }

    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Returns `None` for channel ids outside all four blocks.
    ///
    /// # Examples
    ///
    /// ```
    /// use strips::channel::{ChannelMap, DetectorId, SideId};
    ///
    /// let map = ChannelMap::default();
    /// assert_eq!(map.classify(0), Some((DetectorId::Ge1, SideId::Dc)));
    /// assert_eq!(map.classify(38), Some((DetectorId::Ge2, SideId::Dc)));
    /// assert_eq!(map.classify(76), Some((DetectorId::Ge1, SideId::Ac)));
    /// assert_eq!(map.classify(151), Some((DetectorId::Ge2, SideId::Ac)));
    /// assert_eq!(map.classify(152), None);
    /// ```
    pub fn classify(&self, channel: u16) -> Option<(DetectorId, SideId)> {
        let n = u32::from(self.num_channels);
        if n == 0 {
            return None;
        }
        match u32::from(channel) / n {
            0 => Some((DetectorId::Ge1, SideId::Dc)),
            1 => Some((DetectorId::Ge2, SideId::Dc)),
            2 => Some((DetectorId::Ge1, SideId::Ac)),
            3 => Some((DetectorId::Ge2, SideId::Ac)),
            _ => None,
        }
    }

    pub fn detector(&self, channel: u16) -> Option<DetectorId> {
        self.classify(channel).map(|(detector, _)| detector)
    }

    pub fn side(&self, channel: u16) -> Option<SideId> {
        self.classify(channel).map(|(_, side)| side)
    }
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self::new(NUMCH)
    }
}
