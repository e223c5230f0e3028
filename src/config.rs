use crate::channel::{ChannelMap, NUMCH};
use crate::energy::SIGMA;
use crate::transient::TransientWindow;
use bon::Builder;

/// Default ADC threshold above which a strip counts as triggered.
pub const TRIGGER_THRESHOLD: f32 = 10.0;

/// Reconstruction parameters. Every field has a default.
///
/// # Examples
///
/// ```
/// # use strips::transient::TransientWindow;
/// use strips::Config;
///
/// let config = Config::builder()
///     .trigger_threshold(15.0)
///     .window(TransientWindow::new(10, 90)?)
///     .build();
/// assert_eq!(config.num_channels, 38);
/// assert_eq!(config.sigma, 2.0);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Builder, Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Strips per side per detector.
    #[builder(default = NUMCH)]
    pub num_channels: u16,
    #[builder(default = TRIGGER_THRESHOLD)]
    pub trigger_threshold: f32,
    /// Tolerance of the AC/DC energy match, in units of `sqrt(energy)`.
    #[builder(default = SIGMA)]
    pub sigma: f32,
    #[builder(default)]
    pub window: TransientWindow,
    /// Recompute trigger flags from ADC values before splitting an event.
    #[builder(default = true)]
    pub refine_triggers: bool,
}

impl Config {
    pub fn channel_map(&self) -> ChannelMap {
        ChannelMap::new(self.num_channels)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}
