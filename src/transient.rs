use num_traits::Float;
use std::fmt;
use std::ops::Range;

/// Sample range `[start, end)` of a waveform where transient signals are
/// expected. Everything outside of it is treated as baseline noise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransientWindow {
    start: usize,
    end: usize,
}

/// The error type returned when creating an empty [`TransientWindow`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowError {
    start: usize,
    end: usize,
}

impl fmt::Display for WindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "transient window start ({}) must be before its end ({})",
            self.start, self.end
        )
    }
}

impl std::error::Error for WindowError {}

impl TransientWindow {
    /// Creates a new window. Returns an error if `start >= end`.
    ///
    /// # Examples
    ///
    /// ```
    /// use strips::transient::TransientWindow;
    ///
    /// assert!(TransientWindow::new(20, 80).is_ok());
    /// assert!(TransientWindow::new(80, 80).is_err());
    /// ```
    pub fn new(start: usize, end: usize) -> Result<Self, WindowError> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(WindowError { start, end })
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// The window clamped to a waveform of length `len`.
    fn clamp(&self, len: usize) -> Range<usize> {
        self.start.min(len)..self.end.min(len)
    }

    fn inside<'a, T>(&self, signal: &'a [T]) -> &'a [T] {
        &signal[self.clamp(signal.len())]
    }

    fn outside<'a, T>(&self, signal: &'a [T]) -> impl Iterator<Item = &'a T> {
        let range = self.clamp(signal.len());
        signal[..range.start].iter().chain(&signal[range.end..])
    }
}

impl Default for TransientWindow {
    /// Samples `[20, 80)`.
    fn default() -> Self {
        Self { start: 20, end: 80 }
    }
}

/// Amplitude of the largest deviation from the baseline within the window:
/// the larger of the maximum and the magnitude of the minimum. Zero if the
/// window lies past the end of the signal.
///
/// `signal` is expected to be baseline-subtracted.
pub fn amplitude<T: Float>(signal: &[T], window: &TransientWindow) -> T {
    let inside = window.inside(signal);
    if inside.is_empty() {
        return T::zero();
    }
    let (max, min) = inside
        .iter()
        .fold((T::neg_infinity(), T::infinity()), |(max, min), &x| {
            (max.max(x), min.min(x))
        });

    if max > min.abs() {
        max
    } else {
        min.abs()
    }
}

/// Standard deviation (normalized by `N`) of the samples outside the window.
/// Zero if there are none.
pub fn noise<T: Float>(signal: &[T], window: &TransientWindow) -> T {
    let (sum, n) = window
        .outside(signal)
        .fold((T::zero(), T::zero()), |(sum, n), &x| (sum + x, n + T::one()));
    if n == T::zero() {
        return T::zero();
    }
    let mean = sum / n;
    let variance = window
        .outside(signal)
        .fold(T::zero(), |acc, &x| acc + (x - mean).powi(2))
        / n;

    variance.sqrt()
}

/// Amplitude and baseline noise of one neighbouring strip's waveform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Flank<T> {
    pub amplitude: T,
    pub noise: T,
}

impl<T: Float> Flank<T> {
    pub fn measure(signal: &[T], window: &TransientWindow) -> Self {
        Self {
            amplitude: amplitude(signal, window),
            noise: noise(signal, window),
        }
    }

    pub fn is_significant(&self) -> bool {
        self.amplitude > self.noise
    }
}

/// Transient asymmetry between the two strips neighbouring a deposit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Asymmetry<T> {
    pub r: T,
    pub sigma_r: T,
}

impl<T: Float> Asymmetry<T> {
    /// `R = (right - left) / (right + left)`, with its first order error
    /// propagated from the noise of each flank. Returns `None` unless both
    /// amplitudes rise above their noise.
    ///
    /// # Examples
    ///
    /// ```
    /// use strips::transient::{Asymmetry, Flank};
    ///
    /// let left = Flank { amplitude: 10.0, noise: 1.0 };
    /// let right = Flank { amplitude: 30.0, noise: 1.0 };
    /// let asymmetry = Asymmetry::between(&left, &right).unwrap();
    /// assert_eq!(asymmetry.r, 0.5);
    ///
    /// let quiet = Flank { amplitude: 0.5, noise: 1.0 };
    /// assert!(Asymmetry::between(&quiet, &right).is_none());
    /// ```
    pub fn between(left: &Flank<T>, right: &Flank<T>) -> Option<Self> {
        if !(left.is_significant() && right.is_significant()) {
            return None;
        }
        let (l, r) = (left.amplitude, right.amplitude);
        let sum = l + r;
        let two = T::one() + T::one();

        let asymmetry = (r - l) / sum;
        let relative = ((left.noise / l).powi(2) + (right.noise / r).powi(2)).sqrt();
        let sigma_r = two * (l * r / sum.powi(2)) * relative;

        Some(Self {
            r: asymmetry,
            sigma_r,
        })
    }
}
