use num_traits::Float;

/// Default number of standard deviations allowed between matched energies.
pub const SIGMA: f32 = 2.0;

/// Check whether two energies agree to within `sigma * sqrt(max)`.
///
/// Energies are assumed to be Poisson-like, so the tolerance scales with the
/// square root of the larger one. A non-positive maximum always matches.
///
/// # Examples
///
/// ```
/// use strips::energy::check_match;
///
/// assert!(check_match(100.0, 80.0, 2.0));
/// assert!(!check_match(100.0, 79.0, 2.0));
/// assert!(check_match(0.0, 0.0, 2.0));
/// ```
pub fn check_match<T: Float>(en1: T, en2: T, sigma: T) -> bool {
    let hi = en1.max(en2);
    let lo = en1.min(en2);
    if hi <= T::zero() {
        return true;
    }

    lo >= hi - sigma * hi.sqrt()
}

/// Absolute difference between two energies.
pub fn energy_difference<T: Float>(en1: T, en2: T) -> T {
    (en1 - en2).abs()
}
