//! Kepler's Equation
//!
//! Newton iteration for the mean → eccentric anomaly direction and the
//! closed-form inverse. Element conversion depends on these routines.

use thiserror::Error;

/// Kepler-solver failures.
#[derive(Debug, Clone, Copy, Error)]
pub enum KeplerError {
    /// Newton iteration exceeded the iteration bound without reaching
    /// the requested tolerance. Recoverable: retry with a relaxed
    /// tolerance or reject the orbit.
    #[error(
        "Kepler iteration did not converge after {iterations} steps \
         (M = {mean_anomaly}, e = {eccentricity}, residual = {residual:e})"
    )]
    NonConvergence {
        /// Mean anomaly of the failed solve (rad)
        mean_anomaly: f64,
        /// Eccentricity of the failed solve
        eccentricity: f64,
        /// Iterations performed
        iterations: usize,
        /// Last Newton update magnitude
        residual: f64,
    },
}

/// Solve M = E - e·sin(E) for the eccentric anomaly E.
///
/// Newton iteration starting from E₀ = M, terminating when the update
/// magnitude drops below `tolerance` or after `max_iter` steps.
pub fn mean_to_eccentric(
    mean_anomaly: f64,
    eccentricity: f64,
    tolerance: f64,
    max_iter: usize,
) -> Result<f64, KeplerError> {
    let mut ea = mean_anomaly;
    let mut delta = f64::INFINITY;

    for _ in 0..max_iter {
        let f = ea - eccentricity * ea.sin() - mean_anomaly;
        let fp = 1.0 - eccentricity * ea.cos();
        delta = f / fp;
        ea -= delta;
        if delta.abs() < tolerance {
            return Ok(ea);
        }
    }

    Err(KeplerError::NonConvergence {
        mean_anomaly,
        eccentricity,
        iterations: max_iter,
        residual: delta.abs(),
    })
}

/// Convert mean anomaly to true anomaly.
///
/// Solves Kepler's equation, then applies the half-angle relation
/// tan(θ/2) = sqrt((1+e)/(1-e)) · tan(E/2).
pub fn mean_to_true(
    mean_anomaly: f64,
    eccentricity: f64,
    tolerance: f64,
    max_iter: usize,
) -> Result<f64, KeplerError> {
    let ea = mean_to_eccentric(mean_anomaly, eccentricity, tolerance, max_iter)?;
    Ok(eccentric_to_true(ea, eccentricity))
}

/// Eccentric → true anomaly (closed form).
pub fn eccentric_to_true(eccentric_anomaly: f64, eccentricity: f64) -> f64 {
    2.0 * ((1.0 + eccentricity).sqrt() * (eccentric_anomaly / 2.0).sin())
        .atan2((1.0 - eccentricity).sqrt() * (eccentric_anomaly / 2.0).cos())
}

/// Convert true anomaly to mean anomaly (closed form, no iteration).
///
/// Eccentric anomaly from the half-angle relation, then Kepler's
/// equation evaluated directly.
pub fn true_to_mean(true_anomaly: f64, eccentricity: f64) -> f64 {
    let ea = 2.0 * ((1.0 - eccentricity).sqrt() * (true_anomaly / 2.0).sin())
        .atan2((1.0 + eccentricity).sqrt() * (true_anomaly / 2.0).cos());
    ea - eccentricity * ea.sin()
}
