//! Rotating ↔ Inertial Frame Transforms
//!
//! The synodic frame rotates about the z-axis at unit angular rate, so
//! the frame angle at time t is just t. Positions rotate; velocities
//! additionally pick up the ω × r term. Round-tripping through both
//! directions recovers the original state to numerical precision.

use crate::elements::OrbitalElements;
use crate::kepler::KeplerError;

/// Rotating (synodic) state → inertial state at time t.
///
/// X = R(t)·x, V = R(t)·(v + ω × x) with ω = ẑ.
pub fn rot_to_inertial(state: &[f64; 6], t: f64) -> [f64; 6] {
    let (sin_t, cos_t) = t.sin_cos();
    let [x, y, z, vx, vy, vz] = *state;

    // v + ω × r in the rotating frame
    let wx = vx - y;
    let wy = vy + x;

    [
        x * cos_t - y * sin_t,
        x * sin_t + y * cos_t,
        z,
        wx * cos_t - wy * sin_t,
        wx * sin_t + wy * cos_t,
        vz,
    ]
}

/// Inertial state → rotating (synodic) state at time t.
///
/// x = R(-t)·X, v = R(-t)·V - ω × x.
pub fn inertial_to_rot(state: &[f64; 6], t: f64) -> [f64; 6] {
    let (sin_t, cos_t) = t.sin_cos();
    let [xi, yi, z, vxi, vyi, vz] = *state;

    let x = xi * cos_t + yi * sin_t;
    let y = -xi * sin_t + yi * cos_t;
    let vx = vxi * cos_t + vyi * sin_t;
    let vy = -vxi * sin_t + vyi * cos_t;

    [x, y, z, vx + y, vy - x, vz]
}

/// Orbital elements → rotating-frame state at time t.
///
/// Composition of [`OrbitalElements::to_state`] (inertial) and
/// [`inertial_to_rot`].
pub fn elements_to_rot(
    elements: &OrbitalElements,
    t: f64,
    kepler_tol: f64,
    kepler_max_iter: usize,
) -> Result<[f64; 6], KeplerError> {
    let inertial = elements.to_state(kepler_tol, kepler_max_iter)?;
    Ok(inertial_to_rot(&inertial, t))
}
