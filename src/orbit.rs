//! Per-Particle Orbit Record
//!
//! One [`Orbit`] per test particle: the coupled 12-dim vector
//! [state ‖ variation], the clock, and the derived diagnostics (Jacobi
//! drift, MEGNO, LCN). The record exposes a narrow mutation surface:
//! the integration driver advances the state through [`Orbit::advance_to`]
//! and the step observer writes diagnostics through the dedicated
//! update methods; nothing else mutates it.

use crate::dynamics::Crtbp;
use crate::elements::{AnomalyKind, OrbitalElements};
use crate::frames;

/// Initial magnitude of every component of the variational vector.
///
/// Non-zero so the tangent norm is well defined at t = 0; small so the
/// linearization stays valid from the first step.
pub const VARIATION_SEED: f64 = 1e-8;

/// Baseline magnitude below which the Jacobi drift is reported as an
/// absolute difference; a ratio against a ~zero constant is
/// meaningless.
const JACOBI_BASELINE_FLOOR: f64 = 1e-12;

/// MEGNO accumulator.
///
/// Maintains the running quantity Y(t) = (2/t)·∫₀ᵗ (δ̇·δ)/(δ·δ)·s ds
/// and its time average mean(t) = (1/t)·∫₀ᵗ Y(s) ds by trapezoidal
/// increments at each accepted step, plus the running maximum of the
/// mean. The tangent vector is not renormalized between updates; the
/// caller supplies the instantaneous growth rate.
#[derive(Debug, Clone, Default)]
pub struct Megno {
    weighted_integral: f64,
    mean_integral: f64,
    prev_time: f64,
    prev_rate: f64,
    prev_running: f64,
    running: f64,
    mean: f64,
    max: f64,
}

impl Megno {
    /// Fold in one accepted step ending at time `t` with instantaneous
    /// growth rate (δ̇·δ)/(δ·δ) evaluated at `t`. No-op unless t
    /// advanced past the previous update.
    pub fn update(&mut self, t: f64, rate: f64) {
        let h = t - self.prev_time;
        if h <= 0.0 || t <= 0.0 {
            return;
        }

        self.weighted_integral +=
            0.5 * (self.prev_rate * self.prev_time + rate * t) * h;
        self.running = 2.0 * self.weighted_integral / t;

        self.mean_integral += 0.5 * (self.prev_running + self.running) * h;
        self.mean = self.mean_integral / t;

        self.prev_time = t;
        self.prev_rate = rate;
        self.prev_running = self.running;
    }

    /// Record the current mean into the running maximum. Called by the
    /// observer only after the settle time, before which the mean is
    /// not meaningful.
    pub fn track_max(&mut self) {
        if self.mean > self.max {
            self.max = self.mean;
        }
    }

    /// Current Y(t).
    pub fn running(&self) -> f64 {
        self.running
    }

    /// Time-averaged MEGNO. Approaches 2 for regular orbits, grows
    /// without bound for chaotic ones.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Maximum of the mean seen so far (post settle time).
    pub fn max(&self) -> f64 {
        self.max
    }
}

/// Mutable per-particle record.
#[derive(Debug, Clone)]
pub struct Orbit {
    name: String,
    /// Combined vector: [x, y, z, vx, vy, vz, δx .. δvz]
    y: [f64; 12],
    time: f64,
    step_size: f64,
    jacobi0: f64,
    jacobi: f64,
    jacobi_error: f64,
    megno: Megno,
    lcn: f64,
    step_count: u64,
}

impl Orbit {
    /// Create an orbit from a rotating-frame Cartesian state.
    ///
    /// The variational vector is seeded with [`VARIATION_SEED`] in all
    /// six components; it must never become exactly zero.
    pub fn new(name: impl Into<String>, state: [f64; 6]) -> Self {
        let mut y = [VARIATION_SEED; 12];
        y[..6].copy_from_slice(&state);
        Self {
            name: name.into(),
            y,
            time: 0.0,
            step_size: 0.0,
            jacobi0: 0.0,
            jacobi: 0.0,
            jacobi_error: 0.0,
            megno: Megno::default(),
            lcn: 0.0,
            step_count: 0,
        }
    }

    /// Seed a planar circular orbit of radius `rho` about the
    /// secondary, at the point (1-μ+ρ, 0, 0).
    ///
    /// The circular inertial speed √(μ/ρ) is corrected by the frame
    /// rotation, giving the synodic-frame velocity (0, √(μ/ρ)-ρ, 0).
    pub fn circular_about_secondary(name: impl Into<String>, system: &Crtbp, rho: f64) -> Self {
        let mu = system.mu();
        let v_circ = (mu / rho).sqrt() - rho;
        Self::new(name, [1.0 - mu + rho, 0.0, 0.0, 0.0, v_circ, 0.0])
    }

    /// Orbit name (used to attribute batch output).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current simulation time (synodic units, period = 2π).
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Last accepted step size.
    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    /// Accepted-step counter.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// The combined 12-dim vector.
    pub fn combined(&self) -> &[f64; 12] {
        &self.y
    }

    /// Primary 6-dim state (rotating frame).
    pub fn state(&self) -> [f64; 6] {
        [
            self.y[0], self.y[1], self.y[2], self.y[3], self.y[4], self.y[5],
        ]
    }

    /// Variational (tangent) 6-vector.
    pub fn delta(&self) -> [f64; 6] {
        [
            self.y[6], self.y[7], self.y[8], self.y[9], self.y[10], self.y[11],
        ]
    }

    /// Position in the rotating frame.
    pub fn position(&self) -> [f64; 3] {
        [self.y[0], self.y[1], self.y[2]]
    }

    /// Velocity in the rotating frame.
    pub fn velocity(&self) -> [f64; 3] {
        [self.y[3], self.y[4], self.y[5]]
    }

    /// Jacobi constant at t = 0.
    pub fn jacobi0(&self) -> f64 {
        self.jacobi0
    }

    /// Most recently evaluated Jacobi constant.
    pub fn jacobi(&self) -> f64 {
        self.jacobi
    }

    /// Jacobi drift (C - C₀)/C₀, the numerical-accuracy signal;
    /// absolute C - C₀ when the baseline is ~0. Growth beyond
    /// tolerance indicates integration failure, not a physical event.
    pub fn jacobi_error(&self) -> f64 {
        self.jacobi_error
    }

    /// MEGNO accumulator (read access).
    pub fn megno(&self) -> &Megno {
        &self.megno
    }

    /// Max Lyapunov characteristic number estimate ln(‖δ‖/‖δ₀‖)/t.
    pub fn lcn(&self) -> f64 {
        self.lcn
    }

    /// Derived inertial-frame Cartesian state, recomputed on demand.
    pub fn inertial_state(&self) -> [f64; 6] {
        frames::rot_to_inertial(&self.state(), self.time)
    }

    /// Derived orbital elements, recomputed on demand from the
    /// inertial state.
    pub fn elements(&self, kind: AnomalyKind) -> OrbitalElements {
        OrbitalElements::from_state(&self.inertial_state(), kind)
    }

    // --- mutation surface ---

    /// Record the Jacobi constant of the initial state. Resets the
    /// drift baseline.
    pub(crate) fn seed_jacobi(&mut self, system: &Crtbp) {
        let c = system.jacobi_constant(&self.state());
        self.jacobi0 = c;
        self.jacobi = c;
        self.jacobi_error = 0.0;
    }

    /// Advance the record to an accepted step: new time, new combined
    /// vector, step size used. Increments the step counter.
    pub(crate) fn advance_to(&mut self, t: f64, y: &[f64; 12], h: f64) {
        self.time = t;
        self.y = *y;
        self.step_size = h;
        self.step_count += 1;
    }

    /// Re-evaluate the Jacobi constant and its drift.
    ///
    /// The drift is relative to the initial constant; when that
    /// baseline is itself ~0 (a fast state can null the constant)
    /// the absolute difference is reported instead of dividing by it.
    pub(crate) fn update_jacobi(&mut self, system: &Crtbp) {
        self.jacobi = system.jacobi_constant(&self.state());
        let drift = self.jacobi - self.jacobi0;
        self.jacobi_error = if self.jacobi0.abs() > JACOBI_BASELINE_FLOOR {
            drift / self.jacobi0
        } else {
            drift
        };
    }

    /// MEGNO accumulator (observer access).
    pub(crate) fn megno_mut(&mut self) -> &mut Megno {
        &mut self.megno
    }

    /// Update the LCN estimate from the current tangent norm.
    pub(crate) fn update_lcn(&mut self) {
        if self.time <= 0.0 {
            return;
        }
        let delta = self.delta();
        let norm = delta.iter().map(|d| d * d).sum::<f64>().sqrt();
        let norm0 = VARIATION_SEED * (6.0_f64).sqrt();
        self.lcn = (norm / norm0).ln() / self.time;
    }
}
