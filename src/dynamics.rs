//! CRTBP Equations of Motion and Variational Dynamics
//!
//! Vector fields for the Circular Restricted Three-Body Problem in the
//! rotating (synodic) frame, in normalized units: the primaries sit at
//! (-μ, 0, 0) and (1-μ, 0, 0), the total mass and the primary
//! separation are 1, and the synodic angular rate is 1 (one mutual
//! orbit takes 2π time units).
//!
//! Three fields live here:
//! - the 6-dim equations of motion,
//! - the 6-dim variational (tangent-space) equations, linearized about
//!   the current state through the Hessian of the effective potential,
//! - the combined 12-dim system [state ‖ variation] integrated as one
//!   coupled vector field so a single adaptive step controls the error
//!   in both.
//!
//! The Jacobi constant is evaluated here as well; it is conserved by
//! the analytic flow and its numerical drift is the integration-quality
//! signal used by the diagnostics layer.

use thiserror::Error;

use crate::solver::OdeSystem;

/// Mass ratio outside the open interval (0, 1).
#[derive(Debug, Clone, Copy, Error)]
#[error("mass ratio must be in (0, 1), got {0}")]
pub struct InvalidMassRatio(pub f64);

/// The CRTBP vector field for a fixed mass ratio μ.
///
/// μ is the mass fraction of the secondary; the primary has mass 1-μ.
/// The value is threaded explicitly through every evaluation so that
/// several systems with different mass ratios can coexist in one
/// process.
#[derive(Debug, Clone, Copy)]
pub struct Crtbp {
    mu: f64,
}

impl Crtbp {
    /// Create a CRTBP system, validating 0 < μ < 1.
    pub fn new(mu: f64) -> Result<Self, InvalidMassRatio> {
        if !mu.is_finite() || mu <= 0.0 || mu >= 1.0 {
            return Err(InvalidMassRatio(mu));
        }
        Ok(Self { mu })
    }

    /// The mass ratio μ.
    pub fn mu(&self) -> f64 {
        self.mu
    }

    /// Distances to the primary and secondary mass centers.
    fn radii(&self, x: f64, y: f64, z: f64) -> (f64, f64) {
        let r1 = ((x + self.mu).powi(2) + y * y + z * z).sqrt();
        let r2 = ((x - 1.0 + self.mu).powi(2) + y * y + z * z).sqrt();
        (r1, r2)
    }

    /// Synodic-frame equations of motion.
    ///
    /// Acceleration = gravity of both primaries + centrifugal terms
    /// (x, y in-plane) + Coriolis coupling (±2 velocity cross-terms).
    pub fn equations_of_motion(&self, state: &[f64; 6], dxdt: &mut [f64; 6]) {
        let [x, y, z, vx, vy, vz] = *state;
        let (r1, r2) = self.radii(x, y, z);
        let r1c = r1.powi(3);
        let r2c = r2.powi(3);
        let gm1 = (1.0 - self.mu) / r1c;
        let gm2 = self.mu / r2c;

        dxdt[0] = vx;
        dxdt[1] = vy;
        dxdt[2] = vz;
        dxdt[3] = 2.0 * vy + x - gm1 * (x + self.mu) - gm2 * (x - 1.0 + self.mu);
        dxdt[4] = -2.0 * vx + y - gm1 * y - gm2 * y;
        dxdt[5] = -gm1 * z - gm2 * z;
    }

    /// Jacobi constant of a synodic-frame state.
    ///
    /// C = x² + y² + 2(1-μ)/r₁ + 2μ/r₂ - v²
    pub fn jacobi_constant(&self, state: &[f64; 6]) -> f64 {
        let [x, y, z, vx, vy, vz] = *state;
        let (r1, r2) = self.radii(x, y, z);
        x * x + y * y + 2.0 * (1.0 - self.mu) / r1 + 2.0 * self.mu / r2
            - (vx * vx + vy * vy + vz * vz)
    }

    /// Second derivatives of the effective potential at a position.
    ///
    /// Returns the six independent entries of the symmetric Hessian as
    /// [Uxx, Uyy, Uzz, Uxy, Uxz, Uyz].
    pub fn uxx_matrix(&self, position: &[f64; 3]) -> [f64; 6] {
        let [x, y, z] = *position;
        let (r1, r2) = self.radii(x, y, z);
        let dx1 = x + self.mu;
        let dx2 = x - 1.0 + self.mu;

        let gm1c = (1.0 - self.mu) / r1.powi(3);
        let gm2c = self.mu / r2.powi(3);
        let gm1q = 3.0 * (1.0 - self.mu) / r1.powi(5);
        let gm2q = 3.0 * self.mu / r2.powi(5);

        let uxx = 1.0 - gm1c - gm2c + gm1q * dx1 * dx1 + gm2q * dx2 * dx2;
        let uyy = 1.0 - gm1c - gm2c + gm1q * y * y + gm2q * y * y;
        let uzz = -gm1c - gm2c + gm1q * z * z + gm2q * z * z;
        let uxy = gm1q * dx1 * y + gm2q * dx2 * y;
        let uxz = gm1q * dx1 * z + gm2q * dx2 * z;
        let uyz = gm1q * y * z + gm2q * y * z;

        [uxx, uyy, uzz, uxy, uxz, uyz]
    }

    /// Variational (tangent-space) equations.
    ///
    /// Evolves the perturbation `delta` under the linearization of the
    /// equations of motion about `state`. Evaluated with the same μ and
    /// frame as [`Crtbp::equations_of_motion`]; MEGNO correctness
    /// depends on this being the exact linearization.
    pub fn variational(&self, state: &[f64; 6], delta: &[f64; 6], dddt: &mut [f64; 6]) {
        let [uxx, uyy, uzz, uxy, uxz, uyz] = self.uxx_matrix(&[state[0], state[1], state[2]]);
        let [dx, dy, dz, dvx, dvy, dvz] = *delta;

        dddt[0] = dvx;
        dddt[1] = dvy;
        dddt[2] = dvz;
        dddt[3] = uxx * dx + uxy * dy + uxz * dz + 2.0 * dvy;
        dddt[4] = uxy * dx + uyy * dy + uyz * dz - 2.0 * dvx;
        dddt[5] = uxz * dx + uyz * dy + uzz * dz;
    }
}

impl OdeSystem<6> for Crtbp {
    fn rhs(&self, _t: f64, y: &[f64; 6], dydt: &mut [f64; 6]) {
        self.equations_of_motion(y, dydt);
    }
}

/// The combined 12-dim system [state ‖ variation].
///
/// The primary and variational equations integrate as one coupled
/// vector field: a single adaptive step then controls error in both
/// simultaneously (a poor split would let Jacobi drift distort MEGNO
/// and vice versa).
#[derive(Debug, Clone, Copy)]
pub struct CrtbpVariational(pub Crtbp);

impl OdeSystem<12> for CrtbpVariational {
    fn rhs(&self, _t: f64, y: &[f64; 12], dydt: &mut [f64; 12]) {
        let state = [y[0], y[1], y[2], y[3], y[4], y[5]];
        let delta = [y[6], y[7], y[8], y[9], y[10], y[11]];

        let mut ds = [0.0; 6];
        let mut dd = [0.0; 6];
        self.0.equations_of_motion(&state, &mut ds);
        self.0.variational(&state, &delta, &mut dd);

        dydt[..6].copy_from_slice(&ds);
        dydt[6..].copy_from_slice(&dd);
    }
}

/// Plain two-body Keplerian field with GM = 1, in the inertial frame.
///
/// Validation/comparison mode only; not coupled to the variational
/// system.
#[derive(Debug, Clone, Copy)]
pub struct TwoBody;

impl OdeSystem<6> for TwoBody {
    fn rhs(&self, _t: f64, y: &[f64; 6], dydt: &mut [f64; 6]) {
        let r2 = y[0] * y[0] + y[1] * y[1] + y[2] * y[2];
        let r3 = r2 * r2.sqrt();

        dydt[0] = y[3];
        dydt[1] = y[4];
        dydt[2] = y[5];
        dydt[3] = -y[0] / r3;
        dydt[4] = -y[1] / r3;
        dydt[5] = -y[2] / r3;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const MU: f64 = 0.001;

    #[test]
    fn test_mass_ratio_validation() {
        assert!(Crtbp::new(0.001).is_ok());
        assert!(Crtbp::new(0.5).is_ok());
        assert!(Crtbp::new(0.0).is_err());
        assert!(Crtbp::new(1.0).is_err());
        assert!(Crtbp::new(-0.1).is_err());
        assert!(Crtbp::new(f64::NAN).is_err());
    }

    #[test]
    fn test_jacobi_at_l4_analytic() {
        // At the equilateral point L4 both radii are 1 and the velocity
        // vanishes, so C = x² + y² + 2(1-μ) + 2μ = x² + y² + 2.
        let sys = Crtbp::new(MU).unwrap();
        let x = 0.5 - MU;
        let y = 3.0_f64.sqrt() / 2.0;
        let state = [x, y, 0.0, 0.0, 0.0, 0.0];

        let expected = x * x + y * y + 2.0;
        assert_relative_eq!(sys.jacobi_constant(&state), expected, epsilon = 1e-14);
    }

    #[test]
    fn test_jacobi_circular_orbit_about_secondary() {
        // Small circular orbit about the secondary: C computed directly
        // from the closed-form expression must match the evaluation.
        let sys = Crtbp::new(MU).unwrap();
        let rho = 0.01;
        let x = 1.0 - MU + rho;
        let v_circ = (MU / rho).sqrt() - rho; // synodic-frame circular speed
        let state = [x, 0.0, 0.0, 0.0, v_circ, 0.0];

        let r1 = rho + 1.0;
        let expected =
            x * x + 2.0 * (1.0 - MU) / r1 + 2.0 * MU / rho - v_circ * v_circ;
        assert_relative_eq!(sys.jacobi_constant(&state), expected, epsilon = 1e-13);
    }

    #[test]
    fn test_equilibrium_at_l4() {
        // L4 is an equilibrium of the synodic flow: zero velocity there
        // must give zero acceleration.
        let sys = Crtbp::new(MU).unwrap();
        let state = [0.5 - MU, 3.0_f64.sqrt() / 2.0, 0.0, 0.0, 0.0, 0.0];
        let mut dxdt = [0.0; 6];
        sys.equations_of_motion(&state, &mut dxdt);

        for (i, d) in dxdt.iter().enumerate() {
            assert!(d.abs() < 1e-14, "dxdt[{}] = {} at L4, expected 0", i, d);
        }
    }

    #[test]
    fn test_variational_matches_finite_differences() {
        // The linearization must agree with a central finite difference
        // of the full field for a small perturbation.
        let sys = Crtbp::new(MU).unwrap();
        let state = [0.6, 0.2, 0.05, 0.1, -0.3, 0.02];
        let eps = 1e-7;

        let mut delta = [0.0; 6];
        for dir in 0..6 {
            delta.fill(0.0);
            delta[dir] = 1.0;

            let mut analytic = [0.0; 6];
            sys.variational(&state, &delta, &mut analytic);

            let mut plus = state;
            let mut minus = state;
            plus[dir] += eps;
            minus[dir] -= eps;

            let mut f_plus = [0.0; 6];
            let mut f_minus = [0.0; 6];
            sys.equations_of_motion(&plus, &mut f_plus);
            sys.equations_of_motion(&minus, &mut f_minus);

            for i in 0..6 {
                let numeric = (f_plus[i] - f_minus[i]) / (2.0 * eps);
                assert!(
                    (analytic[i] - numeric).abs() < 1e-5,
                    "Jacobian column {} row {}: analytic {} vs numeric {}",
                    dir,
                    i,
                    analytic[i],
                    numeric
                );
            }
        }
    }

    #[test]
    fn test_uxx_trace_identity() {
        // Away from the primaries the potential satisfies
        // Uxx + Uyy + Uzz = 2 (the gravitational part is harmonic).
        let sys = Crtbp::new(MU).unwrap();
        let [uxx, uyy, uzz, ..] = sys.uxx_matrix(&[0.4, 0.3, 0.1]);
        assert_relative_eq!(uxx + uyy + uzz, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_coupled_system_splits_cleanly() {
        let sys = CrtbpVariational(Crtbp::new(MU).unwrap());
        let mut y = [0.0; 12];
        y[..6].copy_from_slice(&[0.6, 0.2, 0.0, 0.1, -0.3, 0.0]);
        y[6..].copy_from_slice(&[1e-8; 6]);

        let mut dydt = [0.0; 12];
        sys.rhs(0.0, &y, &mut dydt);

        let state: [f64; 6] = y[..6].try_into().unwrap();
        let delta: [f64; 6] = y[6..].try_into().unwrap();
        let mut ds = [0.0; 6];
        let mut dd = [0.0; 6];
        sys.0.equations_of_motion(&state, &mut ds);
        sys.0.variational(&state, &delta, &mut dd);

        for i in 0..6 {
            assert_eq!(dydt[i], ds[i]);
            assert_eq!(dydt[6 + i], dd[i]);
        }
    }

    #[test]
    fn test_two_body_circular_orbit() {
        use crate::solver::{Dopri5, Tolerances};

        let y0 = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let period = 2.0 * std::f64::consts::PI;

        let tol = Tolerances::new(1e-12, 1e-12);
        let mut solver = Dopri5::new(tol);
        let (_, yf) = solver.integrate(&TwoBody, 0.0, &y0, period, 0.01).unwrap();

        for i in 0..6 {
            assert!(
                (yf[i] - y0[i]).abs() < 1e-8,
                "Component {} did not return: {} vs {}",
                i,
                yf[i],
                y0[i]
            );
        }
    }
}
