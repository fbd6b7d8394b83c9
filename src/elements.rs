//! Orbital Elements and Cartesian Conversions
//!
//! Classical Keplerian elements in normalized units (GM = 1, the total
//! mass of the system), with conversions in both directions. The
//! anomaly slot can hold either the true or the mean anomaly; mean ↔
//! true conversion is delegated to the [`crate::kepler`] module.

use serde::{Deserialize, Serialize};

use crate::kepler::{self, KeplerError};

/// Which anomaly the `anomaly` field of [`OrbitalElements`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AnomalyKind {
    /// True anomaly θ (geometric angle from pericenter)
    #[default]
    True,
    /// Mean anomaly M (uniform in time)
    Mean,
}

/// Classical Keplerian orbital elements, angles in radians.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrbitalElements {
    /// Semi-major axis (normalized units)
    pub a: f64,
    /// Eccentricity (0 ≤ e < 1 for the conversions here)
    pub e: f64,
    /// Inclination (rad)
    pub i: f64,
    /// Longitude of ascending node (rad)
    pub raan: f64,
    /// Argument of pericenter (rad)
    pub aop: f64,
    /// Anomaly (rad); interpretation given by `kind`
    pub anomaly: f64,
    /// Whether `anomaly` is the true or the mean anomaly
    pub kind: AnomalyKind,
}

/// Below this magnitude the node or eccentricity vector is treated as
/// degenerate (equatorial / circular) and the dependent angles are
/// measured from the x-axis instead.
const DEGENERATE_EPS: f64 = 1e-11;

impl OrbitalElements {
    /// The elements as a flat [a, e, i, ω_node, ω_peri, anomaly] array,
    /// in sample-output order.
    pub fn as_array(&self) -> [f64; 6] {
        [self.a, self.e, self.i, self.raan, self.aop, self.anomaly]
    }

    /// Convert to a Cartesian inertial-frame state (GM = 1).
    ///
    /// Builds the perifocal state and rotates it through the 3-1-3
    /// angle sequence (Ω, i, ω). If `kind` is [`AnomalyKind::Mean`] the
    /// anomaly is first converted via Newton iteration, which can fail
    /// to converge.
    pub fn to_state(&self, kepler_tol: f64, kepler_max_iter: usize) -> Result<[f64; 6], KeplerError> {
        let nu = match self.kind {
            AnomalyKind::True => self.anomaly,
            AnomalyKind::Mean => {
                kepler::mean_to_true(self.anomaly, self.e, kepler_tol, kepler_max_iter)?
            }
        };

        let p = self.a * (1.0 - self.e * self.e);
        let r_mag = p / (1.0 + self.e * nu.cos());

        // Perifocal position and velocity (GM = 1)
        let r_pqw = [r_mag * nu.cos(), r_mag * nu.sin(), 0.0];
        let v_factor = (1.0 / p).sqrt();
        let v_pqw = [-v_factor * nu.sin(), v_factor * (self.e + nu.cos()), 0.0];

        // Rotation PQW -> inertial
        let (sin_raan, cos_raan) = self.raan.sin_cos();
        let (sin_aop, cos_aop) = self.aop.sin_cos();
        let (sin_i, cos_i) = self.i.sin_cos();

        let rot = [
            [
                cos_raan * cos_aop - sin_raan * sin_aop * cos_i,
                -cos_raan * sin_aop - sin_raan * cos_aop * cos_i,
                sin_raan * sin_i,
            ],
            [
                sin_raan * cos_aop + cos_raan * sin_aop * cos_i,
                -sin_raan * sin_aop + cos_raan * cos_aop * cos_i,
                -cos_raan * sin_i,
            ],
            [sin_aop * sin_i, cos_aop * sin_i, cos_i],
        ];

        let mut state = [0.0; 6];
        for j in 0..3 {
            for k in 0..3 {
                state[j] += rot[j][k] * r_pqw[k];
                state[j + 3] += rot[j][k] * v_pqw[k];
            }
        }
        Ok(state)
    }

    /// Recover Keplerian elements from a Cartesian inertial state
    /// (GM = 1), reporting the anomaly in the requested form.
    ///
    /// Standard h / node / eccentricity-vector construction. Degenerate
    /// geometries fall back to measuring angles from the x-axis:
    /// equatorial orbits get Ω = 0, circular orbits get ω = 0 with the
    /// anomaly counted from the node.
    pub fn from_state(state: &[f64; 6], kind: AnomalyKind) -> Self {
        let r = [state[0], state[1], state[2]];
        let v = [state[3], state[4], state[5]];
        let r_mag = norm3(&r);
        let v2 = v[0] * v[0] + v[1] * v[1] + v[2] * v[2];

        // Specific angular momentum and node vector
        let h = cross3(&r, &v);
        let h_mag = norm3(&h);
        let n = [-h[1], h[0], 0.0];
        let n_mag = norm3(&n);

        // Eccentricity vector: e = v × h - r̂  (GM = 1)
        let vxh = cross3(&v, &h);
        let e_vec = [
            vxh[0] - r[0] / r_mag,
            vxh[1] - r[1] / r_mag,
            vxh[2] - r[2] / r_mag,
        ];
        let e = norm3(&e_vec);

        // Vis-viva
        let energy = v2 / 2.0 - 1.0 / r_mag;
        let a = -1.0 / (2.0 * energy);

        let i = (h[2] / h_mag).acos();

        let raan = if n_mag > DEGENERATE_EPS {
            wrap_angle(n[1].atan2(n[0]))
        } else {
            0.0
        };

        let (aop, nu) = if e > DEGENERATE_EPS {
            let aop = if n_mag > DEGENERATE_EPS {
                let mut w = (dot3(&n, &e_vec) / (n_mag * e)).clamp(-1.0, 1.0).acos();
                if e_vec[2] < 0.0 {
                    w = 2.0 * std::f64::consts::PI - w;
                }
                w
            } else {
                // Equatorial: pericenter measured from the x-axis
                let mut w = wrap_angle(e_vec[1].atan2(e_vec[0]));
                if h[2] < 0.0 {
                    w = 2.0 * std::f64::consts::PI - w;
                }
                w
            };

            let mut nu = (dot3(&e_vec, &r) / (e * r_mag)).clamp(-1.0, 1.0).acos();
            if dot3(&r, &v) < 0.0 {
                nu = 2.0 * std::f64::consts::PI - nu;
            }
            (aop, nu)
        } else {
            // Circular: anomaly counted from the node (or x-axis).
            // Recovered via atan2 rather than acos of a dot product,
            // which is ill conditioned near u = 0 (acos(1-ε) ≈ √(2ε)).
            let reference = if n_mag > DEGENERATE_EPS { n } else { [1.0, 0.0, 0.0] };
            let sin_u = dot3(&cross3(&reference, &r), &h) / h_mag;
            let cos_u = dot3(&reference, &r);
            (0.0, wrap_angle(sin_u.atan2(cos_u)))
        };

        let anomaly = match kind {
            AnomalyKind::True => nu,
            AnomalyKind::Mean => wrap_angle(kepler::true_to_mean(nu, e)),
        };

        Self {
            a,
            e,
            i,
            raan,
            aop,
            anomaly,
            kind,
        }
    }
}

fn norm3(v: &[f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

fn dot3(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross3(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Normalize an angle to [0, 2π).
pub fn wrap_angle(angle: f64) -> f64 {
    angle.rem_euclid(2.0 * std::f64::consts::PI)
}
