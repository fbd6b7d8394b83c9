//! Dormand-Prince 5(4) Coefficients
//!
//! Coefficients for the 7-stage embedded RK5(4) pair (RK5(4)7M) from:
//! Dormand, J.R. & Prince, P.J. (1980). "A family of embedded
//! Runge-Kutta formulae". Journal of Computational and Applied
//! Mathematics, 6(1), 19-26.
//!
//! This method provides a 5th-order solution with a 4th-order
//! embedded method for error estimation and adaptive step control.
//! The last stage is evaluated at the accepted solution (FSAL), but
//! the driver here does not exploit that property; each step computes
//! all seven stages.

/// Number of stages in the DP5(4) method
pub const STAGES: usize = 7;

/// Order of the higher-order method (used for advancing the solution)
pub const ORDER: u8 = 5;

/// Order of the embedded method (used for error estimation)
pub const EMBEDDED_ORDER: u8 = 4;

/// Node coefficients (c_i) - the points at which f(t,y) is evaluated
/// c[i] represents t_n + c[i]*h
pub const C: [f64; STAGES] = [
    0.0,        // c[0]
    1.0 / 5.0,  // c[1]
    3.0 / 10.0, // c[2]
    4.0 / 5.0,  // c[3]
    8.0 / 9.0,  // c[4]
    1.0,        // c[5]
    1.0,        // c[6]  (evaluated at the 5th-order solution)
];

/// Runge-Kutta matrix (a_ij) coefficients
///
/// Lower-triangular matrix where:
/// k_i = f(t_n + c_i*h, y_n + h * sum_{j=0}^{i-1} a_{i,j} * k_j)
///
/// Stored as A[i][j] for row i, column j (j < i)
pub const A: [[f64; 6]; 7] = [
    // Row 0: k_0 = f(t_n, y_n)
    [0.0; 6],
    // Row 1
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    // Row 2
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0],
    // Row 3
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0],
    // Row 4
    [
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
        0.0,
        0.0,
    ],
    // Row 5
    [
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
        0.0,
    ],
    // Row 6 (equal to the 5th-order weights: FSAL row)
    [
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
    ],
];

/// 5th-order solution weights (b_i)
pub const B: [f64; STAGES] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
    0.0,
];

/// Error-estimate weights (b_i - b̂_i), where b̂ are the 4th-order weights
///
/// The local error estimate is h * sum_i B_ERR[i] * k_i.
pub const B_ERR: [f64; STAGES] = [
    71.0 / 57600.0,
    0.0,
    -71.0 / 16695.0,
    71.0 / 1920.0,
    -17253.0 / 339200.0,
    22.0 / 525.0,
    -1.0 / 40.0,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_sums_match_nodes() {
        // Consistency condition: sum_j a_ij = c_i
        for i in 0..STAGES {
            let row_sum: f64 = A[i].iter().sum();
            assert!(
                (row_sum - C[i]).abs() < 1e-14,
                "Row {} sums to {}, expected c = {}",
                i,
                row_sum,
                C[i]
            );
        }
    }

    #[test]
    fn test_weights_sum_to_one() {
        let b_sum: f64 = B.iter().sum();
        assert!((b_sum - 1.0).abs() < 1e-14, "B sums to {}", b_sum);
    }

    #[test]
    fn test_error_weights_sum_to_zero() {
        // Both embedded solutions are consistent, so the difference of
        // their weights must vanish.
        let e_sum: f64 = B_ERR.iter().sum();
        assert!(e_sum.abs() < 1e-14, "B_ERR sums to {}", e_sum);
    }
}
