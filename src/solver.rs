//! Adaptive Dormand-Prince 5(4) Integration Driver
//!
//! A 7-stage embedded RK5(4) pair with proportional step-size control,
//! driving integration purely by accepted steps (no dense output).
//! After every accepted step an observer hook is invoked; the observer
//! updates diagnostics and can terminate the run early.
//!
//! Reference: Dormand & Prince (1980); Hairer, Nørsett & Wanner,
//! "Solving Ordinary Differential Equations I", Springer.

use crate::coefficients::{A, B, B_ERR, C, STAGES};

/// System of ordinary differential equations: dy/dt = f(t, y)
pub trait OdeSystem<const N: usize> {
    /// Evaluate the right-hand side of the ODE system
    ///
    /// # Arguments
    /// * `t` - Current time
    /// * `y` - Current state vector
    /// * `dydt` - Output: derivative dy/dt
    fn rhs(&self, t: f64, y: &[f64; N], dydt: &mut [f64; N]);
}

/// Flag returned by the per-step observer.
///
/// Replaces stack-unwinding control flow: the driver loop inspects the
/// flag after every accepted step and maps it onto the run outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepFlag {
    /// Proceed with integration as normal
    Continue,
    /// The observed diagnostics crossed their divergence threshold;
    /// stop integrating this trajectory (a normal terminal signal)
    Diverged,
    /// The observer could not complete (e.g. its sink failed);
    /// abort the run as a failure
    Failed,
}

/// Callback hook executed after each accepted step.
///
/// The driver calls `observe` with the accepted-step counter (starting
/// at 1), the new abscissa, the solution at that abscissa, and the step
/// size that was used.
pub trait StepObserver<const N: usize> {
    /// Inspect the freshly accepted state and decide whether to continue.
    fn observe(&mut self, nstep: u64, t: f64, y: &[f64; N], h: f64) -> StepFlag;
}

/// Observer that does nothing and never interrupts.
pub struct NullObserver;

impl<const N: usize> StepObserver<N> for NullObserver {
    fn observe(&mut self, _nstep: u64, _t: f64, _y: &[f64; N], _h: f64) -> StepFlag {
        StepFlag::Continue
    }
}

/// Integration result from a single step
#[derive(Debug, Clone)]
pub struct StepResult<const N: usize> {
    /// New state after the step (5th-order solution)
    pub y: [f64; N],
    /// New time value
    pub t: f64,
    /// Normalized error estimate (should be ≤ 1.0 for acceptance)
    pub error: f64,
    /// Suggested step size for next step
    pub h_next: f64,
    /// Whether the step was accepted
    pub accepted: bool,
}

/// Integration statistics for diagnostics
#[derive(Debug, Clone, Default)]
pub struct Stats {
    /// Total number of function evaluations
    pub fn_evals: u64,
    /// Number of accepted steps
    pub accepted_steps: u64,
    /// Number of rejected steps
    pub rejected_steps: u64,
}

/// Step-size controller using an I-controller
///
/// h_new = safety * h * error^(-1/(p+1)) where p = 4 is the order of
/// the embedded error estimate.
#[derive(Clone)]
pub struct StepController {
    /// Safety factor (0.8-0.9 typical)
    pub safety: f64,
    /// Maximum growth factor per step
    pub max_factor: f64,
    /// Minimum reduction factor per step
    pub min_factor: f64,
    /// Exponent = 1/(order + 1) for I-controller
    exponent: f64,
}

impl Default for StepController {
    fn default() -> Self {
        Self {
            safety: 0.9,
            max_factor: 5.0,
            min_factor: 0.2,
            exponent: 1.0 / 5.0,
        }
    }
}

impl StepController {
    /// Compute the step size adjustment factor
    pub fn compute_factor(&self, error: f64) -> f64 {
        if error == 0.0 {
            return self.max_factor;
        }

        let factor = self.safety * error.powf(-self.exponent);
        factor.clamp(self.min_factor, self.max_factor)
    }
}

/// Tolerance specification for error control
///
/// Error is computed as: |y5 - y4| / (atol + rtol * |y5|)
#[derive(Debug, Clone)]
pub struct Tolerances<const N: usize> {
    /// Absolute tolerance per component
    pub atol: [f64; N],
    /// Relative tolerance per component
    pub rtol: [f64; N],
}

impl<const N: usize> Tolerances<N> {
    /// Create tolerances with uniform values
    pub fn new(atol: f64, rtol: f64) -> Self {
        Self {
            atol: [atol; N],
            rtol: [rtol; N],
        }
    }

    /// Create tolerances with per-component values
    pub fn with_components(atol: [f64; N], rtol: [f64; N]) -> Self {
        Self { atol, rtol }
    }
}

/// Adaptive Dormand-Prince 5(4) solver
///
/// # Type Parameters
/// * `N` - Dimension of the state vector
#[derive(Clone)]
pub struct Dopri5<const N: usize> {
    /// Tolerance specification
    tol: Tolerances<N>,
    /// Step-size controller
    controller: StepController,
    /// Minimum step size
    pub h_min: f64,
    /// Maximum step size
    pub h_max: f64,
    /// Maximum number of integration steps before error
    pub max_steps: u64,
    /// Stage evaluations (pre-allocated workspace)
    k: [[f64; N]; STAGES],
    /// Integration statistics
    pub stats: Stats,
}

impl<const N: usize> Dopri5<N> {
    /// Create a new DP5(4) solver with specified tolerances
    pub fn new(tol: Tolerances<N>) -> Self {
        Self {
            tol,
            controller: StepController::default(),
            h_min: 1e-14,
            h_max: f64::INFINITY,
            max_steps: 100_000_000,
            k: [[0.0; N]; STAGES],
            stats: Stats::default(),
        }
    }

    /// Set minimum and maximum step sizes
    pub fn set_step_limits(&mut self, h_min: f64, h_max: f64) {
        self.h_min = h_min;
        self.h_max = h_max;
    }

    /// Perform a single integration step
    ///
    /// Computes the 7 stages, forms the 5th-order solution, estimates
    /// the local error from the embedded 4th-order pair, and determines
    /// whether the step should be accepted.
    pub fn step<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
        t: f64,
        y: &[f64; N],
        h: f64,
    ) -> StepResult<N> {
        let h = h.signum() * h.abs().clamp(self.h_min, self.h_max);

        self.compute_stages(sys, t, y, h);

        let y5 = self.compute_solution(y, h);
        let error = self.compute_error(&y5, h);
        let accepted = error <= 1.0;

        let factor = self.controller.compute_factor(error);
        let h_next = (h.abs() * factor).clamp(self.h_min, self.h_max);

        self.stats.fn_evals += STAGES as u64;
        if accepted {
            self.stats.accepted_steps += 1;
        } else {
            self.stats.rejected_steps += 1;
        }

        StepResult {
            y: y5,
            t: t + h,
            error,
            h_next,
            accepted,
        }
    }

    /// Integrate from t0 to tf without observation.
    ///
    /// # Returns
    /// * `Ok((t_final, y_final))` on success
    /// * `Err(IntegrationError)` on failure
    pub fn integrate<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
    ) -> Result<(f64, [f64; N]), IntegrationError> {
        match self.integrate_observed(sys, &mut NullObserver, t0, y0, tf, h0)? {
            Propagation::Completed { t, y } | Propagation::Diverged { t, y } => Ok((t, y)),
        }
    }

    /// Integrate from t0 to tf with adaptive steps, invoking the
    /// observer after every accepted step.
    ///
    /// Step acceptance is deterministic for a given tolerance and
    /// initial step. A rejected step is retried with a smaller size
    /// silently; only exhausting `h_min` without acceptance escalates
    /// to [`IntegrationError::StepSizeTooSmall`].
    pub fn integrate_observed<S, O>(
        &mut self,
        sys: &S,
        observer: &mut O,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
    ) -> Result<Propagation<N>, IntegrationError>
    where
        S: OdeSystem<N>,
        O: StepObserver<N>,
    {
        if t0 == tf {
            return Ok(Propagation::Completed { t: t0, y: *y0 });
        }
        self.validate_inputs(t0, y0, tf, h0)?;

        let mut t = t0;
        let mut y = *y0;
        let mut h = h0;

        let direction = (tf - t0).signum();
        let mut step_count = 0u64;
        let mut nstep = 0u64;

        while (tf - t) * direction > self.h_min {
            // Don't overshoot the endpoint
            if (t + h - tf) * direction > 0.0 {
                h = tf - t;
            }

            let result = self.step(sys, t, &y, h);

            if result.accepted {
                t = result.t;
                y = result.y;
                if !y.iter().all(|v| v.is_finite()) {
                    return Err(IntegrationError::NonFiniteState { t });
                }

                nstep += 1;
                match observer.observe(nstep, t, &y, h) {
                    StepFlag::Continue => {}
                    StepFlag::Diverged => return Ok(Propagation::Diverged { t, y }),
                    StepFlag::Failed => return Err(IntegrationError::ObserverFailed { t }),
                }
            }

            h = result.h_next * direction;

            step_count += 1;
            if step_count > self.max_steps {
                return Err(IntegrationError::MaxStepsExceeded);
            }

            // If the step was rejected and the next step size is already
            // at h_min, no further progress is possible.
            if !result.accepted && result.h_next <= self.h_min && (tf - t) * direction > self.h_min
            {
                return Err(IntegrationError::StepSizeTooSmall {
                    t,
                    h: result.h_next,
                });
            }
        }

        Ok(Propagation::Completed { t, y })
    }

    /// Integrate from t0 to tf with a constant step size and no error
    /// control, invoking the observer after every step.
    ///
    /// Comparison driver: every step takes the 5th-order solution
    /// unconditionally. The final step is shortened to land on `tf`.
    pub fn integrate_fixed<S, O>(
        &mut self,
        sys: &S,
        observer: &mut O,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h: f64,
    ) -> Result<Propagation<N>, IntegrationError>
    where
        S: OdeSystem<N>,
        O: StepObserver<N>,
    {
        if t0 == tf {
            return Ok(Propagation::Completed { t: t0, y: *y0 });
        }
        self.validate_inputs(t0, y0, tf, h)?;

        let mut t = t0;
        let mut y = *y0;
        let direction = (tf - t0).signum();
        let mut nstep = 0u64;

        while (tf - t) * direction > self.h_min {
            let mut hs = h;
            if (t + hs - tf) * direction > 0.0 {
                hs = tf - t;
            }

            self.compute_stages(sys, t, &y, hs);
            y = self.compute_solution(&y, hs);
            t += hs;
            self.stats.fn_evals += STAGES as u64;
            self.stats.accepted_steps += 1;

            if !y.iter().all(|v| v.is_finite()) {
                return Err(IntegrationError::NonFiniteState { t });
            }

            nstep += 1;
            match observer.observe(nstep, t, &y, hs) {
                StepFlag::Continue => {}
                StepFlag::Diverged => return Ok(Propagation::Diverged { t, y }),
                StepFlag::Failed => return Err(IntegrationError::ObserverFailed { t }),
            }

            if nstep > self.max_steps {
                return Err(IntegrationError::MaxStepsExceeded);
            }
        }

        Ok(Propagation::Completed { t, y })
    }

    /// Compute all 7 stages
    #[allow(clippy::needless_range_loop)]
    fn compute_stages<S: OdeSystem<N>>(&mut self, sys: &S, t: f64, y: &[f64; N], h: f64) {
        let mut y_temp = [0.0; N];

        // Stage 0: k[0] = f(t, y)
        sys.rhs(t, y, &mut self.k[0]);

        // Stages 1-6
        for i in 1..STAGES {
            // y_temp = y + h * sum_{j=0}^{i-1} a[i][j] * k[j]
            for n in 0..N {
                let mut sum = 0.0;
                for j in 0..i {
                    sum += A[i][j] * self.k[j][n];
                }
                y_temp[n] = y[n] + h * sum;
            }

            sys.rhs(t + C[i] * h, &y_temp, &mut self.k[i]);
        }
    }

    /// Compute the 5th-order solution from the stages
    #[allow(clippy::needless_range_loop)]
    fn compute_solution(&self, y: &[f64; N], h: f64) -> [f64; N] {
        let mut y_new = [0.0; N];

        for n in 0..N {
            let mut sum = 0.0;
            for i in 0..STAGES {
                sum += B[i] * self.k[i][n];
            }
            y_new[n] = y[n] + h * sum;
        }

        y_new
    }

    /// Compute the normalized error estimate
    ///
    /// Uses the infinity norm of the scaled error:
    /// error = max_i( |h * sum_j (b[j] - b_hat[j]) * k[j][i]| / scale[i] )
    /// where scale[i] = atol[i] + rtol[i] * |y5[i]|
    #[allow(clippy::needless_range_loop)]
    fn compute_error(&self, y5: &[f64; N], h: f64) -> f64 {
        let mut max_err: f64 = 0.0;

        for n in 0..N {
            let mut err_n = 0.0;
            for i in 0..STAGES {
                err_n += B_ERR[i] * self.k[i][n];
            }
            err_n *= h;

            let scale = self.tol.atol[n] + self.tol.rtol[n] * y5[n].abs();
            let scaled_err = err_n.abs() / scale;

            max_err = max_err.max(scaled_err);
        }

        max_err
    }

    /// Reset statistics
    pub fn reset_stats(&mut self) {
        self.stats = Stats::default();
    }

    /// Validate integration inputs
    fn validate_inputs(
        &self,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
    ) -> Result<(), IntegrationError> {
        if !t0.is_finite() || !tf.is_finite() || !h0.is_finite() {
            return Err(IntegrationError::InvalidInput {
                message: "t0, tf, and h0 must be finite".to_string(),
            });
        }
        if h0 == 0.0 {
            return Err(IntegrationError::InvalidInput {
                message: "h0 must be non-zero".to_string(),
            });
        }
        let direction = tf - t0;
        if direction != 0.0 && h0.signum() != direction.signum() {
            return Err(IntegrationError::InvalidInput {
                message: "h0 sign must match integration direction (tf - t0)".to_string(),
            });
        }
        for (i, &val) in y0.iter().enumerate() {
            if !val.is_finite() {
                return Err(IntegrationError::InvalidInput {
                    message: format!("y0[{}] is not finite", i),
                });
            }
        }
        for (i, (&a, &r)) in self.tol.atol.iter().zip(self.tol.rtol.iter()).enumerate() {
            if !a.is_finite() || a <= 0.0 {
                return Err(IntegrationError::InvalidInput {
                    message: format!("atol[{}] must be positive and finite", i),
                });
            }
            if !r.is_finite() || r < 0.0 {
                return Err(IntegrationError::InvalidInput {
                    message: format!("rtol[{}] must be non-negative and finite", i),
                });
            }
        }
        Ok(())
    }
}

/// Result of an observed integration run
#[derive(Debug, Clone)]
pub enum Propagation<const N: usize> {
    /// Integration reached the requested final time
    Completed {
        /// Final time
        t: f64,
        /// Final state vector
        y: [f64; N],
    },
    /// The observer signalled divergence and the run stopped early
    Diverged {
        /// Time at which the observer tripped
        t: f64,
        /// State at that time
        y: [f64; N],
    },
}

/// Errors that can occur during integration
#[derive(Debug, Clone)]
pub enum IntegrationError {
    /// Step size became too small
    StepSizeTooSmall {
        /// Time at which step size became too small
        t: f64,
        /// Step size that was too small
        h: f64,
    },
    /// Maximum number of steps exceeded
    MaxStepsExceeded,
    /// Invalid input parameters
    InvalidInput {
        /// Description of the invalid input
        message: String,
    },
    /// Non-finite state detected during integration
    NonFiniteState {
        /// Time at which non-finite state was detected
        t: f64,
    },
    /// The per-step observer reported a failure
    ObserverFailed {
        /// Time at which the observer failed
        t: f64,
    },
}

impl std::fmt::Display for IntegrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrationError::StepSizeTooSmall { t, h } => {
                write!(f, "Step size {} too small at t = {}", h, t)
            }
            IntegrationError::MaxStepsExceeded => {
                write!(f, "Maximum number of integration steps exceeded")
            }
            IntegrationError::InvalidInput { message } => {
                write!(f, "Invalid input: {}", message)
            }
            IntegrationError::NonFiniteState { t } => {
                write!(f, "Non-finite state detected at t = {}", t)
            }
            IntegrationError::ObserverFailed { t } => {
                write!(f, "Step observer failed at t = {}", t)
            }
        }
    }
}

impl std::error::Error for IntegrationError {}
