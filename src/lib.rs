//! # crtbp
//!
//! Propagation of massless test particles in the circular restricted
//! three-body problem, with chaos diagnostics.
//!
//! The synodic (rotating) frame uses nondimensional units: the primary
//! separation, the total mass, and the mean motion are all 1, so one
//! revolution of the primaries takes 2π time units. The primaries sit
//! at (-μ, 0, 0) and (1-μ, 0, 0).
//!
//! Each particle carries its 6-dim state coupled with a 6-dim
//! variational (tangent) vector, integrated together as one 12-dim
//! system by an adaptive Dormand-Prince 5(4) solver. Per-step
//! diagnostics track the relative drift of the Jacobi constant (a pure
//! accuracy signal) and the MEGNO / LCN chaos indicators; a trajectory
//! whose MEGNO mean crosses the configured threshold is cut short and
//! reported as diverged.
//!
//! ## Example
//!
//! ```
//! use crtbp::{MemorySink, Orbit, Outcome, Propagator, Settings};
//!
//! let settings = Settings {
//!     mu: 1e-3,
//!     end_time: 4.0 * std::f64::consts::TAU,
//!     settle_time: 1e9,
//!     ..Settings::default()
//! };
//! let propagator = Propagator::new(settings)?;
//!
//! let mut orbit = Orbit::circular_about_secondary("demo", propagator.system(), 0.02);
//! let mut sink = MemorySink::default();
//! let summary = propagator.integrate_single(&mut orbit, &mut sink);
//!
//! assert!(matches!(summary.outcome, Outcome::Completed));
//! assert!(summary.jacobi_error.abs() < 1e-9);
//! # Ok::<(), crtbp::InvalidMassRatio>(())
//! ```
//!
//! Batches fan out over a rayon worker pool via
//! [`Propagator::integrate_batch`]; a failing orbit never takes its
//! neighbours down.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod coefficients;
pub mod dynamics;
pub mod elements;
pub mod frames;
pub mod input;
pub mod kepler;
pub mod observer;
pub mod orbit;
pub mod propagate;
pub mod solver;

pub use dynamics::{Crtbp, CrtbpVariational, InvalidMassRatio, TwoBody};
pub use elements::{AnomalyKind, OrbitalElements};
pub use input::{read_orbits, read_states, InputError};
pub use kepler::KeplerError;
pub use observer::{
    ConsoleSink, DiagnosticObserver, MemorySink, OutputKind, Sample, SampleSink, TsvSink,
};
pub use orbit::{Megno, Orbit, VARIATION_SEED};
pub use propagate::{Outcome, Propagator, RunSummary, Settings};
pub use solver::{
    Dopri5, IntegrationError, NullObserver, OdeSystem, Propagation, StepFlag, StepObserver,
    StepResult, Stats, Tolerances,
};
