//! Propagation Driver
//!
//! Ties the pieces together: [`Settings`] carries every knob
//! explicitly (no globals), [`Propagator`] runs one orbit or a batch,
//! and [`RunSummary`] reports the per-orbit outcome. Batch runs fan
//! out over a rayon worker pool; one orbit failing never aborts its
//! neighbours.

use rayon::prelude::*;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::dynamics::{Crtbp, CrtbpVariational, InvalidMassRatio};
use crate::elements::OrbitalElements;
use crate::frames;
use crate::kepler::KeplerError;
use crate::observer::{DiagnosticObserver, OutputKind, SampleSink};
use crate::orbit::Orbit;
use crate::solver::{Dopri5, IntegrationError, Propagation, Tolerances};

/// Complete run configuration.
///
/// Deserializable so a run can be described in a settings file;
/// every field has a default for partial configs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Mass ratio μ = m₂/(m₁+m₂), must lie in (0, 1)
    pub mu: f64,
    /// Final time in synodic units (one period = 2π)
    pub end_time: f64,
    /// Initial step size suggestion
    pub initial_step: f64,
    /// Emit a sample every this many accepted steps; 0 disables output
    pub sample_every: u64,
    /// MEGNO mean at which a trajectory is declared chaotic
    pub megno_threshold: f64,
    /// Time before which the MEGNO mean is not consulted
    pub settle_time: f64,
    /// Absolute tolerance for step-error control
    pub atol: f64,
    /// Relative tolerance for step-error control
    pub rtol: f64,
    /// Smallest allowed step size
    pub h_min: f64,
    /// Hard cap on attempted steps per orbit
    pub max_steps: u64,
    /// Interpretation of the sample coordinate columns
    pub output: OutputKind,
    /// Kepler-solver tolerance for element conversions
    pub kepler_tol: f64,
    /// Kepler-solver iteration bound
    pub kepler_max_iter: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mu: 1e-3,
            end_time: 1e4 * std::f64::consts::TAU,
            initial_step: 0.01,
            sample_every: 100,
            megno_threshold: 8.0,
            settle_time: 100.0 * std::f64::consts::TAU,
            atol: 1e-12,
            rtol: 1e-12,
            h_min: 1e-14,
            max_steps: 100_000_000,
            output: OutputKind::Elements,
            kepler_tol: 1e-14,
            kepler_max_iter: 50,
        }
    }
}

/// Terminal state of one orbit's run.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Reached the requested end time
    Completed,
    /// MEGNO crossed the chaos threshold; stopped early on purpose
    Diverged,
    /// The integrator could not finish
    Failed(IntegrationError),
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Outcome::Completed => serializer.serialize_str("completed"),
            Outcome::Diverged => serializer.serialize_str("diverged"),
            Outcome::Failed(e) => serializer.serialize_str(&format!("failed: {}", e)),
        }
    }
}

/// Per-orbit result record for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Orbit name
    pub name: String,
    /// How the run ended
    pub outcome: Outcome,
    /// Time actually reached, in synodic periods
    pub final_time_years: f64,
    /// Final relative Jacobi drift
    pub jacobi_error: f64,
    /// Final time-averaged MEGNO
    pub megno: f64,
    /// Maximum of the MEGNO mean after the settle time
    pub megno_max: f64,
    /// Final LCN estimate
    pub lcn: f64,
    /// Accepted steps taken
    pub steps: u64,
}

impl RunSummary {
    fn from_orbit(orbit: &Orbit, outcome: Outcome) -> Self {
        Self {
            name: orbit.name().to_string(),
            outcome,
            final_time_years: orbit.time() / std::f64::consts::TAU,
            jacobi_error: orbit.jacobi_error(),
            megno: orbit.megno().mean(),
            megno_max: orbit.megno().max(),
            lcn: orbit.lcn(),
            steps: orbit.step_count(),
        }
    }

    /// True when the run ended without an integrator error.
    pub fn is_ok(&self) -> bool {
        !matches!(self.outcome, Outcome::Failed(_))
    }
}

/// Runs orbits against one CRTBP system under one [`Settings`].
pub struct Propagator {
    system: CrtbpVariational,
    settings: Settings,
}

impl Propagator {
    /// Build a propagator; rejects mass ratios outside (0, 1).
    pub fn new(settings: Settings) -> Result<Self, InvalidMassRatio> {
        let system = CrtbpVariational(Crtbp::new(settings.mu)?);
        Ok(Self { system, settings })
    }

    /// The underlying dynamics model.
    pub fn system(&self) -> &Crtbp {
        &self.system.0
    }

    /// The active settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Seed an orbit from osculating elements (inertial, GM = 1),
    /// placed in the rotating frame at t = 0.
    pub fn orbit_from_elements(
        &self,
        name: impl Into<String>,
        elements: &OrbitalElements,
    ) -> Result<Orbit, KeplerError> {
        let state = frames::elements_to_rot(
            elements,
            0.0,
            self.settings.kepler_tol,
            self.settings.kepler_max_iter,
        )?;
        Ok(Orbit::new(name, state))
    }

    fn make_solver(&self) -> Dopri5<12> {
        let mut solver = Dopri5::new(Tolerances::new(self.settings.atol, self.settings.rtol));
        solver.set_step_limits(self.settings.h_min, f64::INFINITY);
        solver.max_steps = self.settings.max_steps;
        solver
    }

    /// Propagate one orbit with adaptive steps, emitting samples into
    /// `sink`. Diagnostics end up on the orbit record; the summary is
    /// a snapshot of them plus the outcome.
    pub fn integrate_single<S: SampleSink>(&self, orbit: &mut Orbit, sink: &mut S) -> RunSummary {
        self.run(orbit, sink, false)
    }

    /// Propagate one orbit with a constant step size (no error
    /// control). Comparison driver for accuracy studies against the
    /// adaptive path.
    pub fn integrate_single_fixed<S: SampleSink>(
        &self,
        orbit: &mut Orbit,
        sink: &mut S,
    ) -> RunSummary {
        self.run(orbit, sink, true)
    }

    fn run<S: SampleSink>(&self, orbit: &mut Orbit, sink: &mut S, fixed: bool) -> RunSummary {
        orbit.seed_jacobi(&self.system.0);
        let y0 = *orbit.combined();
        let mut solver = self.make_solver();

        let result = {
            let mut observer = DiagnosticObserver::new(
                &self.system.0,
                orbit,
                sink,
                self.settings.sample_every,
                self.settings.megno_threshold,
                self.settings.settle_time,
                self.settings.output,
            );
            if fixed {
                solver.integrate_fixed(
                    &self.system,
                    &mut observer,
                    0.0,
                    &y0,
                    self.settings.end_time,
                    self.settings.initial_step,
                )
            } else {
                solver.integrate_observed(
                    &self.system,
                    &mut observer,
                    0.0,
                    &y0,
                    self.settings.end_time,
                    self.settings.initial_step,
                )
            }
        };

        let outcome = match result {
            Ok(Propagation::Completed { .. }) => Outcome::Completed,
            Ok(Propagation::Diverged { .. }) => Outcome::Diverged,
            Err(e) => Outcome::Failed(e),
        };
        RunSummary::from_orbit(orbit, outcome)
    }

    /// Propagate a batch of orbits in parallel.
    ///
    /// Each worker gets its own sink from `make_sink`, so sinks need
    /// no synchronization. A failed orbit yields a `Failed` summary;
    /// the rest of the batch is unaffected. Summaries come back in
    /// input order.
    pub fn integrate_batch<S, F>(&self, orbits: &mut [Orbit], make_sink: F) -> Vec<RunSummary>
    where
        S: SampleSink,
        F: Fn(&Orbit) -> S + Sync,
    {
        orbits
            .par_iter_mut()
            .map(|orbit| {
                let mut sink = make_sink(orbit);
                self.integrate_single(orbit, &mut sink)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::MemorySink;
    use approx::assert_relative_eq;

    fn quick_settings() -> Settings {
        Settings {
            mu: 1e-3,
            end_time: 2.0 * std::f64::consts::TAU,
            initial_step: 0.01,
            sample_every: 10,
            settle_time: 1e9, // never consult MEGNO in short runs
            atol: 1e-12,
            rtol: 1e-12,
            ..Settings::default()
        }
    }

    #[test]
    fn test_single_run_completes_with_small_jacobi_drift() {
        let propagator = Propagator::new(quick_settings()).unwrap();
        let mut orbit = Orbit::circular_about_secondary("a", propagator.system(), 0.01);
        let mut sink = MemorySink::default();

        let summary = propagator.integrate_single(&mut orbit, &mut sink);

        assert!(matches!(summary.outcome, Outcome::Completed));
        assert!(
            summary.jacobi_error.abs() < 1e-9,
            "Jacobi drift {} too large",
            summary.jacobi_error
        );
        assert_relative_eq!(summary.final_time_years, 2.0, epsilon = 1e-10);
        assert!(!sink.samples.is_empty(), "sampling was enabled");
        assert_eq!(summary.steps, orbit.step_count());
    }

    #[test]
    fn test_invalid_mass_ratio_rejected() {
        let settings = Settings {
            mu: 1.5,
            ..Settings::default()
        };
        assert!(Propagator::new(settings).is_err());
    }

    #[test]
    fn test_fixed_step_matches_adaptive_closely() {
        let settings = Settings {
            end_time: 0.5 * std::f64::consts::TAU,
            sample_every: 0,
            ..quick_settings()
        };
        let propagator = Propagator::new(settings).unwrap();

        let mut adaptive = Orbit::circular_about_secondary("a", propagator.system(), 0.02);
        let mut fixed = adaptive.clone();
        let mut sink = MemorySink::default();

        let s1 = propagator.integrate_single(&mut adaptive, &mut sink);
        let s2 = propagator.integrate_single_fixed(&mut fixed, &mut sink);

        assert!(matches!(s1.outcome, Outcome::Completed));
        assert!(matches!(s2.outcome, Outcome::Completed));
        for i in 0..3 {
            assert_relative_eq!(
                adaptive.position()[i],
                fixed.position()[i],
                epsilon = 1e-4
            );
        }
    }

    #[test]
    fn test_batch_survives_single_failure() {
        let settings = Settings {
            end_time: std::f64::consts::TAU,
            max_steps: 20_000, // plenty for the wide orbit, far too few for the tight one
            sample_every: 0,
            ..quick_settings()
        };
        let propagator = Propagator::new(settings).unwrap();

        let mut orbits = vec![
            // Wide orbit: few steps needed, completes
            Orbit::new("wide", [0.5, 0.0, 0.0, 0.0, 0.8, 0.0]),
            // Very tight orbit around the secondary: step cap trips
            Orbit::circular_about_secondary("tight", propagator.system(), 1e-4),
        ];

        let summaries = propagator.integrate_batch(&mut orbits, |_| MemorySink::default());

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "wide");
        assert!(
            summaries[0].is_ok(),
            "healthy orbit must survive a failing neighbour"
        );
        assert!(matches!(
            summaries[1].outcome,
            Outcome::Failed(IntegrationError::MaxStepsExceeded)
        ));
    }

    #[test]
    fn test_batch_preserves_input_order() {
        let propagator = Propagator::new(Settings {
            end_time: 0.1,
            sample_every: 0,
            ..quick_settings()
        })
        .unwrap();

        let mut orbits: Vec<Orbit> = (0..8)
            .map(|i| {
                Orbit::circular_about_secondary(
                    format!("orbit-{}", i),
                    propagator.system(),
                    0.01 + 0.001 * i as f64,
                )
            })
            .collect();

        let summaries = propagator.integrate_batch(&mut orbits, |_| MemorySink::default());
        for (i, s) in summaries.iter().enumerate() {
            assert_eq!(s.name, format!("orbit-{}", i));
        }
    }

    #[test]
    fn test_orbit_from_elements_round_trips_radius() {
        let propagator = Propagator::new(quick_settings()).unwrap();
        let elements = OrbitalElements {
            a: 0.5,
            e: 0.0,
            i: 0.0,
            raan: 0.0,
            aop: 0.0,
            anomaly: 0.0,
            kind: crate::elements::AnomalyKind::True,
        };
        let orbit = propagator.orbit_from_elements("el", &elements).unwrap();
        let r = orbit.position();
        let radius = (r[0] * r[0] + r[1] * r[1] + r[2] * r[2]).sqrt();
        assert_relative_eq!(radius, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let partial = r#"{"mu": 0.01, "end_time": 100.0}"#;
        let settings: Settings = serde_json::from_str(partial).unwrap();
        assert_eq!(settings.mu, 0.01);
        assert_eq!(settings.end_time, 100.0);
        assert_eq!(settings.megno_threshold, 8.0);
        assert_eq!(settings.sample_every, 100);
    }

    #[test]
    fn test_summary_serializes_outcome_as_string() {
        let summary = RunSummary {
            name: "x".into(),
            outcome: Outcome::Diverged,
            final_time_years: 1.0,
            jacobi_error: 0.0,
            megno: 9.0,
            megno_max: 9.5,
            lcn: 0.01,
            steps: 10,
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"outcome\":\"diverged\""));
    }
}
