//! Per-Step Diagnostics and Sample Emission
//!
//! [`DiagnosticObserver`] implements the solver's step hook for the
//! coupled 12-dim CRTBP system: after every accepted step it refreshes
//! the orbit record, folds the step into the MEGNO and LCN
//! accumulators, checks the chaos threshold, and periodically pushes a
//! sample into an injected [`SampleSink`]. Sink failures surface as
//! [`StepFlag::Failed`]; a tripped chaos threshold as
//! [`StepFlag::Diverged`].

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::dynamics::Crtbp;
use crate::elements::AnomalyKind;
use crate::orbit::Orbit;
use crate::solver::{StepFlag, StepObserver};

/// What the six coordinate columns of a sample hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Osculating elements (a, e, i, Ω, ω, M) from the inertial state
    #[default]
    Elements,
    /// Rotating-frame Cartesian state (x, y, z, vx, vy, vz)
    Cartesian,
}

/// One emitted sample row.
#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    /// Simulation time in synodic periods (t / 2π)
    pub time_years: f64,
    /// Six coordinates, interpretation per [`OutputKind`]
    pub coordinates: [f64; 6],
    /// Relative Jacobi drift (C - C₀)/C₀
    pub jacobi_error: f64,
    /// Time-averaged MEGNO
    pub megno: f64,
    /// Lyapunov characteristic number estimate
    pub lcn: f64,
}

/// Destination for emitted samples.
///
/// Injected by the caller so the propagation core never opens files or
/// touches stdout on its own.
pub trait SampleSink {
    /// Accept one sample for the named orbit.
    fn record(&mut self, orbit_name: &str, sample: &Sample) -> io::Result<()>;
}

/// Sink that buffers every sample in memory. Used by tests and by
/// callers that post-process trajectories.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// All samples, in emission order.
    pub samples: Vec<Sample>,
}

impl SampleSink for MemorySink {
    fn record(&mut self, _orbit_name: &str, sample: &Sample) -> io::Result<()> {
        self.samples.push(sample.clone());
        Ok(())
    }
}

/// Sink that writes tab-separated rows of fixed-width scientific
/// notation to any [`Write`] target.
///
/// Rows are written inline with the step loop, one `record` call per
/// sample. For file targets wrap the writer in a
/// [`std::io::BufWriter`] so the integrator is not stalled on
/// per-row syscalls; a sink that forwards samples over a channel to a
/// dedicated writer thread fits the same [`SampleSink`] seam.
pub struct TsvSink<W: Write> {
    writer: W,
}

impl<W: Write> TsvSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Consume the sink, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> SampleSink for TsvSink<W> {
    fn record(&mut self, _orbit_name: &str, sample: &Sample) -> io::Result<()> {
        write!(self.writer, "{:>18.10e}", sample.time_years)?;
        for c in &sample.coordinates {
            write!(self.writer, "\t{:>18.10e}", c)?;
        }
        writeln!(
            self.writer,
            "\t{:>18.10e}\t{:>18.10e}\t{:>18.10e}",
            sample.jacobi_error, sample.megno, sample.lcn
        )
    }
}

/// Sink that prints one human-readable line per sample to stdout.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl SampleSink for ConsoleSink {
    fn record(&mut self, orbit_name: &str, sample: &Sample) -> io::Result<()> {
        println!(
            "{}: t = {:.4} yr  dC/C = {:.3e}  megno = {:.4}  lcn = {:.4e}",
            orbit_name, sample.time_years, sample.jacobi_error, sample.megno, sample.lcn
        );
        Ok(())
    }
}

/// Step observer for the coupled state/variation system.
///
/// Holds mutable borrows of the orbit record and the sink for the
/// duration of one integration run.
pub struct DiagnosticObserver<'a, S: SampleSink> {
    system: &'a Crtbp,
    orbit: &'a mut Orbit,
    sink: &'a mut S,
    sample_every: u64,
    megno_threshold: f64,
    settle_time: f64,
    output: OutputKind,
}

impl<'a, S: SampleSink> DiagnosticObserver<'a, S> {
    /// Build an observer for one run.
    ///
    /// `sample_every` of 0 disables sample emission entirely.
    /// `settle_time` gates both the chaos threshold and the running
    /// maximum; before it the MEGNO mean has not stabilized.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        system: &'a Crtbp,
        orbit: &'a mut Orbit,
        sink: &'a mut S,
        sample_every: u64,
        megno_threshold: f64,
        settle_time: f64,
        output: OutputKind,
    ) -> Self {
        Self {
            system,
            orbit,
            sink,
            sample_every,
            megno_threshold,
            settle_time,
            output,
        }
    }

    fn make_sample(&self) -> Sample {
        let coordinates = match self.output {
            OutputKind::Elements => self.orbit.elements(AnomalyKind::Mean).as_array(),
            OutputKind::Cartesian => self.orbit.state(),
        };
        // The chaos indicators are not meaningful before the settle
        // time: rows keep their shape but carry zeros until then.
        let settled = self.orbit.time() >= self.settle_time;
        Sample {
            time_years: self.orbit.time() / std::f64::consts::TAU,
            coordinates,
            jacobi_error: self.orbit.jacobi_error(),
            megno: if settled { self.orbit.megno().mean() } else { 0.0 },
            lcn: if settled { self.orbit.lcn() } else { 0.0 },
        }
    }

    fn emit(&mut self) -> io::Result<()> {
        let sample = self.make_sample();
        self.sink.record(self.orbit.name(), &sample)
    }
}

impl<S: SampleSink> StepObserver<12> for DiagnosticObserver<'_, S> {
    fn observe(&mut self, nstep: u64, t: f64, y: &[f64; 12], h: f64) -> StepFlag {
        self.orbit.advance_to(t, y, h);
        self.orbit.update_jacobi(self.system);

        if t > 0.0 {
            let state = self.orbit.state();
            let delta = self.orbit.delta();

            let mut ddelta = [0.0; 6];
            self.system.variational(&state, &delta, &mut ddelta);

            let num: f64 = ddelta.iter().zip(delta.iter()).map(|(a, b)| a * b).sum();
            let den: f64 = delta.iter().map(|d| d * d).sum();
            self.orbit.megno_mut().update(t, num / den);
            self.orbit.update_lcn();

            if t >= self.settle_time {
                self.orbit.megno_mut().track_max();
                if self.orbit.megno().mean() >= self.megno_threshold {
                    // Flush a final sample so the divergence point is
                    // visible in the output, then stop this trajectory.
                    if self.sample_every > 0 && self.emit().is_err() {
                        return StepFlag::Failed;
                    }
                    return StepFlag::Diverged;
                }
            }
        }

        if self.sample_every > 0 && nstep % self.sample_every == 0 && self.emit().is_err() {
            return StepFlag::Failed;
        }

        StepFlag::Continue
    }
}
