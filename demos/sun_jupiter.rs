//! Sun-Jupiter system demo: propagate a few heliocentric orbits and
//! print their samples and stability summaries.
//!
//! Run with `cargo run --release --example sun_jupiter`.

use std::error::Error;
use std::f64::consts::TAU;

use crtbp::{AnomalyKind, ConsoleSink, OrbitalElements, Outcome, Propagator, Settings};

fn main() -> Result<(), Box<dyn Error>> {
    let settings = Settings {
        mu: 9.537e-4, // Sun-Jupiter
        end_time: 50.0 * TAU,
        settle_time: 10.0 * TAU,
        sample_every: 2000,
        atol: 1e-12,
        rtol: 1e-12,
        ..Settings::default()
    };
    let propagator = Propagator::new(settings)?;

    // Semi-major axes in units of the Sun-Jupiter distance.
    let candidates = [
        ("main-belt", 0.52, 0.05),
        ("hilda", 0.763, 0.15),
        ("near-jupiter", 0.93, 0.02),
    ];

    let mut orbits = Vec::new();
    for (name, a, e) in candidates {
        let elements = OrbitalElements {
            a,
            e,
            i: 0.02,
            raan: 0.0,
            aop: 1.0,
            anomaly: 0.0,
            kind: AnomalyKind::True,
        };
        orbits.push(propagator.orbit_from_elements(name, &elements)?);
    }

    let summaries = propagator.integrate_batch(&mut orbits, |_| ConsoleSink);

    println!();
    for summary in &summaries {
        let verdict = match &summary.outcome {
            Outcome::Completed => "completed".to_string(),
            Outcome::Diverged => "chaotic (stopped early)".to_string(),
            Outcome::Failed(e) => format!("failed: {}", e),
        };
        println!(
            "{:>14}: {}  after {:.1} periods, {} steps, dC/C = {:.2e}, megno = {:.3}",
            summary.name,
            verdict,
            summary.final_time_years,
            summary.steps,
            summary.jacobi_error,
            summary.megno
        );
    }

    Ok(())
}
