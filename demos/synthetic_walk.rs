/// Example: Synthetic Walk
///
/// Drives the pipeline with a simulated pedestrian walking an L-shaped path:
/// straight, a 90° right turn in place, straight again. Vertical acceleration
/// is a sinusoid at step cadence, the magnetometer follows the true heading
/// and the gyroscope reports the turn rate.
///
/// Writes trajectory.csv and synthetic_session.json (replayable with the
/// `replay` binary).

use std::f64::consts::{FRAC_PI_2, TAU};
use std::fs::File;
use std::io::Write;

use pdr_tracker_rs::{PipelineConfig, SensorFusion, SensorReading, TriAxisSample};
use serde_json::json;

const DT_MS: f64 = 100.0;
const STEP_PERIOD: usize = 11; // samples per step at 100 ms
const DECLINATION_DEG: f64 = 7.5;

/// Level-device magnetometer reading for a true heading.
fn magnetometer(heading: f64) -> TriAxisSample {
    let t = heading + (90.0 + DECLINATION_DEG).to_radians();
    TriAxisSample::new(t.cos(), t.sin(), 0.0)
}

fn walking_accel(k: usize) -> TriAxisSample {
    TriAxisSample::new(0.0, 0.0, 1.0 + 0.25 * (TAU * k as f64 / STEP_PERIOD as f64).sin())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== Synthetic Walk Demo ===\n");

    let mut readings = Vec::new();
    let mut heading = 0.0_f64;
    let mut k = 0usize;

    // Leg 1: 20 steps north
    for _ in 0..20 * STEP_PERIOD {
        readings.push((walking_accel(k), magnetometer(heading), TriAxisSample::ZERO));
        k += 1;
    }

    // Turn right 90° standing still over 2 s (clockwise = negative z rate)
    let turn_samples = 20;
    let rate = FRAC_PI_2 / (turn_samples as f64 * DT_MS / 1000.0);
    for _ in 0..turn_samples {
        heading += rate * DT_MS / 1000.0;
        readings.push((
            TriAxisSample::new(0.0, 0.0, 1.0),
            magnetometer(heading),
            TriAxisSample::new(0.0, 0.0, -rate),
        ));
    }

    // Leg 2: 20 steps east
    for _ in 0..20 * STEP_PERIOD {
        readings.push((walking_accel(k), magnetometer(heading), TriAxisSample::ZERO));
        k += 1;
    }

    let config = PipelineConfig { sample_interval_ms: DT_MS, ..PipelineConfig::default() };
    let mut fusion = SensorFusion::new(config)?;

    let mut csv = File::create("trajectory.csv")?;
    writeln!(csv, "step,x,y,heading_deg,length")?;

    let mut session = Vec::with_capacity(readings.len());
    for (i, (acc, mag, gyro)) in readings.iter().enumerate() {
        let timestamp = i as f64 * DT_MS;
        let out = fusion.ingest(acc, mag, gyro, timestamp);
        for (event, length) in out.steps() {
            writeln!(
                csv,
                "{},{:.3},{:.3},{:.1},{:.3}",
                out.step_count,
                out.position.x,
                out.position.y,
                event.heading_at_step.to_degrees(),
                length
            )?;
        }
        session.push(SensorReading { timestamp, acc: *acc, mag: *mag, gyro: *gyro });
    }

    let snapshot = fusion.get_snapshot();
    println!("Samples:   {}", snapshot.samples);
    println!("Steps:     {} (40 simulated)", snapshot.step_count);
    println!("Distance:  {:.2} m", snapshot.distance_travelled);
    println!(
        "Position:  ({:.2}, {:.2}) m",
        snapshot.position.x, snapshot.position.y
    );
    println!(
        "Heading:   {:.1}° (true {:.1}°)",
        snapshot.heading.fused_heading.to_degrees(),
        heading.to_degrees()
    );

    let file = File::create("synthetic_session.json")?;
    serde_json::to_writer_pretty(file, &json!({ "readings": session }))?;
    println!("\nWrote trajectory.csv and synthetic_session.json");

    Ok(())
}
