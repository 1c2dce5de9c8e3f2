use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::Parser;
use flate2::read::GzDecoder;
use log::{info, warn};
use pdr_tracker_rs::geometry::degree_range;
use pdr_tracker_rs::{PdrEvent, PipelineConfig, SensorFusion, SensorReading};
use serde::Deserialize;
use serde_json::json;

#[derive(Parser, Debug)]
struct Args {
    /// Path to a recorded session (*.json or *.json.gz)
    #[arg(long)]
    log: PathBuf,

    /// Pipeline configuration as JSON; missing fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sample interval in ms (defaults to the median timestamp spacing of the log)
    #[arg(long)]
    interval_ms: Option<f64>,

    /// Print every accepted step as JSON instead of a summary
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Deserialize)]
struct LogFile {
    readings: Vec<SensorReading>,
}

fn open_json<T: for<'de> Deserialize<'de>>(path: &Path) -> anyhow::Result<T> {
    let file = File::open(path)?;
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        let gz = GzDecoder::new(file);
        let reader = BufReader::new(gz);
        Ok(serde_json::from_reader(reader)?)
    } else {
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Median spacing of sorted timestamps, ignoring duplicates.
fn median_interval(readings: &[SensorReading]) -> Option<f64> {
    let mut gaps: Vec<f64> = readings
        .windows(2)
        .map(|w| w[1].timestamp - w[0].timestamp)
        .filter(|dt| *dt > 0.0 && dt.is_finite())
        .collect();
    if gaps.is_empty() {
        return None;
    }
    gaps.sort_by(|a, b| a.total_cmp(b));
    Some(gaps[gaps.len() / 2])
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match args.config.as_ref() {
        Some(path) => open_json::<PipelineConfig>(path)?,
        None => PipelineConfig::default(),
    };

    let mut log: LogFile = open_json(&args.log)?;
    if log.readings.is_empty() {
        anyhow::bail!("{} contains no readings", args.log.display());
    }
    log.readings.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

    match args.interval_ms.or_else(|| median_interval(&log.readings)) {
        Some(interval) => config.sample_interval_ms = interval,
        None => warn!(
            "could not infer a sample interval, using {} ms",
            config.sample_interval_ms
        ),
    }
    info!(
        "replaying {} readings from {} at {} ms",
        log.readings.len(),
        args.log.display(),
        config.sample_interval_ms
    );

    let mut fusion = SensorFusion::new(config)?;
    let mut steps = Vec::new();
    let mut rejected = 0u64;
    let mut skipped = 0u64;
    let mut bias_resets = 0u64;

    for reading in &log.readings {
        let out = fusion.ingest_reading(reading);
        for event in &out.events {
            match event {
                PdrEvent::StepDetected { event, length } => steps.push(json!({
                    "timestamp": out.timestamp,
                    "index": event.index,
                    "length": length,
                    "heading_deg": degree_range(event.heading_at_step.to_degrees()),
                    "x": out.position.x,
                    "y": out.position.y,
                })),
                PdrEvent::StepRejected { .. } => rejected += 1,
                PdrEvent::SampleSkipped { .. } => skipped += 1,
                PdrEvent::GyroBiasReset { .. } => bias_resets += 1,
                _ => {}
            }
        }
    }

    let snapshot = fusion.get_snapshot();
    let heading_deg = degree_range(snapshot.heading.fused_heading.to_degrees());

    if args.json {
        let result = json!({
            "log": args.log.display().to_string(),
            "sample_interval_ms": fusion.config().sample_interval_ms,
            "snapshot": snapshot,
            "steps": steps,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Session:          {}", args.log.display());
        println!("Readings:         {}", snapshot.samples);
        println!("Steps:            {} ({} rejected)", snapshot.step_count, rejected);
        println!("Distance:         {:.2} m", snapshot.distance_travelled);
        if let Some(mean) = snapshot.mean_step_length {
            println!("Mean step:        {:.2} m", mean);
        }
        println!(
            "Final position:   ({:.2}, {:.2}) m, {:.2} m from start",
            snapshot.position.x,
            snapshot.position.y,
            snapshot.position.distance_from_origin()
        );
        println!("Final heading:    {:.1}°", heading_deg);
        println!("Skipped samples:  {}", skipped);
        println!("Gyro bias resets: {}", bias_resets);
    }
    Ok(())
}
