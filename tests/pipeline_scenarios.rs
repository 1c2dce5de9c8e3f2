use std::f64::consts::TAU;

use approx::assert_abs_diff_eq;
use pdr_tracker_rs::geometry::{angle_diff, degree_range};
use pdr_tracker_rs::{
    GravityUnit, PdrEvent, PipelineConfig, PipelineOutput, SensorFusion, SensorReading, TriAxisSample,
};

const LEVEL: TriAxisSample = TriAxisSample { x: 0.0, y: 0.0, z: 1.0 };
const NO_ROTATION: TriAxisSample = TriAxisSample { x: 0.0, y: 0.0, z: 0.0 };

/// Level-device magnetometer reading whose heading (after 7.5° declination) is `deg`.
fn mag_for_heading(deg: f64) -> TriAxisSample {
    let t = (deg + 97.5).to_radians();
    TriAxisSample::new(t.cos(), t.sin(), 0.0)
}

fn walking(k: usize) -> TriAxisSample {
    TriAxisSample::new(0.0, 0.0, 1.0 + 0.25 * (TAU * k as f64 / 11.0).sin())
}

fn pipeline() -> SensorFusion {
    SensorFusion::new(PipelineConfig::default()).unwrap()
}

fn assert_finite(out: &PipelineOutput) {
    let values = [
        out.attitude.pitch,
        out.attitude.roll,
        out.attitude.yaw,
        out.heading.mag_heading,
        out.heading.gyro_heading,
        out.heading.fused_heading,
        out.position.x,
        out.position.y,
        out.gyro_bias.x,
        out.gyro_bias.y,
        out.gyro_bias.z,
    ];
    assert!(values.iter().all(|v| v.is_finite()), "non-finite output {:?}", out);
}

#[test]
fn stationary_device_stays_put() {
    let mut fusion = pipeline();
    let mag = TriAxisSample::new(1.0, 0.0, 0.0);
    let mut headings = Vec::new();
    for k in 0..100 {
        let out = fusion.ingest(&LEVEL, &mag, &NO_ROTATION, k as f64 * 100.0);
        assert_eq!(out.step_count, 0);
        assert_eq!(out.position.x, 0.0);
        assert_eq!(out.position.y, 0.0);
        assert_abs_diff_eq!(out.attitude.pitch, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.attitude.roll, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.attitude.yaw, 0.0, epsilon = 1e-12);
        headings.push(out.heading.fused_heading);
    }

    let tail = &headings[50..];
    let mean = tail.iter().sum::<f64>() / tail.len() as f64;
    let variance = tail.iter().map(|h| (h - mean).powi(2)).sum::<f64>() / tail.len() as f64;
    assert!(variance < 1e-20);

    let snapshot = fusion.get_snapshot();
    assert_eq!(snapshot.bias_queue_len, 100);
    assert_eq!(snapshot.detections, 0);
}

#[test]
fn straight_walk_moves_along_heading() {
    let mut fusion = pipeline();
    let heading_deg = 120.0;
    for k in 0..220 {
        fusion.ingest(&walking(k), &mag_for_heading(heading_deg), &NO_ROTATION, k as f64 * 100.0);
    }

    let snapshot = fusion.get_snapshot();
    assert_eq!(snapshot.step_count, 19);
    assert!(snapshot.distance_travelled > 30.0 && snapshot.distance_travelled < 37.0);

    let bearing = degree_range(snapshot.position.x.atan2(snapshot.position.y).to_degrees());
    assert_abs_diff_eq!(bearing, heading_deg, epsilon = 1e-6);
    assert_abs_diff_eq!(
        snapshot.position.distance_from_origin(),
        snapshot.distance_travelled,
        epsilon = 1e-6
    );
}

#[test]
fn brisk_cadence_counts_each_stride_once() {
    // Two steps per second at 100 ms sampling
    let strides = 40;
    let period = 5.0;
    let mut fusion = pipeline();
    let mag = mag_for_heading(300.0);
    for k in 0..strides * 5 {
        let acc = TriAxisSample::new(0.0, 0.0, 1.0 + 0.3 * (TAU * k as f64 / period).sin());
        fusion.ingest(&acc, &mag, &NO_ROTATION, k as f64 * 100.0);
    }

    // The first stride is spent filling the detection buffer
    let snapshot = fusion.get_snapshot();
    assert_eq!(snapshot.detections, strides as u64 - 1);
    assert_eq!(snapshot.step_count, snapshot.detections);
}

#[test]
fn walking_north_is_plus_y() {
    let mut fusion = pipeline();
    for k in 0..120 {
        fusion.ingest(&walking(k), &mag_for_heading(0.0), &NO_ROTATION, 0.0);
    }
    let pos = fusion.position();
    assert!(fusion.step_count() > 0);
    assert!(pos.y > 0.0);
    assert_abs_diff_eq!(pos.x, 0.0, epsilon = 1e-6);
}

#[test]
fn fused_heading_tracks_a_turn() {
    let mut fusion = pipeline();
    let mut truth = 30.0_f64;
    for _ in 0..50 {
        fusion.ingest(&LEVEL, &mag_for_heading(truth), &NO_ROTATION, 0.0);
    }
    // Counter-clockwise at 0.5 rad/s for 2 s
    let turning = TriAxisSample::new(0.0, 0.0, 0.5);
    for _ in 0..20 {
        truth -= 0.05_f64.to_degrees();
        fusion.ingest(&LEVEL, &mag_for_heading(truth), &turning, 0.0);
    }
    let mut last = None;
    for _ in 0..50 {
        last = Some(fusion.ingest(&LEVEL, &mag_for_heading(truth), &NO_ROTATION, 0.0));
    }
    let out = last.unwrap();
    let error = angle_diff(out.heading.fused_heading, truth.to_radians()).to_degrees();
    assert!(error < 5.0, "fused heading {:.2}° vs {:.2}°", out.heading_deg(), truth);
}

#[test]
fn heading_near_north_does_not_flip() {
    let mut fusion = pipeline();
    let mut resets = 0;
    for k in 0..60 {
        let deg = if k % 2 == 0 { 0.2 } else { 359.9 };
        let out = fusion.ingest(&LEVEL, &mag_for_heading(deg), &NO_ROTATION, 0.0);
        resets += out
            .events
            .iter()
            .filter(|e| matches!(e, PdrEvent::GyroBiasReset { .. }))
            .count();
        assert!(angle_diff(out.heading.fused_heading, 0.0) < 0.5_f64.to_radians());
    }
    assert_eq!(resets, 0);
}

#[test]
fn degenerate_input_never_produces_nan() {
    let mut fusion = pipeline();
    let mag = mag_for_heading(45.0);
    for k in 0..200 {
        let acc = if k % 7 == 0 { TriAxisSample::ZERO } else { walking(k) };
        let m = if k % 5 == 0 { TriAxisSample::ZERO } else { mag };
        let out = fusion.ingest(&acc, &m, &NO_ROTATION, k as f64 * 100.0);
        assert_finite(&out);
    }
}

#[test]
fn degenerate_gravity_is_survivable() {
    // Free fall: accelerometer reads almost nothing along every axis
    let mut fusion = pipeline();
    let mag = mag_for_heading(10.0);
    fusion.ingest(&LEVEL, &mag, &NO_ROTATION, 0.0);
    for _ in 0..400 {
        let out = fusion.ingest(&TriAxisSample::new(0.0, 0.0, 1e-12), &mag, &TriAxisSample::new(0.0, 0.0, 0.3), 0.0);
        assert_finite(&out);
    }
}

#[test]
fn inverted_accelerometer_convention() {
    let mut plain = pipeline();
    let mut inverted = SensorFusion::new(PipelineConfig { invert_accel: true, ..Default::default() }).unwrap();
    let mag = mag_for_heading(200.0);
    for k in 0..120 {
        let acc = walking(k);
        let flipped = TriAxisSample::new(-acc.x, -acc.y, -acc.z);
        let a = plain.ingest(&acc, &mag, &NO_ROTATION, 0.0);
        let b = inverted.ingest(&flipped, &mag, &NO_ROTATION, 0.0);
        assert_eq!(a.step_count, b.step_count);
        assert_abs_diff_eq!(a.heading.fused_heading, b.heading.fused_heading, epsilon = 1e-12);
    }
    assert!(plain.step_count() > 0);
}

#[test]
fn si_gravity_unit_counts_the_same_steps() {
    let mut g = pipeline();
    let mut si = SensorFusion::new(PipelineConfig {
        gravity_unit: GravityUnit::MetersPerSecondSquared,
        ..Default::default()
    })
    .unwrap();
    let mag = mag_for_heading(80.0);
    for k in 0..220 {
        g.ingest(&walking(k), &mag, &NO_ROTATION, 0.0);
        si.ingest(&walking(k), &mag, &NO_ROTATION, 0.0);
    }
    assert_eq!(g.step_count(), si.step_count());
    assert_abs_diff_eq!(g.position().x, si.position().x, epsilon = 1e-6);
}

#[test]
fn recorded_readings_replay() {
    let json = r#"[
        {"timestamp": 0.0,   "acc": {"x": 0.0, "y": 0.0, "z": 1.0}, "mag": {"x": 1.0, "y": 0.0, "z": 0.0}, "gyro": {"x": 0.0, "y": 0.0, "z": 0.0}},
        {"timestamp": 100.0, "acc": {"x": 0.0, "y": 0.0, "z": 1.0}, "mag": {"x": 1.0, "y": 0.0, "z": 0.0}, "gyro": {"x": 0.0, "y": 0.0, "z": 0.0}}
    ]"#;
    let readings: Vec<SensorReading> = serde_json::from_str(json).unwrap();
    let mut fusion = pipeline();
    let outputs: Vec<_> = readings.iter().map(|r| fusion.ingest_reading(r)).collect();
    assert_eq!(outputs[1].timestamp, 100.0);
    assert_abs_diff_eq!(outputs[1].heading_deg(), 262.5, epsilon = 1e-9);

    let encoded = serde_json::to_string(&outputs[1]).unwrap();
    assert!(encoded.contains("fused_heading"));
}
