// Detect pushes on a synthetic pushrim force, normalize and rank the cycles

use ktk_core::{
    detect_cycles, most_repeatable_cycles, read_series, stack, time_normalize, write_series,
    CompressionType, CycleDetection, Result, TimeSeries,
};
use ndarray::Array1;
use std::f64::consts::PI;
use tracing::{info, warn, Level};

fn synthetic_force() -> Result<TimeSeries> {
    let sample_rate = 100.0;
    let time = Array1::from_iter((0..1000).map(|i| i as f64 / sample_rate));

    // One push per second: a half sine during the first 0.4 s, slightly
    // stronger every cycle.
    let force = time.mapv(|t: f64| {
        let phase = t.fract();
        let cycle = t.floor();
        if phase < 0.4 {
            (40.0 + 2.0 * cycle) * (PI * phase / 0.4).sin()
        } else {
            0.0
        }
    });

    let mut ts = TimeSeries::with_time(time);
    ts.add_data("Forces", force)?;
    ts.add_data_info("Forces", "Unit", "N");
    Ok(ts)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let ts = synthetic_force()?;
    info!("Generated {} samples at {:?} Hz", ts.len(), ts.sample_rate());

    let detected = detect_cycles(&ts, "Forces", &CycleDetection::default())?;
    info!(
        "Detected {} pushes and {} recoveries",
        detected.count_events("push"),
        detected.count_events("recovery")
    );

    let (normalized, warnings) = time_normalize(&detected, "push", "push", 100)?;
    for warning in &warnings {
        warn!("{}", warning);
    }
    info!("Normalized to {} samples", normalized.len());

    let stacked = stack(&normalized, 100)?;
    if let Some(forces) = stacked.get("Forces") {
        let order = most_repeatable_cycles(forces);
        info!("Cycles from most to least repeatable: {:?}", order);
    }

    let path = std::env::temp_dir().join("normalize_pushes.ktks");
    write_series(&path, &normalized, CompressionType::Zlib)?;
    let back = read_series(&path)?;
    info!("Round trip through {}: {}", path.display(), back == normalized);

    Ok(())
}
