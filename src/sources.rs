//! Metric sample providers.
//!
//! The dashboard only needs "a sample arrives"; whether it comes from a
//! sensor feed or a generator is decided by the [`MetricSource`] it is built with.

use rand::Rng;

use crate::model::MetricSample;

/// A nullary provider of metric samples.
pub trait MetricSource: Send + Sync {
    fn sample(&self) -> MetricSample;
}

/// Generates plausible random readings for demos.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticSource;

impl MetricSource for SyntheticSource {
    fn sample(&self) -> MetricSample {
        let mut rng = rand::thread_rng();
        MetricSample {
            temperature: round_to(rng.gen_range(20.0..=45.0), 2),
            humidity: round_to(rng.gen_range(30.0..=90.0), 2),
            wind_speed: round_to(rng.gen_range(5.0..=30.0), 2),
            air_quality_index: rng.gen_range(50..=300),
            uv_index: round_to(rng.gen_range(0.0..=11.0), 1),
            noise_level: round_to(rng.gen_range(40.0..=100.0), 1),
        }
    }
}

/// Always returns the same sample.
#[derive(Debug, Clone, Copy)]
pub struct FixedSource(pub MetricSample);

impl MetricSource for FixedSource {
    fn sample(&self) -> MetricSample {
        self.0
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
