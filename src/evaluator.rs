//! Threshold evaluation for metric samples.
//!
//! Every rule is checked on every sample; matches are not short-circuited.
//! The resulting labels are joined with `", "` in [`Rule::ORDER`], which makes
//! the reason string a pure function of the sample and the thresholds.

use crate::config::{Rule, ThresholdConfig};
use crate::model::MetricSample;

/// Classifies samples against a fixed threshold set.
#[derive(Debug, Clone, Default)]
pub struct ThresholdEvaluator {
    thresholds: ThresholdConfig,
}

impl ThresholdEvaluator {
    pub fn new(thresholds: ThresholdConfig) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Rules breached by `sample`, in declaration order.
    pub fn breaches(&self, sample: &MetricSample) -> Vec<Rule> {
        Rule::ORDER
            .into_iter()
            .filter(|rule| self.is_breached(*rule, sample))
            .collect()
    }

    /// The breach reason for `sample`, or `None` when every metric is within limits.
    pub fn evaluate(&self, sample: &MetricSample) -> Option<String> {
        let labels: Vec<&str> = self
            .breaches(sample)
            .into_iter()
            .map(|rule| self.thresholds.label(rule))
            .collect();

        if labels.is_empty() {
            None
        } else {
            Some(labels.join(", "))
        }
    }

    fn is_breached(&self, rule: Rule, sample: &MetricSample) -> bool {
        let t = &self.thresholds;
        match rule {
            Rule::AirQuality => sample.air_quality_index > t.air_quality_index,
            Rule::Temperature => sample.temperature > t.temperature,
            Rule::UvIndex => sample.uv_index > t.uv_index,
            Rule::NoiseLevel => sample.noise_level > t.noise_level,
            Rule::WindSpeed => sample.wind_speed > t.wind_speed,
        }
    }
}
