//! Runtime configuration.
//!
//! Thresholds and alert policy are plain values handed to the evaluator and
//! dashboard at construction, so each deployment (and each test) can pick its
//! own cutoffs. [`AppConfig::from_env`] assembles everything the binary needs.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

/// Default port if not specified via environment variable.
pub const DEFAULT_PORT: u16 = 8000;

/// Default database path if not specified via environment variable.
pub const DEFAULT_DB_URL: &str = "sqlite:ecowatch.db?mode=rwc";

/// Default OpenAI-compatible endpoint for answer generation.
pub const DEFAULT_LLM_BASE_URL: &str = "https://router.huggingface.co/v1";

/// Default model identifier passed to the answer-generation backend.
pub const DEFAULT_LLM_MODEL: &str = "Qwen/Qwen3-Coder-Next:novita";

/// Default upper bound on one answer-generation call.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;

/// A breach rule, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    AirQuality,
    Temperature,
    UvIndex,
    NoiseLevel,
    WindSpeed,
}

impl Rule {
    /// All rules in declaration order. Reasons are always joined in this order.
    pub const ORDER: [Rule; 5] = [
        Rule::AirQuality,
        Rule::Temperature,
        Rule::UvIndex,
        Rule::NoiseLevel,
        Rule::WindSpeed,
    ];
}

/// Named threshold sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThresholdProfile {
    /// Tight cutoffs with the "Critical AQI" / "High UV" labels.
    #[default]
    Critical,
    /// Lower cutoffs with the "High Pollution" / "High UV Radiation" labels.
    Baseline,
}

impl FromStr for ThresholdProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "baseline" => Ok(Self::Baseline),
            other => Err(format!("unknown threshold profile '{other}'")),
        }
    }
}

/// Cutoffs and labels for the five breach rules.
///
/// A metric breaches when it is strictly greater than its cutoff.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdConfig {
    pub air_quality_index: i32,
    pub temperature: f64,
    pub uv_index: f64,
    pub noise_level: f64,
    pub wind_speed: f64,

    /// Label for the AQI rule; differs between profiles.
    pub air_quality_label: String,

    /// Label for the UV rule; differs between profiles.
    pub uv_label: String,
}

impl ThresholdConfig {
    /// Build the threshold set for a named profile.
    pub fn from_profile(profile: ThresholdProfile) -> Self {
        match profile {
            ThresholdProfile::Critical => Self {
                air_quality_index: 280,
                temperature: 42.0,
                uv_index: 9.0,
                noise_level: 85.0,
                wind_speed: 25.0,
                air_quality_label: "Critical AQI".to_string(),
                uv_label: "High UV".to_string(),
            },
            ThresholdProfile::Baseline => Self {
                air_quality_index: 150,
                temperature: 40.0,
                uv_index: 8.0,
                noise_level: 85.0,
                wind_speed: 20.0,
                air_quality_label: "High Pollution".to_string(),
                uv_label: "High UV Radiation".to_string(),
            },
        }
    }

    /// Human-readable label reported when `rule` breaches.
    pub fn label(&self, rule: Rule) -> &str {
        match rule {
            Rule::AirQuality => &self.air_quality_label,
            Rule::Temperature => "Extreme Heat",
            Rule::UvIndex => &self.uv_label,
            Rule::NoiseLevel => "Noise Violation",
            Rule::WindSpeed => "High Wind Speed",
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self::from_profile(ThresholdProfile::default())
    }
}

/// Whether repeated breaches for the same zone are all logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlertPolicy {
    /// When set, a zone whose latest alert is younger than this is not logged again.
    pub cooldown: Option<Duration>,
}

impl AlertPolicy {
    /// Log every breaching cycle.
    pub fn every_breach() -> Self {
        Self { cooldown: None }
    }

    /// Suppress repeat alerts for a zone within `cooldown`.
    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            cooldown: Some(cooldown).filter(|d| !d.is_zero()),
        }
    }
}

/// Connection settings for the answer-generation backend.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_LLM_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
        }
    }
}

/// Everything the server binary needs.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub thresholds: ThresholdConfig,
    pub alert_policy: AlertPolicy,
    pub llm: LlmConfig,
}

impl AppConfig {
    /// Load configuration from `ECOWATCH_*` environment variables.
    ///
    /// Malformed numbers fall back to their defaults; an unknown threshold
    /// profile is an error.
    pub fn from_env() -> anyhow::Result<Self> {
        let port = parsed_var("ECOWATCH_PORT").unwrap_or(DEFAULT_PORT);

        let database_url =
            env::var("ECOWATCH_DATABASE_URL").unwrap_or_else(|_| DEFAULT_DB_URL.to_string());

        let profile = match env::var("ECOWATCH_THRESHOLD_PROFILE") {
            Ok(name) => name.parse().map_err(anyhow::Error::msg)?,
            Err(_) => ThresholdProfile::default(),
        };

        let alert_policy = parsed_var::<u64>("ECOWATCH_ALERT_COOLDOWN_SECS")
            .map(|secs| AlertPolicy::with_cooldown(Duration::from_secs(secs)))
            .unwrap_or_default();

        let llm = LlmConfig {
            base_url: env::var("ECOWATCH_LLM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_LLM_BASE_URL.to_string()),
            api_key: env::var("ECOWATCH_LLM_API_KEY")
                .or_else(|_| env::var("HF_API_KEY"))
                .ok()
                .filter(|key| !key.is_empty()),
            model: env::var("ECOWATCH_LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string()),
            timeout: Duration::from_secs(
                parsed_var("ECOWATCH_LLM_TIMEOUT_SECS").unwrap_or(DEFAULT_LLM_TIMEOUT_SECS),
            ),
        };

        Ok(Self {
            port,
            database_url,
            thresholds: ThresholdConfig::from_profile(profile),
            alert_policy,
            llm,
        })
    }
}

fn parsed_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_parsing() {
        assert_eq!(
            "critical".parse::<ThresholdProfile>().unwrap(),
            ThresholdProfile::Critical
        );
        assert_eq!(
            " Baseline ".parse::<ThresholdProfile>().unwrap(),
            ThresholdProfile::Baseline
        );
        assert!("lenient".parse::<ThresholdProfile>().is_err());
    }

    #[test]
    fn test_profiles_differ_in_labels() {
        let critical = ThresholdConfig::from_profile(ThresholdProfile::Critical);
        let baseline = ThresholdConfig::from_profile(ThresholdProfile::Baseline);

        assert_eq!(critical.label(Rule::AirQuality), "Critical AQI");
        assert_eq!(baseline.label(Rule::AirQuality), "High Pollution");
        assert_eq!(critical.label(Rule::UvIndex), "High UV");
        assert_eq!(baseline.label(Rule::UvIndex), "High UV Radiation");
        assert_eq!(critical.label(Rule::WindSpeed), baseline.label(Rule::WindSpeed));
    }

    #[test]
    fn test_zero_cooldown_means_every_breach() {
        assert_eq!(
            AlertPolicy::with_cooldown(Duration::ZERO),
            AlertPolicy::every_breach()
        );
        assert_eq!(
            AlertPolicy::with_cooldown(Duration::from_secs(60)).cooldown,
            Some(Duration::from_secs(60))
        );
    }
}
