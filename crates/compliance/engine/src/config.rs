//! Engine configuration

use crate::collaborators::Channel;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Run driver configuration
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Scheduling defaults
    #[serde(default)]
    pub scheduling: SchedulingConfig,

    /// Evidence validation rules
    #[serde(default)]
    pub evidence: EvidenceConfig,

    /// Report distribution
    #[serde(default)]
    pub reporting: ReportingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Optional JSON catalog replacing the built-in lookup data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<String>,
}

/// Run driver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Upper bound for any single collaborator call
    #[serde(default = "default_collaborator_timeout")]
    pub collaborator_timeout_ms: u64,

    /// Runs allowed to execute at the same time
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,

    /// Retry policy for retryable activity failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl RuntimeConfig {
    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborator_timeout_ms)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            collaborator_timeout_ms: default_collaborator_timeout(),
            max_concurrent_runs: default_max_concurrent_runs(),
            retry: RetryConfig::default(),
        }
    }
}

/// Bounded exponential backoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay = self.initial_backoff_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        Duration::from_millis(delay.min(self.max_backoff_ms as f64) as u64)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            multiplier: default_multiplier(),
        }
    }
}

/// Scheduling defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Forward-mode buffer as a percentage of duration
    #[serde(default = "default_buffer_pct")]
    pub buffer_pct: u32,

    /// Forward mode lets non-assessment steps overlap
    #[serde(default = "default_true")]
    pub allow_parallel: bool,

    /// Due date offset when a requirement has none
    #[serde(default = "default_due_days")]
    pub default_due_days: i64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            buffer_pct: default_buffer_pct(),
            allow_parallel: true,
            default_due_days: default_due_days(),
        }
    }
}

/// Evidence validation rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceConfig {
    /// Minimum score for evidence to be accepted
    #[serde(default = "default_min_score")]
    pub min_score: u8,

    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            allowed_extensions: default_allowed_extensions(),
            max_file_size_bytes: default_max_file_size(),
        }
    }
}

/// Report distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Channels a report is distributed to when the input names none
    #[serde(default = "default_report_channels")]
    pub channels: Vec<Channel>,

    #[serde(default = "default_recipients")]
    pub recipients: Vec<String>,

    #[serde(default = "default_generated_by")]
    pub generated_by: String,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            channels: default_report_channels(),
            recipients: default_recipients(),
            generated_by: default_generated_by(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_collaborator_timeout() -> u64 {
    5_000
}

fn default_max_concurrent_runs() -> usize {
    64
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    200
}

fn default_max_backoff() -> u64 {
    5_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_buffer_pct() -> u32 {
    20
}

fn default_due_days() -> i64 {
    90
}

fn default_min_score() -> u8 {
    70
}

fn default_allowed_extensions() -> Vec<String> {
    ["pdf", "docx", "doc", "xlsx", "xls", "csv", "txt", "md", "json", "png", "jpg", "jpeg", "zip"]
        .iter()
        .map(|e| e.to_string())
        .collect()
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_report_channels() -> Vec<Channel> {
    vec![Channel::Email, Channel::Dashboard]
}

fn default_recipients() -> Vec<String> {
    vec!["compliance-team@company.com".to_string()]
}

fn default_generated_by() -> String {
    "compliance-engine".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EngineConfig {
    /// Load configuration from defaults, an optional file and `SENTINEL_*` variables.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `SENTINEL_RUNTIME__COLLABORATOR_TIMEOUT_MS=2000`.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&EngineConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SENTINEL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Configuration suited to tests: short timeouts and fast retries
    pub fn for_tests() -> Self {
        Self {
            runtime: RuntimeConfig {
                collaborator_timeout_ms: 200,
                max_concurrent_runs: 16,
                retry: RetryConfig {
                    max_attempts: 3,
                    initial_backoff_ms: 1,
                    max_backoff_ms: 5,
                    multiplier: 2.0,
                },
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.runtime.collaborator_timeout_ms, 5_000);
        assert_eq!(config.scheduling.buffer_pct, 20);
        assert!(config.scheduling.allow_parallel);
        assert_eq!(config.evidence.max_file_size_bytes, 10 * 1024 * 1024);
        assert_eq!(config.reporting.channels, vec![Channel::Email, Channel::Dashboard]);
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn test_backoff_is_bounded() {
        let retry = RetryConfig::default();
        assert_eq!(retry.backoff_for(1), Duration::from_millis(200));
        assert_eq!(retry.backoff_for(2), Duration::from_millis(400));
        assert_eq!(retry.backoff_for(10), Duration::from_millis(5_000));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let json = r#"{"scheduling": {"buffer_pct": 30}}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.scheduling.buffer_pct, 30);
        assert_eq!(config.scheduling.default_due_days, 90);
        assert_eq!(config.runtime.retry.max_attempts, 3);
    }

    #[test]
    fn test_load_without_file() {
        let config = EngineConfig::load(None).unwrap();
        assert_eq!(config.evidence.min_score, 70);
    }
}
