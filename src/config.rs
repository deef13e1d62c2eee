//! Configuration for different deployment environments.

use crate::domain::planner::SegmentationPlanner;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} env var required")]
    Missing(&'static str),
}

/// Value of `name` parsed as `T`, or `default` when unset or unparseable.
fn parse_or<T, F>(lookup: &F, name: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(var = name, value = %raw, "unparseable value, using default");
            default
        }),
        None => default,
    }
}

/// Like [`parse_or`], but only finite values accepted by `valid` are kept.
fn seconds_or<F>(lookup: &F, name: &str, default: f64, valid: fn(f64) -> bool) -> f64
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_or(lookup, name, default);
    if value.is_finite() && valid(value) {
        value
    } else {
        warn!(var = name, value, "out of range, using default");
        default
    }
}

#[cfg(feature = "local")]
fn string_or<F>(lookup: &F, name: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).unwrap_or_else(|| default.to_string())
}

fn from_process_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

/// Knobs shared by every deployment.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub segment_threshold_seconds: f64,
    pub segment_duration_seconds: f64,
    pub segment_overlap_seconds: f64,
    pub key_cooldown_seconds: u64,
    /// Parent of every per-stage scratch directory.
    pub scratch_root: PathBuf,
    pub worker_count: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            segment_threshold_seconds: 600.0,
            segment_duration_seconds: 600.0,
            segment_overlap_seconds: 15.0,
            key_cooldown_seconds: 600,
            scratch_root: env::temp_dir(),
            worker_count: 4,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(from_process_env)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            segment_threshold_seconds: seconds_or(
                &lookup,
                "SEGMENT_THRESHOLD_SECONDS",
                defaults.segment_threshold_seconds,
                |v| v > 0.0,
            ),
            segment_duration_seconds: seconds_or(
                &lookup,
                "SEGMENT_DURATION_SECONDS",
                defaults.segment_duration_seconds,
                |v| v > 0.0,
            ),
            segment_overlap_seconds: seconds_or(
                &lookup,
                "SEGMENT_OVERLAP_SECONDS",
                defaults.segment_overlap_seconds,
                |v| v >= 0.0,
            ),
            key_cooldown_seconds: parse_or(
                &lookup,
                "KEY_COOLDOWN_SECONDS",
                defaults.key_cooldown_seconds,
            ),
            scratch_root: lookup("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_root),
            worker_count: parse_or(&lookup, "WORKER_COUNT", defaults.worker_count).max(1),
        }
    }

    pub fn planner(&self) -> SegmentationPlanner {
        SegmentationPlanner::new(
            self.segment_threshold_seconds,
            self.segment_duration_seconds,
            self.segment_overlap_seconds,
        )
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.key_cooldown_seconds)
    }
}

/// Configuration for local/monolith deployment.
#[cfg(feature = "local")]
#[derive(Clone, Debug)]
pub struct LocalConfig {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Redis connection URL
    pub redis_url: String,
    /// Directory holding one subdirectory per bucket
    pub storage_root: PathBuf,
    /// Bucket used by requests that do not name one
    pub default_bucket: String,
    /// OpenAI-compatible transcription endpoint
    pub speech_url: String,
    pub speech_api_key: Option<String>,
    pub gemini_model: String,
}

#[cfg(feature = "local")]
impl LocalConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(from_process_env)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            addr: string_or(&lookup, "ADDR", "127.0.0.1"),
            port: string_or(&lookup, "PORT", "3000"),
            redis_url: string_or(&lookup, "REDIS_URL", "redis://127.0.0.1/"),
            storage_root: PathBuf::from(string_or(&lookup, "STORAGE_ROOT", "./storage")),
            default_bucket: string_or(&lookup, "DEFAULT_BUCKET", "videos"),
            speech_url: string_or(
                &lookup,
                "SPEECH_URL",
                "https://api.openai.com/v1/audio/transcriptions",
            ),
            speech_api_key: lookup("SPEECH_API_KEY").filter(|k| !k.is_empty()),
            gemini_model: string_or(
                &lookup,
                "GEMINI_MODEL",
                crate::adapters::remote::gemini::DEFAULT_MODEL,
            ),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}

/// Configuration for AWS/serverless deployment.
#[cfg(feature = "aws")]
#[derive(Clone, Debug)]
pub struct AwsConfig {
    /// S3 bucket for video storage
    pub s3_bucket: String,
    /// SQS queue URL for job messages
    pub sqs_queue_url: String,
    /// DynamoDB table name for task records
    pub dynamodb_table: String,
}

#[cfg(feature = "aws")]
impl AwsConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(from_process_env)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));
        Ok(Self {
            s3_bucket: required("S3_BUCKET")?,
            sqs_queue_url: required("SQS_QUEUE_URL")?,
            dynamodb_table: required("DYNAMODB_TABLE")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_pipeline_defaults() {
        let config = PipelineConfig::from_lookup(lookup(&[]));
        assert_eq!(config, PipelineConfig::default());
        let planner = config.planner();
        assert_eq!(planner.threshold_seconds, 600.0);
        assert_eq!(planner.overlap_seconds, 15.0);
        assert_eq!(config.cooldown(), Duration::from_secs(600));
    }

    #[test]
    fn test_pipeline_overrides_and_fallbacks() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("SEGMENT_THRESHOLD_SECONDS", "300"),
            ("SEGMENT_OVERLAP_SECONDS", "ten"),
            ("SCRATCH_DIR", "/var/tmp/chronos"),
            ("WORKER_COUNT", "0"),
        ]));
        assert_eq!(config.segment_threshold_seconds, 300.0);
        assert_eq!(config.segment_overlap_seconds, 15.0);
        assert_eq!(config.scratch_root, PathBuf::from("/var/tmp/chronos"));
        assert_eq!(config.worker_count, 1);
    }

    #[test]
    fn test_unusable_segment_values_fall_back() {
        for bad in ["-10", "0", "NaN", "inf"] {
            let config = PipelineConfig::from_lookup(lookup(&[
                ("SEGMENT_THRESHOLD_SECONDS", bad),
                ("SEGMENT_DURATION_SECONDS", bad),
            ]));
            assert_eq!(config.segment_threshold_seconds, 600.0, "{}", bad);
            assert_eq!(config.segment_duration_seconds, 600.0, "{}", bad);
            assert_eq!(config.planner().segment_seconds, 600.0);
        }

        let config = PipelineConfig::from_lookup(lookup(&[("SEGMENT_OVERLAP_SECONDS", "-1")]));
        assert_eq!(config.segment_overlap_seconds, 15.0);
        let config = PipelineConfig::from_lookup(lookup(&[("SEGMENT_OVERLAP_SECONDS", "0")]));
        assert_eq!(config.segment_overlap_seconds, 0.0);
    }

    #[cfg(feature = "local")]
    #[test]
    fn test_local_defaults() {
        let config = LocalConfig::from_lookup(lookup(&[("PORT", "8080"), ("SPEECH_API_KEY", "")]));
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.default_bucket, "videos");
        assert!(config.speech_api_key.is_none());
    }

    #[cfg(feature = "aws")]
    #[test]
    fn test_aws_requires_every_variable() {
        let err = AwsConfig::from_lookup(lookup(&[("S3_BUCKET", "videos")])).unwrap_err();
        assert_eq!(err.to_string(), "SQS_QUEUE_URL env var required");

        let config = AwsConfig::from_lookup(lookup(&[
            ("S3_BUCKET", "videos"),
            ("SQS_QUEUE_URL", "https://sqs/queue"),
            ("DYNAMODB_TABLE", "tasks"),
        ]))
        .unwrap();
        assert_eq!(config.dynamodb_table, "tasks");
    }
}
