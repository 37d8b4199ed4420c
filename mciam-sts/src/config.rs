//! STS endpoint configuration.
//!
//! Endpoints, session duration, timeout and retry budget for the CSP
//! federation calls. Loaded from environment variables with the public
//! provider endpoints as defaults; tests point the endpoints at a mock
//! server instead.

use mciam_auth::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::RetryConfig;

/// Shortest session both providers accept.
pub const MIN_DURATION_SECS: u32 = 900;

/// Longest session both providers accept.
pub const MAX_DURATION_SECS: u32 = 43_200;

/// Configuration for all STS providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StsConfig {
    /// AWS STS endpoint.
    pub aws_endpoint: String,

    /// Alibaba Cloud STS endpoint.
    pub alibaba_endpoint: String,

    /// Alibaba OIDC provider ARN used when the CSP role names none.
    pub alibaba_oidc_provider_arn: Option<String>,

    /// Requested credential lifetime in seconds.
    pub duration_secs: u32,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,

    /// Maximum attempts for a call that fails in transport.
    pub max_retries: u32,
}

impl Default for StsConfig {
    fn default() -> Self {
        Self {
            aws_endpoint: "https://sts.amazonaws.com".to_string(),
            alibaba_endpoint: "https://sts.cn-beijing.aliyuncs.com".to_string(),
            alibaba_oidc_provider_arn: None,
            duration_secs: MIN_DURATION_SECS,
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl StsConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `MCIAM_AWS_STS_ENDPOINT`: AWS STS URL (default: https://sts.amazonaws.com)
    /// - `MCIAM_ALIBABA_STS_ENDPOINT`: Alibaba STS URL (default: https://sts.cn-beijing.aliyuncs.com)
    /// - `MCIAM_ALIBABA_OIDC_PROVIDER_ARN`: Fallback OIDC provider ARN
    /// - `MCIAM_STS_DURATION_SECS`: Credential lifetime (default: 900)
    /// - `MCIAM_STS_TIMEOUT_SECS`: Per-call timeout (default: 30)
    /// - `MCIAM_STS_MAX_RETRIES`: Attempts on transport failure (default: 2)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            aws_endpoint: std::env::var("MCIAM_AWS_STS_ENDPOINT").unwrap_or(default.aws_endpoint),
            alibaba_endpoint: std::env::var("MCIAM_ALIBABA_STS_ENDPOINT")
                .unwrap_or(default.alibaba_endpoint),
            alibaba_oidc_provider_arn: std::env::var("MCIAM_ALIBABA_OIDC_PROVIDER_ARN")
                .ok()
                .filter(|s| !s.is_empty()),
            duration_secs: std::env::var("MCIAM_STS_DURATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.duration_secs),
            timeout_secs: std::env::var("MCIAM_STS_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.timeout_secs),
            max_retries: std::env::var("MCIAM_STS_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max_retries),
        }
    }

    /// Per-call timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retry policy for transport failures.
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retries.max(1),
            ..RetryConfig::default()
        }
    }

    /// Check endpoint URLs and the session duration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("MCIAM_AWS_STS_ENDPOINT", &self.aws_endpoint),
            ("MCIAM_ALIBABA_STS_ENDPOINT", &self.alibaba_endpoint),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must be an http(s) URL".to_string(),
                });
            }
        }
        if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&self.duration_secs) {
            return Err(ConfigError::InvalidValue {
                key: "MCIAM_STS_DURATION_SECS".to_string(),
                message: format!("must be between {MIN_DURATION_SECS} and {MAX_DURATION_SECS}"),
            });
        }
        Ok(())
    }
}
