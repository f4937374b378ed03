//! Engine configuration.

use rand::Rng;
use std::time::Duration;
use thiserror::Error;

use crate::decisions::DEFAULT_DECISION_WINDOW;

/// Errors reading configuration from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    InvalidValue {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Bounded exponential backoff for retrying commands the oracle could not serve.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total tries, including the first.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Randomize each delay by up to half its length.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1 for the first retry).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as i32;
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());
        let delay = if self.jitter && capped > 0.0 {
            let spread = capped / 2.0;
            capped - spread + rand::thread_rng().gen_range(0.0..=spread)
        } else {
            capped
        };
        Duration::from_secs_f64(delay.max(0.0))
    }
}

/// Settings shared by every component of the command pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Upper bound on any single oracle call.
    pub oracle_timeout: Duration,

    /// Number of recent decisions passed to the oracle.
    pub decision_window: usize,

    /// Oracle confidence below which a command is not understood.
    pub min_confidence: f32,

    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            oracle_timeout: Duration::from_secs(20),
            decision_window: DEFAULT_DECISION_WINDOW,
            min_confidence: 0.5,
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `NATURE42_ORACLE_TIMEOUT_SECS`,
    /// `NATURE42_DECISION_WINDOW` and `NATURE42_RETRY_ATTEMPTS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("NATURE42_ORACLE_TIMEOUT_SECS") {
            config.oracle_timeout = value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|s| *s > 0.0)
                .and_then(|s| Duration::try_from_secs_f64(s).ok())
                .ok_or_else(|| ConfigError::InvalidValue {
                    var: "NATURE42_ORACLE_TIMEOUT_SECS",
                    value: value.clone(),
                    expected: "a positive number of seconds",
                })?;
        }

        if let Some(value) = lookup("NATURE42_DECISION_WINDOW") {
            config.decision_window =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        var: "NATURE42_DECISION_WINDOW",
                        value: value.clone(),
                        expected: "a whole number",
                    })?;
        }

        if let Some(value) = lookup("NATURE42_RETRY_ATTEMPTS") {
            config.retry.max_attempts = value
                .trim()
                .parse()
                .ok()
                .filter(|n: &u32| *n >= 1)
                .ok_or_else(|| ConfigError::InvalidValue {
                    var: "NATURE42_RETRY_ATTEMPTS",
                    value: value.clone(),
                    expected: "a whole number of at least 1",
                })?;
        }

        Ok(config)
    }

    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }

    pub fn with_decision_window(mut self, window: usize) -> Self {
        self.decision_window = window;
        self
    }

    pub fn with_min_confidence(mut self, confidence: f32) -> Self {
        self.min_confidence = confidence;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
