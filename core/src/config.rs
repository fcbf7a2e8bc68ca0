//! Benchmark configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default share of rows routed to the training partition
pub const DEFAULT_TRAIN_FRACTION: f64 = 0.9;

/// Default field separator for both dataset files and messages
pub const DEFAULT_SEPARATOR: char = ';';

/// Default IRI prefix for result KPIs
pub const DEFAULT_BENCHMARK_NAMESPACE: &str =
    "http://example.org/ai-winter-school-2024/benchmark/";

/// Benchmark configuration
///
/// Controls how the dataset is split, which separators are used on disk and
/// on the wire, and how long the controller waits for each phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Seed for the train/test split
    pub seed: i64,

    /// Probability that a data row lands in the training partition
    pub train_fraction: f64,

    /// Field separator used by the dataset file
    pub file_separator: char,

    /// Field separator used in messages exchanged with the system
    pub message_separator: char,

    /// Deadline for the system to report that learning finished (`null` waits indefinitely)
    pub learning_timeout_secs: Option<u64>,

    /// Deadline for all test answers to be resolved (`null` waits indefinitely)
    pub answers_timeout_secs: Option<u64>,

    /// IRI prefix for KPIs in the result model
    pub benchmark_namespace: String,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            train_fraction: DEFAULT_TRAIN_FRACTION,
            file_separator: DEFAULT_SEPARATOR,
            message_separator: DEFAULT_SEPARATOR,
            learning_timeout_secs: Some(600),
            answers_timeout_secs: Some(3600),
            benchmark_namespace: DEFAULT_BENCHMARK_NAMESPACE.to_string(),
        }
    }
}

impl BenchmarkConfig {
    /// Create a new config with the given seed
    pub fn new(seed: i64) -> Self {
        Self {
            seed,
            ..Default::default()
        }
    }

    /// Set the training fraction
    pub fn with_train_fraction(mut self, fraction: f64) -> Self {
        self.train_fraction = fraction;
        self
    }

    /// Set both separators
    pub fn with_separators(mut self, file: char, message: char) -> Self {
        self.file_separator = file;
        self.message_separator = message;
        self
    }

    /// Set the learning phase deadline (`None` waits indefinitely)
    ///
    /// Deadlines have whole-second granularity; a fractional second rounds up.
    pub fn with_learning_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.learning_timeout_secs = timeout.map(whole_seconds);
        self
    }

    /// Set the answer phase deadline (`None` waits indefinitely)
    ///
    /// Rounded up to whole seconds like the learning deadline.
    pub fn with_answers_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.answers_timeout_secs = timeout.map(whole_seconds);
        self
    }

    /// Learning phase deadline
    pub fn learning_timeout(&self) -> Option<Duration> {
        self.learning_timeout_secs.map(Duration::from_secs)
    }

    /// Answer phase deadline
    pub fn answers_timeout(&self) -> Option<Duration> {
        self.answers_timeout_secs.map(Duration::from_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.train_fraction) {
            return Err(ConfigError::InvalidTrainFraction(format!(
                "train fraction must be within [0, 1], got {}",
                self.train_fraction
            )));
        }

        for (name, sep) in [
            ("file", self.file_separator),
            ("message", self.message_separator),
        ] {
            if sep == '\n' || sep == '\r' {
                return Err(ConfigError::InvalidSeparator(format!(
                    "{} separator must not be a line break",
                    name
                )));
            }
        }

        if self.learning_timeout_secs == Some(0) || self.answers_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidTimeout(
                "timeouts must be at least one second; omit them to wait indefinitely".into(),
            ));
        }

        if self.benchmark_namespace.is_empty() {
            return Err(ConfigError::InvalidNamespace(
                "benchmark namespace must not be empty".into(),
            ));
        }

        Ok(())
    }
}

fn whole_seconds(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Train fraction outside `[0, 1]`
    #[error("Invalid train fraction: {0}")]
    InvalidTrainFraction(String),

    /// Separator cannot be used in line-oriented payloads
    #[error("Invalid separator: {0}")]
    InvalidSeparator(String),

    /// Zero-length deadline
    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    /// Empty KPI namespace
    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),
}
