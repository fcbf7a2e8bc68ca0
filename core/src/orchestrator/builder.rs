//! Builder pattern for Orchestrator construction

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::BenchmarkConfig;
use crate::dataset::Dataset;
use crate::error::{BenchError, BenchResult};
use crate::evaluator::Evaluator;
use crate::scoring::{MeanAbsoluteError, ScoringStrategy};
use crate::traits::Transport;

use super::executor::Orchestrator;

/// Builder for creating an Orchestrator with proper configuration
///
/// # Example
///
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new()
///     .session_id("session-1")
///     .seed(42)
///     .dataset(Dataset::from_path(path)?)
///     .transport(broker)
///     .build()?;
///
/// let outcome = orchestrator.run_with_signal_handling().await?;
/// ```
pub struct OrchestratorBuilder {
    config: BenchmarkConfig,
    session_id: Option<String>,
    dataset: Option<Dataset>,
    transport: Option<Arc<dyn Transport>>,
    clock: Arc<dyn Clock>,
    scoring: Arc<dyn ScoringStrategy>,
}

impl OrchestratorBuilder {
    /// Create a new orchestrator builder with default configuration
    pub fn new() -> Self {
        Self {
            config: BenchmarkConfig::default(),
            session_id: None,
            dataset: None,
            transport: None,
            clock: Arc::new(SystemClock),
            scoring: Arc::new(MeanAbsoluteError),
        }
    }

    /// Set the full benchmark configuration
    pub fn config(mut self, config: BenchmarkConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the split seed
    pub fn seed(mut self, seed: i64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Set the training fraction
    pub fn train_fraction(mut self, fraction: f64) -> Self {
        self.config.train_fraction = fraction;
        self
    }

    /// Set the session id
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the dataset
    pub fn dataset(mut self, dataset: Dataset) -> Self {
        self.dataset = Some(dataset);
        self
    }

    /// Set the transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the timestamp source
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the accuracy scoring strategy
    pub fn scoring(mut self, scoring: Arc<dyn ScoringStrategy>) -> Self {
        self.scoring = scoring;
        self
    }

    /// Build the orchestrator
    ///
    /// # Errors
    ///
    /// Returns an error if the session id, dataset or transport are not set,
    /// or if configuration validation fails.
    pub fn build(self) -> BenchResult<Orchestrator> {
        let session_id = self
            .session_id
            .filter(|s| !s.is_empty())
            .ok_or_else(|| BenchError::missing_config("session_id"))?;

        let dataset = self
            .dataset
            .ok_or_else(|| BenchError::missing_config("dataset"))?;

        let transport = self
            .transport
            .ok_or_else(|| BenchError::missing_config("transport"))?;

        self.config
            .validate()
            .map_err(|e| BenchError::config(e.to_string()))?;

        let evaluator = Evaluator::new(self.scoring, self.config.file_separator);

        Ok(Orchestrator::new(
            self.config,
            session_id,
            dataset,
            transport,
            self.clock,
            evaluator,
        ))
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
