//! Orchestrator execution logic

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use serde::Serialize;

use crate::channel::QueueNames;
use crate::clock::Clock;
use crate::config::BenchmarkConfig;
use crate::correlator::{AnswerCorrelator, Correlation};
use crate::dataset::{Dataset, Split};
use crate::dispatcher::TaskDispatcher;
use crate::error::{BenchError, BenchResult};
use crate::evaluator::Evaluator;
use crate::gate::PhaseGate;
use crate::metrics::ResultStatistics;
use crate::protocol::{self, Command};
use crate::traits::{MessageStream, Transport};

/// Summary of a completed benchmark run
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkOutcome {
    /// Session the run belonged to
    pub session_id: String,
    /// Rows sent as training data
    pub train_size: usize,
    /// Answer messages that could not be used
    pub rejected_answers: usize,
    /// Wall time of the whole run
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    /// Final statistics
    pub statistics: ResultStatistics,
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

/// Orchestrator drives one benchmark run against the system under test
///
/// Phases, in order: split the dataset, announce readiness, send training
/// data, wait for the learning-finished signal, dispatch tasks one at a time
/// while correlating answers, wait until every task is resolved, announce
/// the end of task generation, evaluate.
pub struct Orchestrator {
    /// Benchmark configuration
    pub(crate) config: BenchmarkConfig,

    /// Session identifier scoping queues and commands
    pub(crate) session_id: String,

    /// Queue names for this session
    pub(crate) queues: QueueNames,

    /// Source data
    pub(crate) dataset: Dataset,

    /// Message transport (shared with the correlation task)
    pub(crate) transport: Arc<dyn Transport>,

    /// Timestamp source
    pub(crate) clock: Arc<dyn Clock>,

    /// Statistics builder
    pub(crate) evaluator: Evaluator,

    /// Phase barriers
    pub(crate) gates: PhaseGate,

    /// Set once `run` has been called
    pub(crate) started: AtomicBool,
}

impl Orchestrator {
    /// Create a new orchestrator
    ///
    /// Use `OrchestratorBuilder` for a more ergonomic construction.
    pub fn new(
        config: BenchmarkConfig,
        session_id: String,
        dataset: Dataset,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        evaluator: Evaluator,
    ) -> Self {
        let queues = QueueNames::for_session(&session_id);
        Self {
            config,
            session_id,
            queues,
            dataset,
            transport,
            clock,
            evaluator,
            gates: PhaseGate::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Get the benchmark configuration
    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Get the session id
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Get the session queue names
    pub fn queues(&self) -> &QueueNames {
        &self.queues
    }

    /// Get the phase gates
    pub fn gates(&self) -> &PhaseGate {
        &self.gates
    }

    /// Abort the run: any pending phase wait fails with an interrupted error
    pub fn interrupt(&self) {
        self.gates.interrupt_all();
    }

    /// Run the benchmark
    ///
    /// # Errors
    ///
    /// Every error is fatal for the run: transport failures, interrupted or
    /// timed out phase waits, clock skew, or calling `run` twice.
    pub async fn run(&self) -> BenchResult<BenchmarkOutcome> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(BenchError::orchestration(
                "orchestrator has already been run; phase gates cannot be reset",
            ));
        }

        let start = Instant::now();
        let split = self
            .dataset
            .split(self.config.seed, self.config.train_fraction);

        tracing::info!(
            session_id = %self.session_id,
            seed = self.config.seed,
            train_fraction = self.config.train_fraction,
            train_rows = split.train_rows.len(),
            test_rows = split.test_rows.len(),
            transport = self.transport.name(),
            "Starting benchmark"
        );

        // Subscribe before anything is sent so no reply can be missed
        let commands = self.transport.subscribe_broadcast().await?;
        let answers = self.transport.subscribe(&self.queues.answers).await?;

        let listener = tokio::spawn(listen_for_commands(
            commands,
            self.session_id.clone(),
            self.gates.clone(),
        ));

        let result = self.execute(&split, answers).await;
        listener.abort();

        let (statistics, rejected_answers) = result?;
        let elapsed = start.elapsed();

        tracing::info!(
            elapsed_secs = elapsed.as_secs_f64(),
            answered = statistics.answered_count,
            faulty_or_missing = statistics.faulty_or_missing_count,
            "Benchmark completed"
        );

        Ok(BenchmarkOutcome {
            session_id: self.session_id.clone(),
            train_size: split.train_rows.len(),
            rejected_answers,
            elapsed,
            statistics,
        })
    }

    async fn execute(
        &self,
        split: &Split,
        answers: MessageStream,
    ) -> BenchResult<(ResultStatistics, usize)> {
        self.send_command(Command::BenchmarkReady, &[]).await?;
        self.send_training_data(split).await?;

        tracing::info!("Waiting for the system to finish its learning phase");
        self.gates
            .learning_done
            .wait_timeout(self.config.learning_timeout())
            .await?;
        tracing::info!("System finished learning, starting task dispatch");

        let correlation = self.correlate(split, answers).await?;

        self.send_command(Command::TaskGenerationFinished, &[]).await?;

        let statistics = self.evaluator.evaluate(
            &split.test_rows,
            &correlation.dispatches,
            &correlation.answers,
            correlation.skipped.len(),
        )?;

        Ok((statistics, correlation.rejected_answers))
    }

    /// Run the correlator as the single owner of dispatch and answer state
    async fn correlate(&self, split: &Split, answers: MessageStream) -> BenchResult<Correlation> {
        let dispatcher = TaskDispatcher::new(
            Arc::clone(&self.transport),
            self.queues.tasks.clone(),
            split.header.clone(),
            split.test_rows.clone().into(),
            self.config.file_separator,
            self.config.message_separator,
            Arc::clone(&self.clock),
            self.gates.all_answers_resolved.clone(),
        );
        let correlator = AnswerCorrelator::new(
            dispatcher,
            self.config.message_separator,
            Arc::clone(&self.clock),
        );

        let gate = self.gates.all_answers_resolved.clone();
        let handle = tokio::spawn(async move {
            let result = correlator.run(answers).await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "Answer correlation failed");
                gate.interrupt();
            }
            result
        });

        tracing::info!("Waiting for the system to answer all tasks");
        let waited = self
            .gates
            .all_answers_resolved
            .wait_timeout(self.config.answers_timeout())
            .await;

        if let Err(wait_err) = waited {
            // Prefer the correlator's own failure over the interruption it caused
            handle.abort();
            return match handle.await {
                Ok(Err(correlation_err)) => Err(correlation_err),
                _ => Err(wait_err),
            };
        }

        match handle.await {
            Ok(result) => result,
            Err(e) => Err(BenchError::orchestration(format!(
                "answer correlation task failed: {}",
                e
            ))),
        }
    }

    async fn send_training_data(&self, split: &Split) -> BenchResult<()> {
        let payload = protocol::encode_training(
            &split.header,
            &split.train_rows,
            self.config.message_separator,
        );
        tracing::info!(
            rows = split.train_rows.len(),
            bytes = payload.len(),
            queue = %self.queues.training,
            "Sending training data"
        );
        self.transport
            .publish(&self.queues.training, payload.into_bytes())
            .await?;
        Ok(())
    }

    async fn send_command(&self, command: Command, data: &[u8]) -> BenchResult<()> {
        let frame = protocol::encode_command(&self.session_id, command, data);
        self.transport.broadcast(frame).await?;
        tracing::debug!(command = ?command, "Command sent");
        Ok(())
    }

    /// Publish the final result model to the platform
    ///
    /// Sends a benchmark-finished command carrying `result_model`.
    pub async fn publish_results(&self, result_model: &[u8]) -> BenchResult<()> {
        tracing::info!(bytes = result_model.len(), "Sending result model");
        self.send_command(Command::BenchmarkFinished, result_model).await
    }

    /// Run with Ctrl+C signal handling
    ///
    /// Ctrl+C interrupts the pending phase wait, which aborts the run.
    pub async fn run_with_signal_handling(&self) -> BenchResult<BenchmarkOutcome> {
        let gates = self.gates.clone();

        let signal_handle = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::warn!("Received Ctrl+C, aborting benchmark...");
                    gates.interrupt_all();
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                }
            }
        });

        let result = self.run().await;
        signal_handle.abort();

        result
    }
}

/// Consume the command exchange for the lifetime of a run
async fn listen_for_commands(mut commands: MessageStream, session_id: String, gates: PhaseGate) {
    while let Some(frame) = commands.next().await {
        let message = match protocol::decode_command(&frame) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed command frame");
                continue;
            }
        };

        if message.session_id != session_id {
            tracing::trace!(
                session_id = %message.session_id,
                "Ignoring command for another session"
            );
            continue;
        }

        match message.command {
            Command::LearningFinished => {
                tracing::info!("Received learning finished signal");
                gates.learning_done.open();
            }
            Command::ReportError => {
                tracing::error!(
                    details = %String::from_utf8_lossy(&message.data),
                    "System reported an error"
                );
                gates.interrupt_all();
            }
            other => tracing::trace!(command = ?other, "Ignoring command"),
        }
    }

    tracing::warn!("Command stream closed");
    gates.learning_done.interrupt();
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("session_id", &self.session_id)
            .field("transport", &self.transport.name())
            .field("evaluator", &self.evaluator)
            .finish()
    }
}
