//! hobbit-bench-system: Baseline system under test
//!
//! [`BaselineSystem`] speaks the system side of the benchmark protocol. It
//! learns the mean of the target column from the training data and answers
//! every task with that mean. It is useful as a reference point for scores
//! and for running the controller end to end without an external system.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use hobbit_bench_core::protocol::{self, Command};
use hobbit_bench_core::{BenchError, BenchResult, MessageStream, QueueNames, Transport};

/// What the baseline system did during a session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemReport {
    /// The value every task was answered with
    pub prediction: f64,
    /// Number of training rows with a numeric target
    pub learned_rows: usize,
    /// Number of answers sent
    pub answered: usize,
}

struct Streams {
    training: MessageStream,
    tasks: MessageStream,
    commands: MessageStream,
}

struct Responder {
    transport: Arc<dyn Transport>,
    session_id: String,
    queues: QueueNames,
    separator: char,
    report: SystemReport,
}

impl Responder {
    async fn learn(&mut self, payload: &[u8]) -> BenchResult<()> {
        let text = std::str::from_utf8(payload)
            .map_err(|_| BenchError::protocol("training data is not valid UTF-8"))?;

        let targets: Vec<f64> = text
            .lines()
            .skip(1)
            .filter_map(|line| protocol::expected_value(line, self.separator))
            .collect();

        if targets.is_empty() {
            tracing::warn!("Training data has no numeric targets, predicting 0");
        } else {
            self.report.prediction = targets.iter().sum::<f64>() / targets.len() as f64;
        }
        self.report.learned_rows = targets.len();

        tracing::info!(
            rows = targets.len(),
            prediction = self.report.prediction,
            "Learning finished"
        );
        self.send_command(Command::LearningFinished, &[]).await
    }

    async fn answer(&mut self, payload: &[u8]) -> BenchResult<()> {
        let Some(task_id) = task_id(payload, self.separator) else {
            tracing::warn!(
                payload = %String::from_utf8_lossy(payload),
                "Could not read task id, task ignored"
            );
            return Ok(());
        };

        let answer = protocol::encode_answer(task_id, self.report.prediction, self.separator);
        self.transport
            .publish(&self.queues.answers, answer.into_bytes())
            .await?;
        self.report.answered += 1;
        tracing::debug!(task_id, "Answer sent");
        Ok(())
    }

    async fn send_command(&self, command: Command, data: &[u8]) -> BenchResult<()> {
        let frame = protocol::encode_command(&self.session_id, command, data);
        self.transport.broadcast(frame).await?;
        Ok(())
    }
}

/// First field of the second line of a task payload
fn task_id(payload: &[u8], separator: char) -> Option<usize> {
    let text = std::str::from_utf8(payload).ok()?;
    text.lines()
        .nth(1)?
        .split(separator)
        .next()?
        .trim()
        .parse()
        .ok()
}

/// Mean-predicting system under test
pub struct BaselineSystem {
    responder: Responder,
    streams: Streams,
    response_delay: Option<Duration>,
}

impl BaselineSystem {
    /// Subscribe to the session queues and the command exchange
    ///
    /// Subscriptions are made here rather than in [`run`](Self::run) so that
    /// nothing the controller sends after this call returns is missed.
    ///
    /// # Errors
    ///
    /// Returns a transport error if any subscription fails.
    pub async fn connect(
        transport: Arc<dyn Transport>,
        session_id: impl Into<String>,
        separator: char,
    ) -> BenchResult<Self> {
        let session_id = session_id.into();
        let queues = QueueNames::for_session(&session_id);

        let streams = Streams {
            training: transport.subscribe(&queues.training).await?,
            tasks: transport.subscribe(&queues.tasks).await?,
            commands: transport.subscribe_broadcast().await?,
        };

        Ok(Self {
            responder: Responder {
                transport,
                session_id,
                queues,
                separator,
                report: SystemReport {
                    prediction: 0.0,
                    learned_rows: 0,
                    answered: 0,
                },
            },
            streams,
            response_delay: None,
        })
    }

    /// Wait this long before answering each task
    pub fn with_response_delay(mut self, delay: Option<Duration>) -> Self {
        self.response_delay = delay;
        self
    }

    /// Serve the session until task generation is finished
    ///
    /// Announces readiness, learns from the training message, answers tasks
    /// and stops when the controller signals that no more tasks follow.
    ///
    /// # Errors
    ///
    /// Returns an error if training data cannot be decoded (after reporting
    /// it to the controller) or if sending fails.
    pub async fn run(self) -> BenchResult<SystemReport> {
        let Self {
            mut responder,
            streams,
            response_delay,
        } = self;
        let mut training = streams.training.fuse();
        let mut tasks = streams.tasks.fuse();
        let mut commands = streams.commands.fuse();

        responder.send_command(Command::SystemReady, &[]).await?;
        tracing::info!(session_id = %responder.session_id, "Baseline system ready");

        loop {
            tokio::select! {
                Some(frame) = commands.next() => {
                    let Ok(message) = protocol::decode_command(&frame) else {
                        continue;
                    };
                    if message.session_id == responder.session_id
                        && message.command == Command::TaskGenerationFinished
                    {
                        tracing::info!("Task generation finished, stopping");
                        break;
                    }
                }
                Some(data) = training.next() => {
                    if let Err(e) = responder.learn(&data).await {
                        responder
                            .send_command(Command::ReportError, e.to_string().as_bytes())
                            .await?;
                        return Err(e);
                    }
                }
                Some(task) = tasks.next() => {
                    if let Some(delay) = response_delay {
                        tokio::time::sleep(delay).await;
                    }
                    responder.answer(&task).await?;
                }
                else => {
                    tracing::warn!("All inbound streams closed");
                    break;
                }
            }
        }

        Ok(responder.report)
    }
}

impl std::fmt::Debug for BaselineSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaselineSystem")
            .field("session_id", &self.responder.session_id)
            .field("transport", &self.responder.transport.name())
            .field("response_delay", &self.response_delay)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hobbit_bench_transport::InMemoryBroker;

    const SESSION: &str = "s1";

    async fn next_command(commands: &mut MessageStream) -> protocol::CommandMessage {
        let frame = commands.next().await.expect("command stream ended");
        protocol::decode_command(&frame).unwrap()
    }

    #[test]
    fn test_task_id_parsing() {
        assert_eq!(task_id(b";a;b\n7;1;2", ';'), Some(7));
        assert_eq!(task_id(b";a;b\n x ;1;2", ';'), None);
        assert_eq!(task_id(b"only header", ';'), None);
    }

    #[tokio::test]
    async fn test_learns_mean_and_answers_tasks() {
        let broker = Arc::new(InMemoryBroker::default());
        let queues = QueueNames::for_session(SESSION);
        let mut commands = broker.subscribe_broadcast().await.unwrap();
        let mut answers = broker.subscribe(&queues.answers).await.unwrap();

        let system = BaselineSystem::connect(broker.clone(), SESSION, ';').await.unwrap();
        let handle = tokio::spawn(system.run());

        assert_eq!(next_command(&mut commands).await.command, Command::SystemReady);

        let training = protocol::encode_training(
            "a;q",
            &["1;2".to_string(), "2;4".to_string(), "3;x".to_string()],
            ';',
        );
        broker
            .publish(&queues.training, training.into_bytes())
            .await
            .unwrap();
        assert_eq!(
            next_command(&mut commands).await.command,
            Command::LearningFinished
        );

        broker
            .publish(&queues.tasks, b";a;q\n0;9".to_vec())
            .await
            .unwrap();
        assert_eq!(answers.next().await.unwrap(), b"0;3");

        let finished = protocol::encode_command(SESSION, Command::TaskGenerationFinished, &[]);
        broker.broadcast(finished).await.unwrap();

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.prediction, 3.0);
        assert_eq!(report.learned_rows, 2);
        assert_eq!(report.answered, 1);
    }

    #[tokio::test]
    async fn test_ignores_other_sessions_and_bad_tasks() {
        let broker = Arc::new(InMemoryBroker::default());
        let queues = QueueNames::for_session(SESSION);
        let mut answers = broker.subscribe(&queues.answers).await.unwrap();

        let system = BaselineSystem::connect(broker.clone(), SESSION, ';').await.unwrap();
        let handle = tokio::spawn(system.run());

        let other = protocol::encode_command("other", Command::TaskGenerationFinished, &[]);
        broker.broadcast(other).await.unwrap();

        broker.publish(&queues.tasks, b"garbage".to_vec()).await.unwrap();
        broker
            .publish(&queues.tasks, b";a;q\n4;1".to_vec())
            .await
            .unwrap();
        assert_eq!(answers.next().await.unwrap(), b"4;0");
        assert!(!handle.is_finished());

        let finished = protocol::encode_command(SESSION, Command::TaskGenerationFinished, &[]);
        broker.broadcast(finished).await.unwrap();
        assert_eq!(handle.await.unwrap().unwrap().answered, 1);
    }

    #[tokio::test]
    async fn test_reports_undecodable_training_data() {
        let broker = Arc::new(InMemoryBroker::default());
        let queues = QueueNames::for_session(SESSION);
        let mut commands = broker.subscribe_broadcast().await.unwrap();

        let system = BaselineSystem::connect(broker.clone(), SESSION, ';').await.unwrap();
        let handle = tokio::spawn(system.run());

        broker
            .publish(&queues.training, vec![0xff, 0xfe])
            .await
            .unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(err.is(hobbit_bench_core::ErrorKind::Protocol));

        assert_eq!(next_command(&mut commands).await.command, Command::SystemReady);
        assert_eq!(next_command(&mut commands).await.command, Command::ReportError);
    }

    #[tokio::test]
    async fn test_stops_when_broker_closes() {
        let broker = Arc::new(InMemoryBroker::default());
        let system = BaselineSystem::connect(broker.clone(), SESSION, ';').await.unwrap();
        let handle = tokio::spawn(system.run());

        tokio::task::yield_now().await;
        broker.close();

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.answered, 0);
    }
}
