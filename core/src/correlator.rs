//! Answer correlation
//!
//! The correlator is the single owner of all mutable run state: it holds the
//! [`TaskDispatcher`] and the answer map, and handles one answer message at
//! a time. Every message, usable or not, triggers exactly one
//! `dispatch_next` call, so at most one task is ever outstanding.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;

use crate::clock::Clock;
use crate::dispatcher::{DispatchOutcome, TaskDispatcher};
use crate::error::{BenchError, BenchResult};
use crate::metrics::{AnswerRecord, DispatchRecord};
use crate::protocol;
use crate::traits::MessageStream;

/// Records handed over to the evaluator once dispatching is finished
#[derive(Debug, Clone, Default)]
pub struct Correlation {
    /// Dispatch records indexed by task id (`None` for unsent tasks)
    pub dispatches: Vec<Option<DispatchRecord>>,
    /// Accepted answers keyed by task id
    pub answers: HashMap<usize, AnswerRecord>,
    /// Task ids skipped because their row was malformed
    pub skipped: Vec<usize>,
    /// Answer messages that could not be used
    pub rejected_answers: usize,
}

/// Matches answer messages to dispatched tasks and drives dispatch
pub struct AnswerCorrelator {
    dispatcher: TaskDispatcher,
    answers: HashMap<usize, AnswerRecord>,
    separator: char,
    clock: Arc<dyn Clock>,
    rejected_answers: usize,
}

impl AnswerCorrelator {
    /// Create a correlator that owns `dispatcher`
    pub fn new(dispatcher: TaskDispatcher, separator: char, clock: Arc<dyn Clock>) -> Self {
        Self {
            dispatcher,
            answers: HashMap::new(),
            separator,
            clock,
            rejected_answers: 0,
        }
    }

    /// Handle one inbound answer message, then dispatch the next task
    ///
    /// Unusable answers (malformed, unknown or never-dispatched task id) are
    /// logged and discarded. A repeated answer for the same task replaces the
    /// earlier one.
    ///
    /// # Errors
    ///
    /// Only dispatch failures propagate; answer problems never do.
    pub async fn on_answer_message(&mut self, payload: &[u8]) -> BenchResult<DispatchOutcome> {
        let received_at_millis = self.clock.now_millis();

        if let Err(reason) = self.accept(payload, received_at_millis) {
            self.rejected_answers += 1;
            tracing::warn!(
                payload = %String::from_utf8_lossy(payload),
                reason = %reason,
                "Discarding unusable answer"
            );
        }

        self.dispatcher.dispatch_next().await
    }

    fn accept(&mut self, payload: &[u8], received_at_millis: i64) -> Result<(), String> {
        let answer = protocol::parse_answer(payload, self.separator).map_err(|e| e.to_string())?;

        if self.dispatcher.record(answer.task_id).is_none() {
            return Err(format!("task {} was never dispatched", answer.task_id));
        }

        let record = AnswerRecord {
            task_id: answer.task_id,
            predicted_value: answer.value,
            received_at_millis,
        };
        if self.answers.insert(answer.task_id, record).is_some() {
            tracing::debug!(task_id = answer.task_id, "Duplicate answer replaces earlier one");
        }
        tracing::debug!(
            task_id = answer.task_id,
            value = answer.value,
            received_at_millis,
            "Answer received"
        );
        Ok(())
    }

    /// Dispatch the first task and process answers until tasks run out
    ///
    /// The stream is consumed strictly sequentially; this is the only place
    /// where answers are handled during a run.
    ///
    /// # Errors
    ///
    /// Returns an interrupted error if the answer stream ends while tasks
    /// are still pending, or any dispatch error.
    pub async fn run(mut self, mut answers: MessageStream) -> BenchResult<Correlation> {
        let mut outcome = self.dispatcher.dispatch_next().await?;

        while outcome != DispatchOutcome::Exhausted {
            match answers.next().await {
                Some(payload) => outcome = self.on_answer_message(&payload).await?,
                None => {
                    return Err(BenchError::interrupted(format!(
                        "answer stream closed with task {} outstanding",
                        self.dispatcher.next_task_id().saturating_sub(1)
                    )))
                }
            }
        }

        Ok(self.into_correlation())
    }

    /// Dispatched tasks that have no accepted answer yet
    pub fn outstanding(&self) -> usize {
        self.dispatcher
            .records()
            .iter()
            .flatten()
            .filter(|r| !self.answers.contains_key(&r.task_id))
            .count()
    }

    /// Accepted answers so far
    pub fn answers(&self) -> &HashMap<usize, AnswerRecord> {
        &self.answers
    }

    /// The owned dispatcher
    pub fn dispatcher(&self) -> &TaskDispatcher {
        &self.dispatcher
    }

    /// Consume the correlator, handing its records to the evaluator
    pub fn into_correlation(self) -> Correlation {
        let (dispatches, skipped) = self.dispatcher.into_parts();
        Correlation {
            dispatches,
            answers: self.answers,
            skipped,
            rejected_answers: self.rejected_answers,
        }
    }
}

impl std::fmt::Debug for AnswerCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerCorrelator")
            .field("dispatcher", &self.dispatcher)
            .field("answers", &self.answers.len())
            .field("rejected_answers", &self.rejected_answers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::gate::Gate;
    use crate::testing::RecordingTransport;

    struct Fixture {
        correlator: AnswerCorrelator,
        transport: Arc<RecordingTransport>,
        clock: Arc<ManualClock>,
        gate: Gate,
    }

    fn fixture(rows: &[&str]) -> Fixture {
        let transport = Arc::new(RecordingTransport::new());
        let clock = Arc::new(ManualClock::new(0));
        let gate = Gate::new("all_answers_resolved");
        let rows: Vec<String> = rows.iter().map(|r| r.to_string()).collect();
        let dispatcher = TaskDispatcher::new(
            transport.clone(),
            "tasks",
            "a;q",
            rows.into(),
            ';',
            ';',
            clock.clone(),
            gate.clone(),
        );
        Fixture {
            correlator: AnswerCorrelator::new(dispatcher, ';', clock.clone()),
            transport,
            clock,
            gate,
        }
    }

    #[tokio::test]
    async fn test_answer_is_recorded_and_next_task_sent() {
        let mut f = fixture(&["1;5", "2;6"]);
        f.correlator.dispatcher.dispatch_next().await.unwrap();

        f.clock.set(40);
        let outcome = f.correlator.on_answer_message(b"0;5.5").await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Sent(1));
        let record = f.correlator.answers()[&0];
        assert_eq!(record.predicted_value, 5.5);
        assert_eq!(record.received_at_millis, 40);
        assert_eq!(f.transport.published("tasks").len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_answer_still_advances_dispatch() {
        let mut f = fixture(&["1;5", "2;6", "3;7"]);
        f.correlator.dispatcher.dispatch_next().await.unwrap();

        for payload in [&b"no separator"[..], b"x;1.0", b"0;not-a-number"] {
            f.correlator.on_answer_message(payload).await.unwrap();
        }

        assert!(f.correlator.answers().is_empty());
        assert!(f.gate.is_open());
        assert_eq!(f.transport.published("tasks").len(), 3);
        assert_eq!(f.correlator.into_correlation().rejected_answers, 3);
    }

    #[tokio::test]
    async fn test_out_of_order_answers_match_their_tasks() {
        let mut f = fixture(&["1;5", "2;6", "3;7"]);
        f.correlator.dispatcher.dispatch_next().await.unwrap(); // task 0

        f.clock.set(10);
        f.correlator.on_answer_message(b"garbage").await.unwrap(); // task 1 sent at 10
        f.clock.set(20);
        f.correlator.on_answer_message(b"1;6.0").await.unwrap(); // task 2 sent at 20
        f.clock.set(30);
        f.correlator.on_answer_message(b"0;5.0").await.unwrap(); // late answer for 0

        let answers = f.correlator.answers();
        assert_eq!(answers[&1].predicted_value, 6.0);
        assert_eq!(answers[&1].received_at_millis, 20);
        assert_eq!(answers[&0].predicted_value, 5.0);
        assert_eq!(answers[&0].received_at_millis, 30);
        assert!(f.gate.is_open());
    }

    #[tokio::test]
    async fn test_duplicate_answer_last_write_wins() {
        let mut f = fixture(&["1;5", "2;6", "3;7"]);
        f.correlator.dispatcher.dispatch_next().await.unwrap();

        f.correlator.on_answer_message(b"0;1.0").await.unwrap();
        f.clock.set(99);
        f.correlator.on_answer_message(b"0;2.0").await.unwrap();

        let record = f.correlator.answers()[&0];
        assert_eq!(record.predicted_value, 2.0);
        assert_eq!(record.received_at_millis, 99);
        assert_eq!(f.correlator.answers().len(), 1);
    }

    #[tokio::test]
    async fn test_answer_for_undispatched_task_is_rejected() {
        let mut f = fixture(&["1;5", "2;6", "3;7"]);
        f.correlator.dispatcher.dispatch_next().await.unwrap();

        f.correlator.on_answer_message(b"2;7.0").await.unwrap();
        f.correlator.on_answer_message(b"99;7.0").await.unwrap();

        assert!(f.correlator.answers().is_empty());
    }

    #[tokio::test]
    async fn test_pipeline_never_has_more_than_one_outstanding_task() {
        let rows: Vec<String> = (0..20).map(|i| format!("{};{}", i, i)).collect();
        let row_refs: Vec<&str> = rows.iter().map(String::as_str).collect();
        let mut f = fixture(&row_refs);

        f.correlator.dispatcher.dispatch_next().await.unwrap();
        assert_eq!(f.correlator.outstanding(), 1);

        for id in 0..20 {
            let payload = format!("{};1.0", id);
            f.correlator.on_answer_message(payload.as_bytes()).await.unwrap();
            assert!(f.correlator.outstanding() <= 1);
            assert_eq!(f.transport.published("tasks").len(), (id + 2).min(20));
        }
        assert_eq!(f.correlator.outstanding(), 0);
        assert!(f.gate.is_open());
    }

    #[tokio::test]
    async fn test_each_message_releases_at_most_one_task() {
        let rows: Vec<String> = (0..20).map(|i| format!("{};{}", i, i)).collect();
        let row_refs: Vec<&str> = rows.iter().map(String::as_str).collect();
        let mut f = fixture(&row_refs);

        f.correlator.dispatcher.dispatch_next().await.unwrap();

        for (handled, id) in (0..20).enumerate() {
            let payload = if id % 3 == 0 {
                "broken".to_string()
            } else {
                format!("{};1.0", id)
            };
            f.correlator.on_answer_message(payload.as_bytes()).await.unwrap();
            assert!(f.transport.published("tasks").len() <= handled + 2);
        }
        assert!(f.gate.is_open());
    }

    #[tokio::test]
    async fn test_run_consumes_stream_until_exhausted() {
        let f = fixture(&["1;5", "2;6"]);
        let stream: MessageStream =
            Box::pin(futures::stream::iter(vec![b"0;5.0".to_vec(), b"1;6.0".to_vec()]));

        let correlation = f.correlator.run(stream).await.unwrap();

        assert_eq!(correlation.answers.len(), 2);
        assert!(correlation.dispatches.iter().all(Option::is_some));
        assert!(f.gate.is_open());
    }

    #[tokio::test]
    async fn test_run_fails_when_stream_closes_early() {
        let f = fixture(&["1;5", "2;6"]);
        let stream: MessageStream = Box::pin(futures::stream::iter(vec![b"0;5.0".to_vec()]));

        let err = f.correlator.run(stream).await.unwrap_err();
        assert!(err.is(crate::ErrorKind::Interrupted));
        assert!(!f.gate.is_open());
    }
}
