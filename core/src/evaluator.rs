//! Result evaluation once all answers are resolved

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{BenchError, BenchResult};
use crate::metrics::{AccuracyScore, AnswerRecord, DispatchRecord, LatencySummary, ResultStatistics};
use crate::protocol;
use crate::scoring::{MeanAbsoluteError, ScoringStrategy};

/// Builds [`ResultStatistics`] from the records of a finished run
#[derive(Clone)]
pub struct Evaluator {
    scoring: Arc<dyn ScoringStrategy>,
    file_separator: char,
}

impl Evaluator {
    /// Create an evaluator with a scoring strategy
    pub fn new(scoring: Arc<dyn ScoringStrategy>, file_separator: char) -> Self {
        Self {
            scoring,
            file_separator,
        }
    }

    /// Evaluate a run
    ///
    /// `dispatches` is indexed by task id and may be shorter than
    /// `test_rows` only if the run aborted; missing entries count as unsent.
    /// Answers for ids outside the test set are ignored.
    ///
    /// # Errors
    ///
    /// Returns a clock skew error if any answer was received before its task
    /// was sent.
    pub fn evaluate(
        &self,
        test_rows: &[String],
        dispatches: &[Option<DispatchRecord>],
        answers: &HashMap<usize, AnswerRecord>,
        skipped_count: usize,
    ) -> BenchResult<ResultStatistics> {
        let mut latencies = Vec::with_capacity(answers.len());
        let mut pairs = Vec::with_capacity(answers.len());
        let mut answered_count = 0;

        for (task_id, row) in test_rows.iter().enumerate() {
            let Some(answer) = answers.get(&task_id) else {
                continue;
            };
            answered_count += 1;

            if let Some(dispatch) = dispatches.get(task_id).and_then(Option::as_ref) {
                let latency = answer.received_at_millis - dispatch.sent_at_millis;
                if latency < 0 {
                    return Err(BenchError::clock_skew(format!(
                        "task {} answered at {} before it was sent at {}",
                        task_id, answer.received_at_millis, dispatch.sent_at_millis
                    )));
                }
                latencies.push(latency as f64);
            }

            match protocol::expected_value(row, self.file_separator) {
                Some(expected) => pairs.push((expected, answer.predicted_value)),
                None => tracing::warn!(
                    task_id,
                    "Expected value of test row is not a number, not scored"
                ),
            }
        }

        let summary = LatencySummary::from_latencies(&latencies);
        let accuracy = self.scoring.score(&pairs).map(|value| AccuracyScore {
            metric: self.scoring.name().to_string(),
            value,
            scored_count: pairs.len(),
        });

        let stats = ResultStatistics {
            mean_latency_millis: summary.mean,
            std_dev_latency_millis: summary.std_dev,
            test_set_size: test_rows.len(),
            faulty_or_missing_count: test_rows.len() - answered_count,
            answered_count,
            skipped_count,
            accuracy,
        };

        tracing::info!(
            test_set_size = stats.test_set_size,
            answered = stats.answered_count,
            faulty_or_missing = stats.faulty_or_missing_count,
            skipped = stats.skipped_count,
            mean_latency_ms = ?stats.mean_latency_millis,
            std_dev_latency_ms = ?stats.std_dev_latency_millis,
            "Evaluation finished"
        );

        Ok(stats)
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(Arc::new(MeanAbsoluteError), crate::config::DEFAULT_SEPARATOR)
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("scoring", &self.scoring.name())
            .field("file_separator", &self.file_separator)
            .finish()
    }
}
