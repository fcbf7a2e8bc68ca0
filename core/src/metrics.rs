//! Dispatch/answer records and the result statistics built from them

use serde::{Deserialize, Serialize};

/// When a task was sent to the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRecord {
    /// Task id
    pub task_id: usize,
    /// Send time in epoch milliseconds
    pub sent_at_millis: i64,
}

/// A well-formed answer for a dispatched task
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    /// Task id
    pub task_id: usize,
    /// Value predicted by the system
    pub predicted_value: f64,
    /// Receipt time in epoch milliseconds
    pub received_at_millis: i64,
}

/// Accuracy of the received predictions under a scoring strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyScore {
    /// Strategy name (e.g. "mae")
    pub metric: String,
    /// Score value
    pub value: f64,
    /// Number of answered tasks with a parseable expected value
    pub scored_count: usize,
}

/// Final statistics of a benchmark run
///
/// Latency statistics are `None` when no task has both a dispatch and an
/// answer record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultStatistics {
    /// Arithmetic mean of per-task latencies (ms)
    pub mean_latency_millis: Option<f64>,
    /// Population standard deviation of per-task latencies (ms)
    pub std_dev_latency_millis: Option<f64>,
    /// Number of test rows
    pub test_set_size: usize,
    /// Test rows without an accepted answer
    pub faulty_or_missing_count: usize,
    /// Test rows with an accepted answer
    pub answered_count: usize,
    /// Test rows never dispatched because the row was malformed
    pub skipped_count: usize,
    /// Prediction quality, when at least one answer could be scored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<AccuracyScore>,
}

/// Mean and population standard deviation of a sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    /// Sample size
    pub count: usize,
    /// Arithmetic mean
    pub mean: Option<f64>,
    /// Population standard deviation
    pub std_dev: Option<f64>,
}

impl LatencySummary {
    /// Summarise a set of latencies
    pub fn from_latencies(latencies: &[f64]) -> Self {
        let count = latencies.len();
        if count == 0 {
            return Self {
                count,
                mean: None,
                std_dev: None,
            };
        }

        let n = count as f64;
        let mean = latencies.iter().sum::<f64>() / n;
        let variance = latencies.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

        Self {
            count,
            mean: Some(mean),
            std_dev: Some(variance.sqrt()),
        }
    }
}
