//! hobbit-bench-core: Core engine of the regression benchmark controller
//!
//! This crate provides the building blocks of a benchmark session against a
//! system under test, including:
//!
//! - Dataset loading and the seeded train/test split
//! - Wire formats for training data, tasks, answers and commands
//! - Phase gates and the serialized task dispatch pipeline
//! - Answer correlation and result evaluation
//! - The orchestrator tying the phases together
//! - Error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod clock;
pub mod config;
pub mod correlator;
pub mod dataset;
pub mod dispatcher;
pub mod error;
pub mod evaluator;
pub mod gate;
pub mod metrics;
pub mod orchestrator;
pub mod protocol;
pub mod scoring;
pub mod traits;

#[cfg(test)]
mod testing;

pub use channel::{ChannelConfig, QueueNames};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BenchmarkConfig, ConfigError};
pub use correlator::{AnswerCorrelator, Correlation};
pub use dataset::{Dataset, Split};
pub use dispatcher::{DispatchOutcome, TaskDispatcher};
pub use error::*;
pub use evaluator::Evaluator;
pub use gate::{Gate, PhaseGate};
pub use metrics::*;
pub use orchestrator::{BenchmarkOutcome, Orchestrator, OrchestratorBuilder};
pub use protocol::{Answer, Command, CommandMessage, ProtocolError, Task};
pub use scoring::{strategy_by_name, MeanAbsoluteError, RootMeanSquaredError, ScoringStrategy};
pub use traits::*;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_result_statistics_json_format() {
        let stats = ResultStatistics {
            mean_latency_millis: Some(60.0),
            std_dev_latency_millis: Some(14.5),
            test_set_size: 3,
            faulty_or_missing_count: 0,
            answered_count: 3,
            skipped_count: 0,
            accuracy: None,
        };
        let json = serde_json::to_string(&stats).unwrap();

        assert!(json.contains("\"mean_latency_millis\":60.0"));
        assert!(json.contains("\"test_set_size\":3"));
        assert!(!json.contains("accuracy"));
    }

    #[test]
    fn test_undefined_latency_serializes_as_null() {
        let stats = ResultStatistics {
            mean_latency_millis: None,
            std_dev_latency_millis: None,
            test_set_size: 2,
            faulty_or_missing_count: 2,
            answered_count: 0,
            skipped_count: 0,
            accuracy: None,
        };
        let json = serde_json::to_string(&stats).unwrap();

        assert!(json.contains("\"mean_latency_millis\":null"));
    }

    #[test]
    fn test_split_feeds_task_encoding() {
        let dataset = Dataset::from_text("a;b;q\n1;2;3\n4;5;6\n7;8;9\n").unwrap();
        let split = dataset.split(7, 0.0);

        let row = protocol::strip_target(&split.test_rows[0], ';', ';').unwrap();
        let payload = protocol::encode_task(split.header.as_str(), &Task { id: 0, row }, ';');
        assert_eq!(payload, ";a;b;q\n0;1;2");
    }

    #[test]
    fn test_config_roundtrip() {
        let config = BenchmarkConfig::new(3).with_answers_timeout(None);
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: BenchmarkConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.seed, 3);
        assert_eq!(deserialized.answers_timeout(), None);
        assert_eq!(deserialized.learning_timeout(), Some(std::time::Duration::from_secs(600)));
    }
}
