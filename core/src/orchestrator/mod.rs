//! Orchestrator for benchmark lifecycle management
//!
//! The Orchestrator coordinates one complete benchmark session:
//! - Splitting the dataset into training and test partitions
//! - Sending training data and waiting for the learning phase to end
//! - Running the answer correlator, which drives task dispatch
//! - Handling interruption via the phase gates
//! - Evaluating the collected records
//!
//! # Example
//!
//! ```ignore
//! use hobbit_bench_core::{Dataset, OrchestratorBuilder};
//!
//! let orchestrator = OrchestratorBuilder::new()
//!     .session_id(session_id)
//!     .seed(42)
//!     .dataset(Dataset::from_path(path)?)
//!     .transport(transport)
//!     .build()?;
//!
//! let outcome = orchestrator.run_with_signal_handling().await?;
//! ```

mod builder;
mod executor;

pub use builder::OrchestratorBuilder;
pub use executor::{BenchmarkOutcome, Orchestrator};
