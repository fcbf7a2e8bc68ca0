//! Core traits for the message transport
//!
//! The transport is defined here so that the orchestration engine and the
//! system under test can share it without depending on a concrete broker.
//! Implementations live in their own crates (transport/).

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Stream of raw message payloads from a queue or exchange
pub type MessageStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// Message transport between the controller and the system under test
///
/// Named queues are point-to-point: each message is delivered to the single
/// consumer of the queue, in publication order, including messages published
/// before the consumer subscribed. The broadcast exchange delivers every
/// message to every current subscriber and carries commands.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport identifier for logs (e.g. "in-memory")
    fn name(&self) -> &str;

    /// Publish a payload to a named queue
    async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Start consuming a named queue
    async fn subscribe(&self, queue: &str) -> Result<MessageStream, TransportError>;

    /// Publish a payload on the broadcast exchange
    async fn broadcast(&self, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Start consuming the broadcast exchange
    async fn subscribe_broadcast(&self) -> Result<MessageStream, TransportError>;
}

/// Transport-level errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The transport has been shut down
    #[error("Transport closed")]
    Closed,

    /// Queue already has a consumer
    #[error("Queue already consumed: {0}")]
    AlreadyConsumed(String),

    /// The queue or exchange rejected the message
    #[error("Publish to {queue} failed: {message}")]
    Publish {
        /// Target queue
        queue: String,
        /// Error message
        message: String,
    },
}

impl From<TransportError> for crate::BenchError {
    fn from(err: TransportError) -> Self {
        crate::BenchError::transport(err.to_string())
    }
}
