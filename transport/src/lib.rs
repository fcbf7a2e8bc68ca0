//! hobbit-bench-transport: Message transports for hobbit-bench
//!
//! [`InMemoryBroker`] runs the controller and the system under test inside
//! one process. It offers buffered point-to-point queues, each consumed by a
//! single subscriber, and a fan-out command exchange.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use hobbit_bench_core::{ChannelConfig, MessageStream, Transport, TransportError};

struct QueueSlot {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl QueueSlot {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx: Some(rx) }
    }
}

struct State {
    queues: HashMap<String, QueueSlot>,
    commands: Option<broadcast::Sender<Vec<u8>>>,
}

/// In-process broker
///
/// Messages published to a queue before anyone subscribes are kept until the
/// subscriber arrives. Command subscribers only see frames broadcast after
/// they subscribed; a subscriber falling more than `command_buffer` frames
/// behind loses the oldest ones.
pub struct InMemoryBroker {
    state: Mutex<State>,
}

impl InMemoryBroker {
    /// Create a broker with the given buffer sizes
    pub fn new(config: ChannelConfig) -> Self {
        let (commands, _) = broadcast::channel(config.command_buffer.max(1));
        Self {
            state: Mutex::new(State {
                queues: HashMap::new(),
                commands: Some(commands),
            }),
        }
    }

    /// Close the broker
    ///
    /// All subscriber streams end once they have drained what was already
    /// delivered; further publishing fails.
    pub fn close(&self) {
        let mut state = self.lock();
        state.commands = None;
        state.queues.clear();
        tracing::debug!("Broker closed");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(ChannelConfig::default())
    }
}

impl std::fmt::Debug for InMemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("InMemoryBroker")
            .field("queues", &state.queues.keys().collect::<Vec<_>>())
            .field("closed", &state.commands.is_none())
            .finish()
    }
}

fn queue_stream(rx: mpsc::UnboundedReceiver<Vec<u8>>) -> MessageStream {
    Box::pin(futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|msg| (msg, rx))
    }))
}

fn command_stream(rx: broadcast::Receiver<Vec<u8>>) -> MessageStream {
    Box::pin(futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(frame) => return Some((frame, rx)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Command subscriber lagged, frames dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }))
}

#[async_trait]
impl Transport for InMemoryBroker {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let mut state = self.lock();
        if state.commands.is_none() {
            return Err(TransportError::Closed);
        }

        let slot = state
            .queues
            .entry(queue.to_string())
            .or_insert_with(QueueSlot::new);
        slot.tx.send(payload).map_err(|_| TransportError::Publish {
            queue: queue.to_string(),
            message: "subscriber dropped".to_string(),
        })?;

        tracing::trace!(queue, "Message published");
        Ok(())
    }

    async fn subscribe(&self, queue: &str) -> Result<MessageStream, TransportError> {
        let mut state = self.lock();
        if state.commands.is_none() {
            return Err(TransportError::Closed);
        }

        let slot = state
            .queues
            .entry(queue.to_string())
            .or_insert_with(QueueSlot::new);
        let rx = slot
            .rx
            .take()
            .ok_or_else(|| TransportError::AlreadyConsumed(queue.to_string()))?;

        tracing::debug!(queue, "Subscribed to queue");
        Ok(queue_stream(rx))
    }

    async fn broadcast(&self, payload: Vec<u8>) -> Result<(), TransportError> {
        let state = self.lock();
        let commands = state.commands.as_ref().ok_or(TransportError::Closed)?;

        // Sending with no subscriber is not an error on a fan-out exchange
        if commands.send(payload).is_err() {
            tracing::trace!("Command broadcast had no subscribers");
        }
        Ok(())
    }

    async fn subscribe_broadcast(&self) -> Result<MessageStream, TransportError> {
        let state = self.lock();
        let commands = state.commands.as_ref().ok_or(TransportError::Closed)?;
        Ok(command_stream(commands.subscribe()))
    }
}
