//! Test doubles shared by the unit test modules

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::traits::{MessageStream, Transport, TransportError};

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

#[derive(Default)]
struct Inner {
    published: HashMap<String, Vec<Vec<u8>>>,
    queues: HashMap<String, QueueSlot>,
    broadcasts: Vec<Vec<u8>>,
    subscribers: Vec<mpsc::UnboundedSender<Vec<u8>>>,
}

/// Minimal broker that also records everything published through it
#[derive(Default)]
pub(crate) struct RecordingTransport {
    inner: Mutex<Inner>,
    fail_on: Option<String>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reject every publish to `queue`
    pub(crate) fn failing_on(mut self, queue: &str) -> Self {
        self.fail_on = Some(queue.to_string());
        self
    }

    /// Payloads published to `queue`, as text
    pub(crate) fn published(&self, queue: &str) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .published
            .get(queue)
            .map(|msgs| {
                msgs.iter()
                    .map(|m| String::from_utf8_lossy(m).into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Frames sent on the broadcast exchange
    pub(crate) fn broadcasts(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().broadcasts.clone()
    }
}

fn into_stream(rx: mpsc::UnboundedReceiver<Vec<u8>>) -> MessageStream {
    Box::pin(futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|msg| (msg, rx))
    }))
}

#[async_trait]
impl Transport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if self.fail_on.as_deref() == Some(queue) {
            return Err(TransportError::Publish {
                queue: queue.to_string(),
                message: "simulated failure".to_string(),
            });
        }
        let mut inner = self.inner.lock().unwrap();
        inner
            .published
            .entry(queue.to_string())
            .or_default()
            .push(payload.clone());
        let slot = inner
            .queues
            .entry(queue.to_string())
            .or_insert_with(QueueSlot::new);
        let _ = slot.tx.send(payload);
        Ok(())
    }

    async fn subscribe(&self, queue: &str) -> Result<MessageStream, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        let slot = inner
            .queues
            .entry(queue.to_string())
            .or_insert_with(QueueSlot::new);
        let rx = slot
            .rx
            .take()
            .ok_or_else(|| TransportError::AlreadyConsumed(queue.to_string()))?;
        Ok(into_stream(rx))
    }

    async fn broadcast(&self, payload: Vec<u8>) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.broadcasts.push(payload.clone());
        inner
            .subscribers
            .retain(|tx| tx.send(payload.clone()).is_ok());
        Ok(())
    }

    async fn subscribe_broadcast(&self) -> Result<MessageStream, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().unwrap().subscribers.push(tx);
        Ok(into_stream(rx))
    }
}
