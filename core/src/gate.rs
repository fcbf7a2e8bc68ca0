//! One-shot phase barriers
//!
//! A [`Gate`] starts closed and moves exactly once, either to open or to
//! interrupted. Waiters observe whichever happened first; later transitions
//! are ignored. Gates are never reset.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::{BenchError, BenchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Closed,
    Open,
    Interrupted,
}

/// A named one-shot barrier
///
/// Cloning a gate yields another handle to the same barrier.
#[derive(Debug, Clone)]
pub struct Gate {
    name: &'static str,
    state: Arc<watch::Sender<GateState>>,
}

impl Gate {
    /// Create a closed gate
    pub fn new(name: &'static str) -> Self {
        let (state, _) = watch::channel(GateState::Closed);
        Self {
            name,
            state: Arc::new(state),
        }
    }

    /// Gate name, used in logs and errors
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Open the gate, releasing all current and future waiters
    ///
    /// Has no effect if the gate was already opened or interrupted.
    pub fn open(&self) {
        let changed = self.transition(GateState::Open);
        if changed {
            tracing::debug!(gate = self.name, "Gate opened");
        }
    }

    /// Interrupt the gate; waiters fail with an interrupted error
    ///
    /// Has no effect if the gate was already opened.
    pub fn interrupt(&self) {
        let changed = self.transition(GateState::Interrupted);
        if changed {
            tracing::warn!(gate = self.name, "Gate interrupted");
        }
    }

    /// Check whether the gate is open
    pub fn is_open(&self) -> bool {
        *self.state.borrow() == GateState::Open
    }

    /// Wait until the gate opens
    ///
    /// Returns immediately if the gate is already open.
    ///
    /// # Errors
    ///
    /// Returns an interrupted error if the gate was interrupted instead.
    pub async fn wait(&self) -> BenchResult<()> {
        let mut rx = self.state.subscribe();
        let state = *rx
            .wait_for(|s| *s != GateState::Closed)
            .await
            .map_err(|_| BenchError::interrupted(format!("gate `{}` dropped", self.name)))?;

        match state {
            GateState::Open => Ok(()),
            _ => Err(BenchError::interrupted(format!(
                "interrupted while waiting for `{}`",
                self.name
            ))),
        }
    }

    /// Wait with an optional deadline
    ///
    /// # Errors
    ///
    /// Returns a timeout error if the deadline passes first, or an
    /// interrupted error if the gate was interrupted.
    pub async fn wait_timeout(&self, timeout: Option<Duration>) -> BenchResult<()> {
        match timeout {
            None => self.wait().await,
            Some(limit) => tokio::time::timeout(limit, self.wait())
                .await
                .map_err(|_| {
                    BenchError::timeout(format!(
                        "`{}` did not open within {:?}",
                        self.name, limit
                    ))
                })?,
        }
    }

    fn transition(&self, to: GateState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == GateState::Closed {
                *state = to;
                true
            } else {
                false
            }
        })
    }
}

/// The two barriers of a benchmark run
#[derive(Debug, Clone)]
pub struct PhaseGate {
    /// Opened when the system reports that learning finished
    pub learning_done: Gate,
    /// Opened when the dispatcher has run out of tasks
    pub all_answers_resolved: Gate,
}

impl PhaseGate {
    /// Create both gates closed
    pub fn new() -> Self {
        Self {
            learning_done: Gate::new("learning_done"),
            all_answers_resolved: Gate::new("all_answers_resolved"),
        }
    }

    /// Interrupt every gate that is still closed
    pub fn interrupt_all(&self) {
        self.learning_done.interrupt();
        self.all_answers_resolved.interrupt();
    }
}

impl Default for PhaseGate {
    fn default() -> Self {
        Self::new()
    }
}
