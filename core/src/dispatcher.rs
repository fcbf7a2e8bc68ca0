//! Serialized task dispatch

use std::sync::Arc;

use crate::clock::Clock;
use crate::error::BenchResult;
use crate::gate::Gate;
use crate::metrics::DispatchRecord;
use crate::protocol::{self, Task};
use crate::traits::Transport;

/// Result of a [`TaskDispatcher::dispatch_next`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A task with this id was sent
    Sent(usize),
    /// No tasks remain; the all-answers gate has been opened
    Exhausted,
}

/// Sends test tasks to the system one at a time, in index order
///
/// The dispatcher owns the cursor and the dispatch records. It has no
/// internal locking: it must be driven from a single owner (the answer
/// correlator), which is what bounds the number of outstanding tasks to one.
pub struct TaskDispatcher {
    transport: Arc<dyn Transport>,
    task_queue: String,
    header: String,
    test_rows: Arc<[String]>,
    file_separator: char,
    message_separator: char,
    clock: Arc<dyn Clock>,
    all_answers_resolved: Gate,
    next_task_id: usize,
    records: Vec<Option<DispatchRecord>>,
    skipped: Vec<usize>,
}

impl TaskDispatcher {
    /// Create a dispatcher over the test partition
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: Arc<dyn Transport>,
        task_queue: impl Into<String>,
        header: impl Into<String>,
        test_rows: Arc<[String]>,
        file_separator: char,
        message_separator: char,
        clock: Arc<dyn Clock>,
        all_answers_resolved: Gate,
    ) -> Self {
        let records = vec![None; test_rows.len()];
        Self {
            transport,
            task_queue: task_queue.into(),
            header: header.into(),
            test_rows,
            file_separator,
            message_separator,
            clock,
            all_answers_resolved,
            next_task_id: 0,
            records,
            skipped: Vec::new(),
        }
    }

    /// Send the next sendable task, or open the all-answers gate
    ///
    /// Malformed rows are logged and skipped; their id is consumed without a
    /// dispatch record.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the task could not be published. The
    /// cursor has already moved past the failed task.
    pub async fn dispatch_next(&mut self) -> BenchResult<DispatchOutcome> {
        while self.next_task_id < self.test_rows.len() {
            let task_id = self.next_task_id;
            self.next_task_id += 1;

            let Some(task) = self.build_task(task_id) else {
                tracing::error!(
                    task_id,
                    row = %self.test_rows[task_id],
                    "Test row has no target column, skipping task"
                );
                self.skipped.push(task_id);
                continue;
            };

            let payload = protocol::encode_task(&self.header, &task, self.message_separator);
            self.transport
                .publish(&self.task_queue, payload.into_bytes())
                .await?;

            let sent_at_millis = self.clock.now_millis();
            self.records[task_id] = Some(DispatchRecord {
                task_id,
                sent_at_millis,
            });
            tracing::debug!(task_id, sent_at_millis, "Task dispatched");

            return Ok(DispatchOutcome::Sent(task_id));
        }

        tracing::info!(
            dispatched = self.dispatched_count(),
            skipped = self.skipped.len(),
            "All tasks dispatched"
        );
        self.all_answers_resolved.open();
        Ok(DispatchOutcome::Exhausted)
    }

    fn build_task(&self, task_id: usize) -> Option<Task> {
        let row = protocol::strip_target(
            &self.test_rows[task_id],
            self.file_separator,
            self.message_separator,
        )?;
        Some(Task { id: task_id, row })
    }

    /// Dispatch record of a task, if it was sent
    pub fn record(&self, task_id: usize) -> Option<&DispatchRecord> {
        self.records.get(task_id).and_then(Option::as_ref)
    }

    /// All dispatch records indexed by task id
    pub fn records(&self) -> &[Option<DispatchRecord>] {
        &self.records
    }

    /// Ids skipped because their row was malformed
    pub fn skipped(&self) -> &[usize] {
        &self.skipped
    }

    /// Number of tasks actually sent
    pub fn dispatched_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_some()).count()
    }

    /// Cursor position: the next id that will be considered
    pub fn next_task_id(&self) -> usize {
        self.next_task_id
    }

    /// Number of test rows
    pub fn len(&self) -> usize {
        self.test_rows.len()
    }

    /// Check whether there are no test rows at all
    pub fn is_empty(&self) -> bool {
        self.test_rows.is_empty()
    }

    /// Consume the dispatcher, returning its records and skipped ids
    pub fn into_parts(self) -> (Vec<Option<DispatchRecord>>, Vec<usize>) {
        (self.records, self.skipped)
    }
}

impl std::fmt::Debug for TaskDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDispatcher")
            .field("transport", &self.transport.name())
            .field("task_queue", &self.task_queue)
            .field("next_task_id", &self.next_task_id)
            .field("test_rows", &self.test_rows.len())
            .finish()
    }
}
