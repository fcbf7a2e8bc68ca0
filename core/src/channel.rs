//! Queue naming and channel configuration for controller/system communication

/// Prefix of the queue carrying training data to the system
pub const TRAINING_QUEUE_PREFIX: &str = "hobbit.datagen-system";

/// Prefix of the queue carrying tasks to the system
pub const TASK_QUEUE_PREFIX: &str = "hobbit.taskgen-system";

/// Prefix of the queue carrying answers back to the controller
pub const ANSWER_QUEUE_PREFIX: &str = "hobbit.system-evalstore";

/// Session-scoped queue names
///
/// Every run uses its own queues so that concurrent sessions on a shared
/// broker never see each other's traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueNames {
    /// Controller -> system training payloads
    pub training: String,
    /// Controller -> system task payloads
    pub tasks: String,
    /// System -> controller answers
    pub answers: String,
}

impl QueueNames {
    /// Derive the queue names for a session
    pub fn for_session(session_id: &str) -> Self {
        Self {
            training: format!("{}.{}", TRAINING_QUEUE_PREFIX, session_id),
            tasks: format!("{}.{}", TASK_QUEUE_PREFIX, session_id),
            answers: format!("{}.{}", ANSWER_QUEUE_PREFIX, session_id),
        }
    }
}

/// Channel buffer configuration for in-process communication
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Capacity of the command exchange (messages a slow subscriber may lag)
    pub command_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer: 64,
        }
    }
}

impl ChannelConfig {
    /// Create a channel config with a custom command buffer size
    pub fn with_command_buffer(mut self, size: usize) -> Self {
        self.command_buffer = size;
        self
    }
}
