use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutorState {
    Idle,
    Running,
}

/// Commands sent into a running executor.
#[derive(Debug, Clone, Copy)]
pub enum ExecutorCommand {
    Stop,
}

/// Lifecycle events sent from the executor back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutorEvent {
    Log(String),
    StateChanged(ExecutorState),
    NodeStarted(Uuid),
    NodeCompleted(Uuid),
    NodeFailed(Uuid, String),
    FlowCompleted,
    FlowStopped,
    FlowTimedOut,
}
