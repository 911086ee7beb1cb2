use serde::{Deserialize, Serialize};

/// Transition triggers for a flow run.
///
/// Node-level reports arrive asynchronously from executors; terminal statuses
/// may also be pushed directly by the master (see
/// [`ExecutionFlowStateMachine::apply_remote_status`](super::ExecutionFlowStateMachine::apply_remote_status)).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    /// The run left the queue and began executing.
    Start,
    /// A node attempt was dispatched.
    NodeStarted(String),
    /// A node attempt finished successfully.
    NodeSucceeded(String),
    /// A node attempt failed; retry policy decides what happens next.
    NodeFailed(String),
    /// Cancel request for the whole run.
    Kill,
}
