// State machine module for workflow runs.
//
// Tracks a run's status, retry counts, timeout, and failure policy across its
// node executions. Triggers arrive asynchronously from node-level reports;
// persistence of the resulting record belongs to the external store.

pub mod events;
pub mod flow_state_machine;
pub mod states;

pub use events::FlowEvent;
pub use flow_state_machine::ExecutionFlowStateMachine;
pub use states::FlowStatus;
