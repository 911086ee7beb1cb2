//! Data layer: execution records and collaborator entities.

pub mod enums;
pub mod execution_flow;
pub mod execution_node;
pub mod master_server;
pub mod project;

pub use enums::{ExecType, FailurePolicy, NodeDepType, NotifyType};
pub use execution_flow::{ExecutionFlow, Property};
pub use execution_node::ExecutionNode;
pub use master_server::MasterServer;
pub use project::{Project, ProjectFlow, User};
