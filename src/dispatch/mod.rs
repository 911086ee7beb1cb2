//! Master-dispatch coordination layer: boundary traits, the RPC contract,
//! and the execution dispatcher.

pub mod boundaries;
pub mod dispatcher;
pub mod rpc;

pub use boundaries::{
    ExecutionFilter, ExecutionStore, LogChunk, LogQuery, MasterServerLocator, ProjectAuthorizer,
    ProjectRepository, WorkflowDefinition, WorkflowService,
};
pub use dispatcher::{ExecRequest, ExecutionDispatcher, ExecutionFlowDetail, ExecutionPage};
pub use rpc::{ExecInfo, MasterRpc, RpcResult, ScheduleInfo};
