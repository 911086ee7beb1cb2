//! External collaborator seams.
//!
//! The core never embeds SQL or HTTP: persistence, project lookup,
//! authorization, master location, workflow authoring, and log retrieval are
//! black-box operations behind these traits. Implementations live with the
//! storage and web layers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{ExecutionFlow, ExecutionNode, MasterServer, Project, ProjectFlow, User};
use crate::state_machine::FlowStatus;

/// Filter for windowed execution queries: workflow-name set, time window,
/// status set, pagination offset + size.
#[derive(Debug, Clone, Default)]
pub struct ExecutionFilter {
    pub project_name: String,
    pub flow_names: Vec<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub statuses: Vec<FlowStatus>,
    pub from: usize,
    pub size: usize,
}

/// Read/write operations over execution records.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn insert_flow(&self, flow: &ExecutionFlow) -> Result<()>;
    async fn flow_by_exec_id(&self, exec_id: i64) -> Result<Option<ExecutionFlow>>;
    /// Most recent run of the given workflow, if any.
    async fn latest_flow(&self, flow_id: i32) -> Result<Option<ExecutionFlow>>;
    async fn select_by_window(&self, filter: &ExecutionFilter) -> Result<Vec<ExecutionFlow>>;
    async fn sum_by_window(&self, filter: &ExecutionFilter) -> Result<i64>;
    async fn nodes_by_exec_id(&self, exec_id: i64) -> Result<Vec<ExecutionNode>>;
    async fn node_by_job_id(&self, job_id: &str) -> Result<Option<ExecutionNode>>;
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn project_by_name(&self, name: &str) -> Result<Option<Project>>;
    async fn flow_by_name(&self, project_id: i32, name: &str) -> Result<Option<ProjectFlow>>;
}

/// Authorization checks, consulted before any state-mutating or sensitive
/// query operation.
#[async_trait]
pub trait ProjectAuthorizer: Send + Sync {
    async fn has_write_perm(&self, user_id: i32, project: &Project) -> Result<bool>;
    async fn has_read_perm(&self, user_id: i32, project: &Project) -> Result<bool>;
    async fn has_exec_perm(&self, user_id: i32, project: &Project) -> Result<bool>;
}

/// Resolves the currently active master. Queried immediately before each
/// dispatch call; results must not be cached across calls.
#[async_trait]
pub trait MasterServerLocator: Send + Sync {
    async fn active_master(&self) -> Result<Option<MasterServer>>;
}

/// Inline source for an ephemeral single-use workflow definition.
#[derive(Debug, Clone, Default)]
pub struct WorkflowDefinition {
    pub desc: Option<String>,
    pub proxy_user: Option<String>,
    pub queue: Option<String>,
    /// Serialized DAG data; parsing it is out of scope for this core.
    pub data: String,
}

/// Workflow authoring collaborator used by the direct-run convenience path.
#[async_trait]
pub trait WorkflowService: Send + Sync {
    async fn create_workflow(
        &self,
        operator: &User,
        project_name: &str,
        flow_name: &str,
        definition: WorkflowDefinition,
    ) -> Result<Option<ProjectFlow>>;
}

/// One page of job log lines from the external log backend.
#[derive(Debug, Clone)]
pub struct LogChunk {
    pub job_id: String,
    pub offset: usize,
    pub total: usize,
    pub lines: Vec<String>,
}

#[async_trait]
pub trait LogQuery: Send + Sync {
    async fn tail(&self, job_id: &str, from: usize, size: usize, query: &str) -> Result<LogChunk>;
}
