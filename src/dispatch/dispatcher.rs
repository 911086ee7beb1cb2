//! # Execution Dispatcher
//!
//! The master-facing coordination layer: translates a user's execution
//! intent into exactly one outbound RPC, with pre-submission consistency
//! checks, and maps responses and failures into the stable error taxonomy.
//!
//! The dispatcher owns no long-lived entity; every collaborator sits behind a
//! trait. The "already running" check and the subsequent remote submission
//! are not atomic across the whole system (remote coordination ownership is
//! out of scope), so that window is documented rather than closed here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::dispatch::boundaries::{
    ExecutionFilter, ExecutionStore, LogChunk, LogQuery, MasterServerLocator, ProjectAuthorizer,
    ProjectRepository, WorkflowDefinition, WorkflowService,
};
use crate::dispatch::rpc::{ExecInfo, MasterRpc, RpcResult, ScheduleInfo};
use crate::error::{CoreError, Result};
use crate::models::{
    ExecType, ExecutionFlow, ExecutionNode, FailurePolicy, MasterServer, NodeDepType, NotifyType,
    Project, User,
};

/// User execution intent for one submission.
#[derive(Debug, Clone, Default)]
pub struct ExecRequest {
    /// Serialized schedule descriptor, required for backfill submissions.
    pub schedule: Option<String>,
    /// Optional single target node (direct mode only).
    pub node_name: Option<String>,
    pub node_dep: Option<NodeDepType>,
    pub notify_type: Option<NotifyType>,
    /// Serialized JSON recipient list.
    pub notify_mails: Option<String>,
    /// Timeout in seconds, forwarded verbatim.
    pub timeout: i32,
    pub failure_policy: Option<FailurePolicy>,
}

/// One page of windowed execution history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPage {
    pub total: i64,
    pub from: usize,
    pub flows: Vec<ExecutionFlow>,
}

/// A flow's reported view with its node records merged in by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionFlowDetail {
    pub flow: ExecutionFlow,
    pub nodes: Vec<ExecutionNode>,
}

impl ExecutionFlowDetail {
    pub fn node(&self, name: &str) -> Option<&ExecutionNode> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

pub struct ExecutionDispatcher {
    store: Arc<dyn ExecutionStore>,
    projects: Arc<dyn ProjectRepository>,
    auth: Arc<dyn ProjectAuthorizer>,
    master_locator: Arc<dyn MasterServerLocator>,
    rpc: Arc<dyn MasterRpc>,
    workflows: Arc<dyn WorkflowService>,
    logs: Arc<dyn LogQuery>,
}

impl ExecutionDispatcher {
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        projects: Arc<dyn ProjectRepository>,
        auth: Arc<dyn ProjectAuthorizer>,
        master_locator: Arc<dyn MasterServerLocator>,
        rpc: Arc<dyn MasterRpc>,
        workflows: Arc<dyn WorkflowService>,
        logs: Arc<dyn LogQuery>,
    ) -> Self {
        Self {
            store,
            projects,
            auth,
            master_locator,
            rpc,
            workflows,
            logs,
        }
    }

    /// Submit one execution of a published workflow.
    ///
    /// Enforces the at-most-one-running-instance invariant before the remote
    /// call: the remote coordinator is not trusted to serialize submissions
    /// itself. Returns the execution ids reported by the master.
    pub async fn submit(
        &self,
        operator: &User,
        project_name: &str,
        flow_name: &str,
        exec_type: ExecType,
        request: ExecRequest,
    ) -> Result<Vec<i64>> {
        let project = self.require_project(project_name).await?;

        if !self.auth.has_write_perm(operator.id, &project).await? {
            error!(user = %operator.name, project = %project.name, "No write permission");
            return Err(CoreError::permission(&operator.name, &project.name, "write"));
        }

        let flow = self
            .projects
            .flow_by_name(project.id, flow_name)
            .await?
            .ok_or_else(|| {
                error!(flow = %flow_name, project = %project.name, "Workflow not found");
                CoreError::not_found("workflow", flow_name)
            })?;

        // Authoritative already-running check; a repeated submission while a
        // run is non-terminal is rejected regardless of the requested target.
        if let Some(latest) = self.store.latest_flow(flow.id).await? {
            if !latest.status.is_terminal() {
                error!(flow = %flow.name, exec_id = latest.exec_id, "Workflow is already running");
                return Err(CoreError::precondition(format!(
                    "The workflow \"{}\" is already running",
                    flow.name
                )));
            }
        }

        let master = self.require_master().await?;

        let notify_mails = parse_notify_mails(request.notify_mails.as_deref())?;
        let submit_time_ms = Utc::now().timestamp_millis();

        info!(
            project_id = project.id,
            flow_id = flow.id,
            host = %master.host,
            port = master.port,
            exec_type = %exec_type,
            "Calling master to execute workflow"
        );

        let ret = match exec_type {
            ExecType::Direct => {
                let exec_info = ExecInfo {
                    node_name: request.node_name.clone(),
                    node_dep: request.node_dep.unwrap_or_default().ordinal(),
                    notify_type: request.notify_type.unwrap_or_default().ordinal(),
                    notify_mails,
                    timeout: request.timeout,
                    failure_policy: request.failure_policy.unwrap_or_default().ordinal(),
                };
                self.rpc
                    .execute_flow(&master, project.id, flow.id, submit_time_ms, exec_info)
                    .await?
            }
            ExecType::ComplementData => {
                let raw = request.schedule.as_deref().unwrap_or_default();
                let schedule: ScheduleInfo = serde_json::from_str(raw).map_err(|err| {
                    error!(error = %err, "Schedule info deserialization failed");
                    CoreError::parameter("schedule info", raw)
                })?;
                let exec_info = ExecInfo {
                    node_name: None,
                    node_dep: 0,
                    notify_type: request.notify_type.unwrap_or_default().ordinal(),
                    notify_mails,
                    timeout: request.timeout,
                    failure_policy: request.failure_policy.unwrap_or_default().ordinal(),
                };
                self.rpc
                    .append_workflow(&master, project.id, flow.id, schedule, exec_info)
                    .await?
            }
        };

        self.check_rpc_result(ret, &project, flow.id, &master)
    }

    /// Direct single-workflow convenience path: create an ephemeral
    /// single-use workflow from inline source, then submit it.
    pub async fn run_direct(
        &self,
        operator: &User,
        project_name: &str,
        flow_name: &str,
        definition: WorkflowDefinition,
        request: ExecRequest,
    ) -> Result<i64> {
        info!(project = %project_name, flow = %flow_name, "step1. create ephemeral workflow");
        let created = self
            .workflows
            .create_workflow(operator, project_name, flow_name, definition)
            .await?;
        if created.is_none() {
            return Err(CoreError::server("project workflow create returned nothing"));
        }

        info!(project = %project_name, flow = %flow_name, "step2. execute ephemeral workflow");
        let exec_ids = self
            .submit(operator, project_name, flow_name, ExecType::Direct, request)
            .await?;

        exec_ids
            .first()
            .copied()
            .ok_or_else(|| CoreError::server("project workflow exec returned no execution id"))
    }

    /// Cancel a running execution through the master.
    ///
    /// A falsy or failed RPC result is a server error naming the target
    /// host/port; a cancellation that fails for server reasons is never
    /// reported as success.
    pub async fn cancel(&self, operator: &User, exec_id: i64) -> Result<()> {
        let flow = self.require_execution(exec_id).await?;
        let project = self.require_project(&flow.project_name).await?;
        self.require_exec_perm(operator, &project).await?;

        let master = self.require_master().await?;

        info!(
            project_id = project.id,
            exec_id,
            host = %master.host,
            port = master.port,
            "Calling master to cancel execution"
        );

        if !self.rpc.cancel_exec_flow(&master, exec_id).await? {
            error!(exec_id, host = %master.host, port = master.port, "Master cancel returned false");
            return Err(CoreError::server(format!(
                "Call master cancel workflow failed, project id: {}, exec id: {}, host: {}, port: {}",
                project.id, exec_id, master.host, master.port
            )));
        }
        Ok(())
    }

    /// Windowed execution history for a project.
    ///
    /// `flow_names` and `statuses` arrive in their serialized JSON-list form;
    /// parse failures are parameter errors.
    pub async fn list_executions(
        &self,
        operator: &User,
        project_name: &str,
        flow_names: Option<&str>,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
        statuses: Option<&str>,
        from: usize,
        size: usize,
    ) -> Result<ExecutionPage> {
        let flow_names: Vec<String> = match flow_names.filter(|s| !s.is_empty()) {
            Some(raw) => serde_json::from_str(raw)
                .map_err(|_| CoreError::parameter("workflow name list", raw))?,
            None => Vec::new(),
        };
        let statuses = match statuses.filter(|s| !s.is_empty()) {
            Some(raw) => serde_json::from_str(raw)
                .map_err(|_| CoreError::parameter("flow status list", raw))?,
            None => Vec::new(),
        };

        let project = self.require_project(project_name).await?;
        self.require_exec_perm(operator, &project).await?;

        let filter = ExecutionFilter {
            project_name: project.name.clone(),
            flow_names,
            start_date,
            end_date,
            statuses,
            from,
            size,
        };
        let flows = self.store.select_by_window(&filter).await?;
        let total = self.store.sum_by_window(&filter).await?;
        Ok(ExecutionPage { total, from, flows })
    }

    /// Detail view of one execution, with node records merged in by name.
    pub async fn get_execution(&self, operator: &User, exec_id: i64) -> Result<ExecutionFlowDetail> {
        let flow = self.require_execution(exec_id).await?;
        let project = self.require_project(&flow.project_name).await?;
        self.require_exec_perm(operator, &project).await?;

        let nodes = self.store.nodes_by_exec_id(exec_id).await?;
        Ok(ExecutionFlowDetail { flow, nodes })
    }

    /// Tail the captured output of one job attempt.
    pub async fn get_log(
        &self,
        operator: &User,
        job_id: &str,
        from: usize,
        size: usize,
        query: &str,
    ) -> Result<LogChunk> {
        let node = self
            .store
            .node_by_job_id(job_id)
            .await?
            .ok_or_else(|| CoreError::not_found("job", job_id))?;
        let flow = self.require_execution(node.exec_id).await?;
        let project = self.require_project(&flow.project_name).await?;
        self.require_exec_perm(operator, &project).await?;

        self.logs.tail(job_id, from, size, query).await
    }

    async fn require_project(&self, name: &str) -> Result<Project> {
        self.projects.project_by_name(name).await?.ok_or_else(|| {
            error!(project = %name, "Project not found");
            CoreError::not_found("project", name)
        })
    }

    async fn require_execution(&self, exec_id: i64) -> Result<ExecutionFlow> {
        self.store.flow_by_exec_id(exec_id).await?.ok_or_else(|| {
            error!(exec_id, "Execution not found");
            CoreError::not_found("execution", exec_id.to_string())
        })
    }

    async fn require_master(&self) -> Result<MasterServer> {
        match self.master_locator.active_master().await? {
            Some(master) => Ok(master),
            None => {
                error!("Master server does not exist");
                Err(CoreError::server("master server does not exist"))
            }
        }
    }

    async fn require_exec_perm(&self, operator: &User, project: &Project) -> Result<()> {
        if !self.auth.has_exec_perm(operator.id, project).await? {
            error!(user = %operator.name, project = %project.name, "No exec permission");
            return Err(CoreError::permission(&operator.name, &project.name, "exec"));
        }
        Ok(())
    }

    fn check_rpc_result(
        &self,
        ret: Option<RpcResult>,
        project: &Project,
        flow_id: i32,
        master: &MasterServer,
    ) -> Result<Vec<i64>> {
        match ret {
            Some(ret) if ret.status == 0 => Ok(ret.exec_ids),
            _ => {
                error!(
                    project_id = project.id,
                    flow_id,
                    host = %master.host,
                    port = master.port,
                    "Master returned an error for workflow submission"
                );
                Err(CoreError::server(format!(
                    "Call master exec workflow failed, project id: {}, flow id: {}, host: {}, port: {}",
                    project.id, flow_id, master.host, master.port
                )))
            }
        }
    }
}

/// Deserialize the recipient list; `None` means no recipients, malformed
/// input is a parameter error.
fn parse_notify_mails(raw: Option<&str>) -> Result<Vec<String>> {
    match raw.filter(|s| !s.is_empty()) {
        Some(raw) => {
            serde_json::from_str(raw).map_err(|err| {
                error!(error = %err, "Notify mail list deserialization failed");
                CoreError::parameter("notify mails", raw)
            })
        }
        None => Ok(Vec::new()),
    }
}
