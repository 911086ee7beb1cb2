//! Dispatcher integration tests over in-memory collaborator fakes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use dagflow_core::dispatch::{
    ExecRequest, ExecutionDispatcher, ExecutionFilter, ExecutionStore, LogChunk, LogQuery,
    MasterRpc, MasterServerLocator, ProjectAuthorizer, ProjectRepository, RpcResult, ScheduleInfo,
    WorkflowDefinition, WorkflowService,
};
use dagflow_core::dispatch::rpc::ExecInfo;
use dagflow_core::error::{CoreError, Result};
use dagflow_core::models::{
    ExecType, ExecutionFlow, ExecutionNode, MasterServer, Project, ProjectFlow, User,
};
use dagflow_core::state_machine::FlowStatus;

#[derive(Default)]
struct FakeStore {
    flows: Mutex<Vec<ExecutionFlow>>,
    nodes: Mutex<Vec<ExecutionNode>>,
}

#[async_trait]
impl ExecutionStore for FakeStore {
    async fn insert_flow(&self, flow: &ExecutionFlow) -> Result<()> {
        self.flows.lock().push(flow.clone());
        Ok(())
    }

    async fn flow_by_exec_id(&self, exec_id: i64) -> Result<Option<ExecutionFlow>> {
        Ok(self
            .flows
            .lock()
            .iter()
            .find(|f| f.exec_id == exec_id)
            .cloned())
    }

    async fn latest_flow(&self, flow_id: i32) -> Result<Option<ExecutionFlow>> {
        Ok(self
            .flows
            .lock()
            .iter()
            .filter(|f| f.flow_id == flow_id)
            .max_by_key(|f| f.exec_id)
            .cloned())
    }

    async fn select_by_window(&self, filter: &ExecutionFilter) -> Result<Vec<ExecutionFlow>> {
        Ok(self
            .flows
            .lock()
            .iter()
            .filter(|f| f.project_name == filter.project_name)
            .filter(|f| filter.flow_names.is_empty() || filter.flow_names.contains(&f.flow_name))
            .filter(|f| filter.statuses.is_empty() || filter.statuses.contains(&f.status))
            .skip(filter.from)
            .take(filter.size)
            .cloned()
            .collect())
    }

    async fn sum_by_window(&self, filter: &ExecutionFilter) -> Result<i64> {
        Ok(self
            .flows
            .lock()
            .iter()
            .filter(|f| f.project_name == filter.project_name)
            .filter(|f| filter.flow_names.is_empty() || filter.flow_names.contains(&f.flow_name))
            .filter(|f| filter.statuses.is_empty() || filter.statuses.contains(&f.status))
            .count() as i64)
    }

    async fn nodes_by_exec_id(&self, exec_id: i64) -> Result<Vec<ExecutionNode>> {
        Ok(self
            .nodes
            .lock()
            .iter()
            .filter(|n| n.exec_id == exec_id)
            .cloned()
            .collect())
    }

    async fn node_by_job_id(&self, job_id: &str) -> Result<Option<ExecutionNode>> {
        Ok(self
            .nodes
            .lock()
            .iter()
            .find(|n| n.job_id.as_deref() == Some(job_id))
            .cloned())
    }
}

struct FakeProjects {
    projects: Vec<Project>,
    flows: Vec<ProjectFlow>,
}

#[async_trait]
impl ProjectRepository for FakeProjects {
    async fn project_by_name(&self, name: &str) -> Result<Option<Project>> {
        Ok(self.projects.iter().find(|p| p.name == name).cloned())
    }

    async fn flow_by_name(&self, project_id: i32, name: &str) -> Result<Option<ProjectFlow>> {
        Ok(self
            .flows
            .iter()
            .find(|f| f.project_id == project_id && f.name == name)
            .cloned())
    }
}

struct FakeAuth {
    write: AtomicBool,
    exec: AtomicBool,
}

impl Default for FakeAuth {
    fn default() -> Self {
        Self {
            write: AtomicBool::new(true),
            exec: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl ProjectAuthorizer for FakeAuth {
    async fn has_write_perm(&self, _user_id: i32, _project: &Project) -> Result<bool> {
        Ok(self.write.load(Ordering::SeqCst))
    }

    async fn has_read_perm(&self, _user_id: i32, _project: &Project) -> Result<bool> {
        Ok(true)
    }

    async fn has_exec_perm(&self, _user_id: i32, _project: &Project) -> Result<bool> {
        Ok(self.exec.load(Ordering::SeqCst))
    }
}

struct FakeLocator {
    master: Mutex<Option<MasterServer>>,
}

#[async_trait]
impl MasterServerLocator for FakeLocator {
    async fn active_master(&self) -> Result<Option<MasterServer>> {
        Ok(self.master.lock().clone())
    }
}

struct FakeRpc {
    result: Mutex<Option<RpcResult>>,
    cancel_result: Mutex<bool>,
    exec_calls: Mutex<Vec<ExecInfo>>,
    append_calls: Mutex<Vec<(ScheduleInfo, ExecInfo)>>,
}

impl Default for FakeRpc {
    fn default() -> Self {
        Self {
            result: Mutex::new(Some(RpcResult {
                status: 0,
                exec_ids: vec![1001],
            })),
            cancel_result: Mutex::new(true),
            exec_calls: Mutex::new(Vec::new()),
            append_calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MasterRpc for FakeRpc {
    async fn execute_flow(
        &self,
        _master: &MasterServer,
        _project_id: i32,
        _flow_id: i32,
        _submit_time_ms: i64,
        exec_info: ExecInfo,
    ) -> Result<Option<RpcResult>> {
        self.exec_calls.lock().push(exec_info);
        Ok(self.result.lock().clone())
    }

    async fn append_workflow(
        &self,
        _master: &MasterServer,
        _project_id: i32,
        _flow_id: i32,
        schedule: ScheduleInfo,
        exec_info: ExecInfo,
    ) -> Result<Option<RpcResult>> {
        self.append_calls.lock().push((schedule, exec_info));
        Ok(self.result.lock().clone())
    }

    async fn cancel_exec_flow(&self, _master: &MasterServer, _exec_id: i64) -> Result<bool> {
        Ok(*self.cancel_result.lock())
    }
}

struct FakeWorkflows {
    create_result: Mutex<Option<ProjectFlow>>,
}

#[async_trait]
impl WorkflowService for FakeWorkflows {
    async fn create_workflow(
        &self,
        _operator: &User,
        _project_name: &str,
        _flow_name: &str,
        _definition: WorkflowDefinition,
    ) -> Result<Option<ProjectFlow>> {
        Ok(self.create_result.lock().clone())
    }
}

struct FakeLogs;

#[async_trait]
impl LogQuery for FakeLogs {
    async fn tail(&self, job_id: &str, from: usize, _size: usize, _query: &str) -> Result<LogChunk> {
        Ok(LogChunk {
            job_id: job_id.to_string(),
            offset: from,
            total: 2,
            lines: vec!["line one".to_string(), "line two".to_string()],
        })
    }
}

/// One project "p1" with workflow "etl-daily", all permissions granted, one
/// active master, a master that accepts everything.
struct Env {
    store: Arc<FakeStore>,
    auth: Arc<FakeAuth>,
    locator: Arc<FakeLocator>,
    rpc: Arc<FakeRpc>,
    workflows: Arc<FakeWorkflows>,
    dispatcher: ExecutionDispatcher,
}

fn env() -> Env {
    let store = Arc::new(FakeStore::default());
    let projects = Arc::new(FakeProjects {
        projects: vec![Project {
            id: 7,
            name: "p1".to_string(),
            owner: Some("alice".to_string()),
        }],
        flows: vec![ProjectFlow {
            id: 10,
            name: "etl-daily".to_string(),
            project_id: 7,
            proxy_user: None,
            queue: None,
        }],
    });
    let auth = Arc::new(FakeAuth::default());
    let locator = Arc::new(FakeLocator {
        master: Mutex::new(Some(MasterServer {
            host: "9.9.9.9".to_string(),
            port: 9870,
        })),
    });
    let rpc = Arc::new(FakeRpc::default());
    let workflows = Arc::new(FakeWorkflows {
        create_result: Mutex::new(Some(ProjectFlow {
            id: 11,
            name: "adhoc".to_string(),
            project_id: 7,
            proxy_user: None,
            queue: None,
        })),
    });
    let dispatcher = ExecutionDispatcher::new(
        Arc::clone(&store) as Arc<dyn ExecutionStore>,
        Arc::clone(&projects) as Arc<dyn ProjectRepository>,
        Arc::clone(&auth) as Arc<dyn ProjectAuthorizer>,
        Arc::clone(&locator) as Arc<dyn MasterServerLocator>,
        Arc::clone(&rpc) as Arc<dyn MasterRpc>,
        Arc::clone(&workflows) as Arc<dyn WorkflowService>,
        Arc::new(FakeLogs) as Arc<dyn LogQuery>,
    );
    Env {
        store,
        auth,
        locator,
        rpc,
        workflows,
        dispatcher,
    }
}

fn alice() -> User {
    User::new(42, "alice")
}

fn stored_flow(exec_id: i64, status: FlowStatus) -> ExecutionFlow {
    let mut flow = ExecutionFlow::new(exec_id, 10, "etl-daily", 7, "p1", 42, "alice", ExecType::Direct);
    flow.status = status;
    flow
}

#[tokio::test]
async fn first_submission_returns_exec_ids() {
    let env = env();
    let exec_ids = env
        .dispatcher
        .submit(
            &alice(),
            "p1",
            "etl-daily",
            ExecType::Direct,
            ExecRequest {
                timeout: 600,
                ..ExecRequest::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(exec_ids, vec![1001]);
    let calls = env.rpc.exec_calls.lock();
    assert_eq!(calls.len(), 1);
    // Unset enum options travel as their ordinal-zero defaults.
    assert_eq!(calls[0].node_dep, 0);
    assert_eq!(calls[0].notify_type, 0);
    assert_eq!(calls[0].failure_policy, 0);
    assert_eq!(calls[0].timeout, 600);
    assert!(calls[0].notify_mails.is_empty());
}

#[tokio::test]
async fn resubmission_while_running_is_rejected_before_any_rpc() {
    let env = env();
    env.store
        .insert_flow(&stored_flow(900, FlowStatus::Running))
        .await
        .unwrap();

    let err = env
        .dispatcher
        .submit(&alice(), "p1", "etl-daily", ExecType::Direct, ExecRequest::default())
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Precondition { .. }));
    assert!(err.to_string().contains("etl-daily"));
    assert!(env.rpc.exec_calls.lock().is_empty());
}

#[tokio::test]
async fn resubmission_after_terminal_run_is_allowed() {
    let env = env();
    env.store
        .insert_flow(&stored_flow(900, FlowStatus::Failed))
        .await
        .unwrap();

    let exec_ids = env
        .dispatcher
        .submit(&alice(), "p1", "etl-daily", ExecType::Direct, ExecRequest::default())
        .await
        .unwrap();
    assert_eq!(exec_ids, vec![1001]);
}

#[tokio::test]
async fn unknown_project_is_not_found() {
    let env = env();
    let err = env
        .dispatcher
        .submit(&alice(), "nope", "etl-daily", ExecType::Direct, ExecRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn unknown_workflow_is_not_found() {
    let env = env();
    let err = env
        .dispatcher
        .submit(&alice(), "p1", "nope", ExecType::Direct, ExecRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn missing_write_permission_is_rejected() {
    let env = env();
    env.auth.write.store(false, Ordering::SeqCst);

    let err = env
        .dispatcher
        .submit(&alice(), "p1", "etl-daily", ExecType::Direct, ExecRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Permission { .. }));
    assert!(env.rpc.exec_calls.lock().is_empty());
}

#[tokio::test]
async fn absent_master_is_a_server_error() {
    let env = env();
    *env.locator.master.lock() = None;

    let err = env
        .dispatcher
        .submit(&alice(), "p1", "etl-daily", ExecType::Direct, ExecRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Server { .. }));
}

#[tokio::test]
async fn malformed_notify_mails_is_a_parameter_error() {
    let env = env();
    let err = env
        .dispatcher
        .submit(
            &alice(),
            "p1",
            "etl-daily",
            ExecType::Direct,
            ExecRequest {
                notify_mails: Some("ops@example.com".to_string()),
                ..ExecRequest::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Parameter { .. }));
}

#[tokio::test]
async fn backfill_requires_a_parseable_schedule() {
    let env = env();
    let err = env
        .dispatcher
        .submit(
            &alice(),
            "p1",
            "etl-daily",
            ExecType::ComplementData,
            ExecRequest::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Parameter { .. }));
    assert!(env.rpc.append_calls.lock().is_empty());
}

#[tokio::test]
async fn backfill_forwards_the_schedule_window() {
    let env = env();
    let exec_ids = env
        .dispatcher
        .submit(
            &alice(),
            "p1",
            "etl-daily",
            ExecType::ComplementData,
            ExecRequest {
                schedule: Some(
                    r#"{"startDate":"2024-03-01T00:00:00Z","endDate":"2024-03-07T00:00:00Z"}"#
                        .to_string(),
                ),
                ..ExecRequest::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(exec_ids, vec![1001]);
    let calls = env.rpc.append_calls.lock();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].0.start_date < calls[0].0.end_date);
    // Direct-mode-only fields never leak into a backfill submission.
    assert!(calls[0].1.node_name.is_none());
}

#[tokio::test]
async fn nonzero_rpc_status_is_a_server_error() {
    let env = env();
    *env.rpc.result.lock() = Some(RpcResult {
        status: 1,
        exec_ids: Vec::new(),
    });

    let err = env
        .dispatcher
        .submit(&alice(), "p1", "etl-daily", ExecType::Direct, ExecRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Server { .. }));
    assert!(err.to_string().contains("9.9.9.9"));
}

#[tokio::test]
async fn missing_rpc_response_is_a_server_error() {
    let env = env();
    *env.rpc.result.lock() = None;

    let err = env
        .dispatcher
        .submit(&alice(), "p1", "etl-daily", ExecType::Direct, ExecRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Server { .. }));
}

#[tokio::test]
async fn run_direct_creates_then_submits() {
    let env = env();
    // The ephemeral workflow must be resolvable by the submit step.
    let exec_id = env
        .dispatcher
        .run_direct(
            &alice(),
            "p1",
            "etl-daily",
            WorkflowDefinition {
                data: "{}".to_string(),
                ..WorkflowDefinition::default()
            },
            ExecRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(exec_id, 1001);
    assert_eq!(env.rpc.exec_calls.lock().len(), 1);
}

#[tokio::test]
async fn run_direct_fails_when_create_returns_nothing() {
    let env = env();
    *env.workflows.create_result.lock() = None;

    let err = env
        .dispatcher
        .run_direct(
            &alice(),
            "p1",
            "etl-daily",
            WorkflowDefinition::default(),
            ExecRequest::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Server { .. }));
    assert!(env.rpc.exec_calls.lock().is_empty());
}

#[tokio::test]
async fn run_direct_fails_when_master_returns_no_exec_id() {
    let env = env();
    *env.rpc.result.lock() = Some(RpcResult {
        status: 0,
        exec_ids: Vec::new(),
    });

    let err = env
        .dispatcher
        .run_direct(
            &alice(),
            "p1",
            "etl-daily",
            WorkflowDefinition::default(),
            ExecRequest::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Server { .. }));
}

#[tokio::test]
async fn cancel_happy_path() {
    let env = env();
    env.store
        .insert_flow(&stored_flow(900, FlowStatus::Running))
        .await
        .unwrap();

    env.dispatcher.cancel(&alice(), 900).await.unwrap();
}

#[tokio::test]
async fn cancel_of_unknown_execution_is_not_found() {
    let env = env();
    let err = env.dispatcher.cancel(&alice(), 404).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn falsy_cancel_names_the_master() {
    let env = env();
    env.store
        .insert_flow(&stored_flow(900, FlowStatus::Running))
        .await
        .unwrap();
    *env.rpc.cancel_result.lock() = false;

    let err = env.dispatcher.cancel(&alice(), 900).await.unwrap_err();
    assert!(matches!(err, CoreError::Server { .. }));
    let message = err.to_string();
    assert!(message.contains("900"));
    assert!(message.contains("9.9.9.9"));
    assert!(message.contains("9870"));
}

#[tokio::test]
async fn cancel_requires_exec_permission() {
    let env = env();
    env.store
        .insert_flow(&stored_flow(900, FlowStatus::Running))
        .await
        .unwrap();
    env.auth.exec.store(false, Ordering::SeqCst);

    let err = env.dispatcher.cancel(&alice(), 900).await.unwrap_err();
    assert!(matches!(err, CoreError::Permission { .. }));
}

#[tokio::test]
async fn list_executions_pages_and_counts() {
    let env = env();
    for exec_id in 1..=5 {
        env.store
            .insert_flow(&stored_flow(exec_id, FlowStatus::Success))
            .await
            .unwrap();
    }

    let page = env
        .dispatcher
        .list_executions(
            &alice(),
            "p1",
            Some(r#"["etl-daily"]"#),
            None,
            None,
            Some(r#"["success"]"#),
            1,
            2,
        )
        .await
        .unwrap();

    assert_eq!(page.total, 5);
    assert_eq!(page.from, 1);
    assert_eq!(page.flows.len(), 2);
}

#[tokio::test]
async fn list_executions_rejects_malformed_status_list() {
    let env = env();
    let err = env
        .dispatcher
        .list_executions(&alice(), "p1", None, None, None, Some("running"), 0, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Parameter { .. }));
}

#[tokio::test]
async fn get_execution_merges_node_records() {
    let env = env();
    env.store
        .insert_flow(&stored_flow(900, FlowStatus::Running))
        .await
        .unwrap();
    env.store
        .nodes
        .lock()
        .push(ExecutionNode::new(900, "extract", vec![]));

    let detail = env.dispatcher.get_execution(&alice(), 900).await.unwrap();
    assert_eq!(detail.flow.exec_id, 900);
    assert!(detail.node("extract").is_some());
    assert!(detail.node("load").is_none());
}

#[tokio::test]
async fn get_log_resolves_job_through_its_execution() {
    let env = env();
    env.store
        .insert_flow(&stored_flow(900, FlowStatus::Running))
        .await
        .unwrap();
    let mut node = ExecutionNode::new(900, "extract", vec![]);
    node.job_id = Some("job_abc".to_string());
    env.store.nodes.lock().push(node);

    let chunk = env
        .dispatcher
        .get_log(&alice(), "job_abc", 0, 100, "")
        .await
        .unwrap();
    assert_eq!(chunk.job_id, "job_abc");
    assert_eq!(chunk.lines.len(), 2);
}

#[tokio::test]
async fn get_log_for_unknown_job_is_not_found() {
    let env = env();
    let err = env
        .dispatcher
        .get_log(&alice(), "job_missing", 0, 100, "")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}
