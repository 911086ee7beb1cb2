//! Master-facing coordination RPC: the observable call/response contract.
//!
//! The wire encoding of the transport is out of scope; implementations wrap
//! whatever client the deployment uses. Enum-valued fields travel as
//! ordinals. Timeouts belong to the transport and are not re-implemented
//! here; calls are synchronous from the dispatcher's viewpoint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::MasterServer;

/// Per-run execution bundle forwarded verbatim to the master.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecInfo {
    /// Optional single target node.
    pub node_name: Option<String>,
    /// Dependency-direction flag, as an ordinal.
    pub node_dep: i32,
    pub notify_type: i32,
    pub notify_mails: Vec<String>,
    /// Timeout in seconds.
    pub timeout: i32,
    pub failure_policy: i32,
}

/// Backfill window descriptor, parsed from its serialized form by the
/// dispatcher. A parse failure is a parameter error, never a crash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInfo {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub crontab: Option<String>,
}

/// Master response for submit-style calls. A non-zero status is always an
/// error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResult {
    pub status: i32,
    pub exec_ids: Vec<i64>,
}

#[async_trait]
pub trait MasterRpc: Send + Sync {
    async fn execute_flow(
        &self,
        master: &MasterServer,
        project_id: i32,
        flow_id: i32,
        submit_time_ms: i64,
        exec_info: ExecInfo,
    ) -> Result<Option<RpcResult>>;

    async fn append_workflow(
        &self,
        master: &MasterServer,
        project_id: i32,
        flow_id: i32,
        schedule: ScheduleInfo,
        exec_info: ExecInfo,
    ) -> Result<Option<RpcResult>>;

    async fn cancel_exec_flow(&self, master: &MasterServer, exec_id: i64) -> Result<bool>;
}
