//! One record per DAG node within an [`ExecutionFlow`](super::ExecutionFlow).
//! Lifecycle mirrors the flow but is scoped to a single node; the dispatcher
//! merges node records into the flow's reported view by matching node name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state_machine::FlowStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionNode {
    /// Owning execution id.
    pub exec_id: i64,
    pub name: String,
    /// Names of the nodes this one depends on.
    pub deps: Vec<String>,
    pub status: FlowStatus,
    /// Attempts made so far, compared against the flow's max_try_times.
    pub attempt: i32,
    /// Maps 1:1 to a JobExecutionContext while the node is running.
    pub job_id: Option<String>,
    pub log_ref: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl ExecutionNode {
    pub fn new(exec_id: i64, name: impl Into<String>, deps: Vec<String>) -> Self {
        Self {
            exec_id,
            name: name.into(),
            deps,
            status: FlowStatus::Init,
            attempt: 0,
            job_id: None,
            log_ref: None,
            start_time: None,
            end_time: None,
        }
    }

    /// Same derivation rule as the flow: whole seconds, absent until both
    /// timestamps exist.
    pub fn duration(&self) -> Option<i64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_seconds()),
            _ => None,
        }
    }
}
