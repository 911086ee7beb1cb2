//! In-memory state machine for one workflow run.
//!
//! Tracks the run's status, per-node retry counts, timeout, and failure
//! policy across its constituent node executions. Transition triggers arrive
//! asynchronously from node-level reports; all terminal applications are
//! idempotent. Entity mutation is handed to the external store after the
//! in-memory computation completes, so nothing here touches persistence.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use super::events::FlowEvent;
use super::states::FlowStatus;
use crate::error::{CoreError, Result};
use crate::models::{ExecutionFlow, ExecutionNode, FailurePolicy};

pub struct ExecutionFlowStateMachine {
    flow: ExecutionFlow,
    nodes: HashMap<String, ExecutionNode>,
    /// Node names in submission order, for deterministic scheduling output.
    order: Vec<String>,
}

impl ExecutionFlowStateMachine {
    /// Build the machine from the flow record and its DAG node definitions
    /// (name plus dependency names).
    pub fn new(flow: ExecutionFlow, node_defs: Vec<(String, Vec<String>)>) -> Self {
        let exec_id = flow.exec_id;
        let mut nodes = HashMap::with_capacity(node_defs.len());
        let mut order = Vec::with_capacity(node_defs.len());
        for (name, deps) in node_defs {
            order.push(name.clone());
            nodes.insert(name.clone(), ExecutionNode::new(exec_id, name, deps));
        }
        Self { flow, nodes, order }
    }

    pub fn status(&self) -> FlowStatus {
        self.flow.status
    }

    pub fn flow(&self) -> &ExecutionFlow {
        &self.flow
    }

    pub fn node(&self, name: &str) -> Option<&ExecutionNode> {
        self.nodes.get(name)
    }

    /// Apply one transition trigger.
    pub fn transition(&mut self, event: FlowEvent) -> Result<FlowStatus> {
        match event {
            FlowEvent::Start => self.start()?,
            FlowEvent::NodeStarted(name) => self.node_started(&name)?,
            FlowEvent::NodeSucceeded(name) => self.node_finished(&name, true)?,
            FlowEvent::NodeFailed(name) => self.node_finished(&name, false)?,
            FlowEvent::Kill => self.apply_terminal(FlowStatus::Killed),
        }
        Ok(self.flow.status)
    }

    /// Init → Running, recording the start timestamp.
    pub fn start(&mut self) -> Result<()> {
        if self.flow.status != FlowStatus::Init {
            return Err(CoreError::invalid_state(format!(
                "cannot start flow {} from status {}",
                self.flow.exec_id, self.flow.status
            )));
        }
        self.flow.status = FlowStatus::Running;
        self.flow.start_time = Some(Utc::now());
        info!(exec_id = self.flow.exec_id, flow = %self.flow.flow_name, "Flow started");
        Ok(())
    }

    /// Record a dispatched node attempt.
    pub fn node_started(&mut self, name: &str) -> Result<()> {
        if self.flow.status != FlowStatus::Running {
            return Err(CoreError::invalid_state(format!(
                "node \"{name}\" started while flow is {}",
                self.flow.status
            )));
        }
        let node = self.node_mut(name)?;
        node.status = FlowStatus::Running;
        node.attempt += 1;
        if node.start_time.is_none() {
            node.start_time = Some(Utc::now());
        }
        Ok(())
    }

    /// Record a finished node attempt and settle the flow status.
    ///
    /// A failed node is retried until its attempt count reaches the flow's
    /// `max_try_times`; only then is it marked failed. The failure policy
    /// decides whether unstarted siblings keep going.
    pub fn node_finished(&mut self, name: &str, success: bool) -> Result<()> {
        let max_try_times = self.flow.max_try_times;
        let exec_id = self.flow.exec_id;
        let node = self.node_mut(name)?;
        if node.status != FlowStatus::Running {
            return Err(CoreError::invalid_state(format!(
                "node \"{name}\" finished while in status {}",
                node.status
            )));
        }

        if success {
            node.status = FlowStatus::Success;
            node.end_time = Some(Utc::now());
        } else if node.attempt < max_try_times {
            // Back to the queue for another attempt.
            info!(exec_id, node = %name, attempt = node.attempt, "Node failed, retrying");
            node.status = FlowStatus::Init;
        } else {
            warn!(exec_id, node = %name, attempt = node.attempt, "Node retries exhausted");
            node.status = FlowStatus::Failed;
            node.end_time = Some(Utc::now());
            if self.flow.failure_policy == FailurePolicy::End {
                self.skip_unstarted_nodes();
            }
        }

        self.settle();
        Ok(())
    }

    /// Nodes ready to dispatch: not yet started (or queued for retry) with
    /// every dependency finished successfully.
    pub fn runnable_nodes(&self) -> Vec<&ExecutionNode> {
        if self.flow.status != FlowStatus::Running {
            return Vec::new();
        }
        self.order
            .iter()
            .filter_map(|name| self.nodes.get(name))
            .filter(|node| node.status == FlowStatus::Init)
            .filter(|node| {
                node.deps.iter().all(|dep| {
                    self.nodes
                        .get(dep)
                        .map(|d| d.status == FlowStatus::Success)
                        .unwrap_or(false)
                })
            })
            .collect()
    }

    /// Idempotent terminal application: re-applying any terminal status to an
    /// already-terminal flow is a no-op.
    pub fn apply_terminal(&mut self, status: FlowStatus) {
        debug_assert!(status.is_terminal());
        if self.flow.status.is_terminal() {
            return;
        }
        self.flow.status = status;
        self.flow.end_time = Some(Utc::now());
        if status == FlowStatus::Killed {
            for node in self.nodes.values_mut() {
                if !node.status.is_terminal() {
                    node.status = FlowStatus::Killed;
                    node.end_time = Some(Utc::now());
                }
            }
        }
        info!(exec_id = self.flow.exec_id, status = %status, "Flow reached terminal status");
    }

    /// Apply a status string reported by the remote system. Unrecognized
    /// statuses map to `Failed`.
    pub fn apply_remote_status(&mut self, status: &str) {
        match FlowStatus::from_remote(status) {
            FlowStatus::Init => {}
            FlowStatus::Running => {
                if !self.flow.status.is_terminal() && self.flow.status != FlowStatus::Running {
                    self.flow.status = FlowStatus::Running;
                    self.flow.start_time.get_or_insert_with(Utc::now);
                }
            }
            terminal => self.apply_terminal(terminal),
        }
    }

    /// Whether the run exceeded its configured timeout. Zero means no limit.
    pub fn is_timed_out(&self, now: DateTime<Utc>) -> bool {
        if self.flow.timeout <= 0 || self.flow.status != FlowStatus::Running {
            return false;
        }
        match self.flow.start_time {
            Some(start) => (now - start).num_seconds() > i64::from(self.flow.timeout),
            None => false,
        }
    }

    fn node_mut(&mut self, name: &str) -> Result<&mut ExecutionNode> {
        self.nodes
            .get_mut(name)
            .ok_or_else(|| CoreError::not_found("node", name))
    }

    /// Under the End policy, nodes that never started are skipped once any
    /// node fails for good.
    fn skip_unstarted_nodes(&mut self) {
        for node in self.nodes.values_mut() {
            if node.status == FlowStatus::Init && node.attempt == 0 {
                node.status = FlowStatus::Killed;
            }
        }
    }

    /// Derive the flow status once no node remains in flight or schedulable.
    fn settle(&mut self) {
        if self.flow.status.is_terminal() {
            return;
        }
        let any_running = self
            .nodes
            .values()
            .any(|n| n.status == FlowStatus::Running);
        if any_running {
            return;
        }

        let any_failed = self.nodes.values().any(|n| n.status == FlowStatus::Failed);
        let all_settled = self.nodes.values().all(|n| n.status.is_terminal());

        if all_settled {
            if any_failed {
                self.apply_terminal(FlowStatus::Failed);
            } else if self.nodes.values().all(|n| n.status == FlowStatus::Success) {
                self.apply_terminal(FlowStatus::Success);
            } else {
                // Skipped nodes without an outright failure still mean the
                // run did not do its work.
                self.apply_terminal(FlowStatus::Failed);
            }
        } else if any_failed && self.runnable_nodes().is_empty() {
            // Continue policy: every remaining Init node sits behind a failed
            // dependency (directly or transitively) and can never run.
            let blocked_only = self
                .nodes
                .values()
                .filter(|n| n.status == FlowStatus::Init)
                .all(|n| !self.can_ever_succeed(&n.name));
            if blocked_only {
                self.apply_terminal(FlowStatus::Failed);
            }
        }
    }

    /// Whether the node can still reach success given the state of its
    /// dependency chain. A dependency cycle can never resolve, so a node
    /// already on the current path counts as unreachable; this also bounds
    /// the recursion on malformed node definitions.
    fn can_ever_succeed(&self, name: &str) -> bool {
        let mut path = HashSet::new();
        self.can_ever_succeed_inner(name, &mut path)
    }

    fn can_ever_succeed_inner<'a>(&'a self, name: &str, path: &mut HashSet<&'a str>) -> bool {
        match self.nodes.get(name) {
            None => false,
            Some(node) => match node.status {
                FlowStatus::Success => true,
                status if status.is_terminal() => false,
                _ => {
                    if !path.insert(node.name.as_str()) {
                        return false;
                    }
                    let reachable = node
                        .deps
                        .iter()
                        .all(|dep| self.can_ever_succeed_inner(dep, path));
                    path.remove(node.name.as_str());
                    reachable
                }
            },
        }
    }
}
