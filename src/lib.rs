//! # dagflow-core
//!
//! Core engine for a distributed DAG workflow execution platform: the
//! job-process lifecycle engine and the master-dispatch coordination layer.
//!
//! ## Overview
//!
//! Users submit DAG-structured workflows against projects; a master
//! coordinates execution and dispatches work to executor hosts, which spawn
//! and supervise OS processes for individual job nodes. This crate carries
//! the two pieces with real systems-engineering risk:
//!
//! - process supervision: spawn, output capture, graceful-then-forceful
//!   termination, privilege delegation ([`execution`]);
//! - distributed state transitions: at-most-one-running-instance
//!   enforcement, retry/timeout/failure-policy semantics, RPC status
//!   propagation ([`state_machine`], [`dispatch`]).
//!
//! Persistence, the web request layer, workflow authoring, notification
//! delivery, and log storage are external collaborators reached through the
//! traits in [`dispatch`].
//!
//! ## Module Organization
//!
//! - [`models`] - execution records and collaborator entities
//! - [`state_machine`] - flow status and per-run state tracking
//! - [`execution`] - job context, command building, process supervision
//! - [`dispatch`] - boundary traits, master RPC contract, dispatcher
//! - [`config`] - injected runtime configuration
//! - [`error`] - typed error taxonomy
//! - [`logging`] - structured tracing setup

pub mod config;
pub mod dispatch;
pub mod error;
pub mod execution;
pub mod logging;
pub mod models;
pub mod state_machine;

pub use config::{CoreConfig, ProcessConfig};
pub use dispatch::{ExecRequest, ExecutionDispatcher, MasterRpc};
pub use error::{CoreError, Result};
pub use execution::{JobExecutionContext, ProcessSupervisor};
pub use models::{ExecutionFlow, ExecutionNode, MasterServer};
pub use state_machine::{ExecutionFlowStateMachine, FlowStatus};
