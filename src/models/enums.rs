//! Execution-request enums shared between the dispatcher and the master RPC.
//!
//! The RPC payload carries these as ordinals, so variant order is part of the
//! wire contract. Notify-type and failure-policy default to their ordinal-zero
//! variant when unset; everything else is forwarded verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a submission was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecType {
    /// Run the workflow now.
    Direct,
    /// Scheduled backfill over a historical window.
    ComplementData,
}

impl fmt::Display for ExecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::ComplementData => write!(f, "complement_data"),
        }
    }
}

impl std::str::FromStr for ExecType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(Self::Direct),
            "complement_data" => Ok(Self::ComplementData),
            _ => Err(format!("Invalid exec type: {s}")),
        }
    }
}

/// When to notify the recipient list about a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyType {
    #[default]
    None,
    Success,
    Failure,
    All,
}

impl NotifyType {
    pub fn ordinal(&self) -> i32 {
        match self {
            Self::None => 0,
            Self::Success => 1,
            Self::Failure => 2,
            Self::All => 3,
        }
    }
}

/// Dependency direction when a single node is targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeDepType {
    #[default]
    NoDep,
    Pre,
    Post,
    PreAndPost,
}

impl NodeDepType {
    pub fn ordinal(&self) -> i32 {
        match self {
            Self::NoDep => 0,
            Self::Pre => 1,
            Self::Post => 2,
            Self::PreAndPost => 3,
        }
    }
}

/// Whether sibling nodes continue after one node's retries are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop scheduling new nodes once any node fails for good.
    #[default]
    End,
    /// Siblings without a failed dependency keep running.
    Continue,
}

impl FailurePolicy {
    pub fn ordinal(&self) -> i32 {
        match self {
            Self::End => 0,
            Self::Continue => 1,
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::End => write!(f, "end"),
            Self::Continue => write!(f, "continue"),
        }
    }
}
