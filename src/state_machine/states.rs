use serde::{Deserialize, Serialize};
use std::fmt;

/// Workflow-run status shared by flows and their nodes.
///
/// `Init` and `Running` are the only non-terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    /// Submitted, not yet picked up.
    #[default]
    Init,
    /// At least one node is executing.
    Running,
    /// All nodes finished successfully.
    Success,
    /// A node exhausted its retries, or the remote system reported failure.
    Failed,
    /// Terminated by a cancel request.
    Killed,
    /// Deactivated without running.
    Inactive,
}

impl FlowStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Init | Self::Running)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Map a status string reported by the remote system.
    ///
    /// An unrecognized status is never silently dropped: it maps to `Failed`
    /// as the fail-safe default, with a warning.
    pub fn from_remote(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "init" => Self::Init,
            "running" => Self::Running,
            "success" => Self::Success,
            "failed" => Self::Failed,
            "kill" | "killed" => Self::Killed,
            "inactive" => Self::Inactive,
            other => {
                tracing::warn!(status = %other, "Unrecognized remote flow status, treating as failed");
                Self::Failed
            }
        }
    }
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Killed => write!(f, "killed"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

impl std::str::FromStr for FlowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Self::Init),
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "killed" => Ok(Self::Killed),
            "inactive" => Ok(Self::Inactive),
            _ => Err(format!("Invalid flow status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_check() {
        assert!(!FlowStatus::Init.is_terminal());
        assert!(!FlowStatus::Running.is_terminal());
        assert!(FlowStatus::Success.is_terminal());
        assert!(FlowStatus::Failed.is_terminal());
        assert!(FlowStatus::Killed.is_terminal());
        assert!(FlowStatus::Inactive.is_terminal());
    }

    #[test]
    fn test_unrecognized_remote_status_maps_to_failed() {
        assert_eq!(FlowStatus::from_remote("exploded"), FlowStatus::Failed);
        assert_eq!(FlowStatus::from_remote(""), FlowStatus::Failed);
        // Never an unmapped default-success.
        assert_ne!(FlowStatus::from_remote("whatever"), FlowStatus::Success);
    }

    #[test]
    fn test_remote_status_known_names() {
        assert_eq!(FlowStatus::from_remote("SUCCESS"), FlowStatus::Success);
        assert_eq!(FlowStatus::from_remote("kill"), FlowStatus::Killed);
        assert_eq!(FlowStatus::from_remote("running"), FlowStatus::Running);
    }

    #[test]
    fn test_string_conversion() {
        assert_eq!(FlowStatus::Running.to_string(), "running");
        assert_eq!("killed".parse::<FlowStatus>().unwrap(), FlowStatus::Killed);
        assert!("pending".parse::<FlowStatus>().is_err());
    }

    #[test]
    fn test_serde() {
        let json = serde_json::to_string(&FlowStatus::Inactive).unwrap();
        assert_eq!(json, "\"inactive\"");
        let parsed: FlowStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, FlowStatus::Inactive);
    }
}
