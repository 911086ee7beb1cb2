//! Crate-wide error taxonomy.
//!
//! Every externally observable failure surfaces as a [`CoreError`] with enough
//! structure (ids, host, port) to reconstruct the failing call. The only
//! failures not propagated are the explicitly best-effort kill-signal paths in
//! the process supervisor, which log and fall through.

use thiserror::Error;

/// Typed errors for the dispatch and execution core.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Not found {kind} \"{name}\"")]
    NotFound { kind: String, name: String },

    #[error("User \"{user}\" has no {perm} permission for project \"{project}\"")]
    Permission {
        user: String,
        project: String,
        perm: String,
    },

    #[error("Parameter {what} \"{value}\" not valid")]
    Parameter { what: String, value: String },

    #[error("Precondition failed: {message}")]
    Precondition { message: String },

    #[error("Server error: {message}")]
    Server { message: String },

    #[error("Process error. Exit code is {exit_code}")]
    Execution { exit_code: i32 },

    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl CoreError {
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn permission(
        user: impl Into<String>,
        project: impl Into<String>,
        perm: impl Into<String>,
    ) -> Self {
        Self::Permission {
            user: user.into(),
            project: project.into(),
            perm: perm.into(),
        }
    }

    pub fn parameter(what: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Parameter {
            what: what.into(),
            value: value.into(),
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    pub fn execution(exit_code: i32) -> Self {
        Self::Execution { exit_code }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Malformed embedded JSON payloads are parameter errors, never crashes.
impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::parameter("json", err.to_string())
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
