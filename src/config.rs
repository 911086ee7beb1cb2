use crate::error::{CoreError, Result};

/// Process-supervision settings.
///
/// These were static class-level constants in earlier designs; they are
/// explicit injected values here so a bad environment surfaces as a
/// recoverable [`CoreError::Configuration`] instead of aborting startup.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// How long a graceful termination may take before the forceful path runs.
    pub kill_grace_ms: u64,
    /// Privilege-delegation command used to run jobs (and kills) as a proxy user.
    pub delegate_command: String,
    /// Shell used to wrap raw command vectors and generated scripts.
    pub shell: String,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            kill_grace_ms: 5000,
            delegate_command: "sudo".to_string(),
            shell: "sh".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    pub process: ProcessConfig,
}

impl CoreConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(grace) = std::env::var("DAGFLOW_KILL_GRACE_MS") {
            config.process.kill_grace_ms = grace.parse().map_err(|e| {
                CoreError::configuration(format!("Invalid kill_grace_ms: {e}"))
            })?;
        }

        if let Ok(delegate) = std::env::var("DAGFLOW_DELEGATE_COMMAND") {
            config.process.delegate_command = delegate;
        }

        if let Ok(shell) = std::env::var("DAGFLOW_SHELL") {
            config.process.shell = shell;
        }

        Ok(config)
    }
}
