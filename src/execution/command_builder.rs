//! The process-execution boundary.
//!
//! Each job-type variant exposes a single capability: produce a command
//! vector (or nothing) for the current context. A builder that yields `None`
//! marks the job trivially successful with no process spawned.

use crate::error::Result;
use crate::execution::context::JobExecutionContext;

pub trait CommandBuilder: Send + Sync {
    fn build_command(&self, context: &JobExecutionContext) -> Result<Option<Vec<String>>>;
}

/// Runs the context's argument vector through the configured shell.
#[derive(Debug, Default)]
pub struct ShellCommandBuilder;

impl CommandBuilder for ShellCommandBuilder {
    fn build_command(&self, context: &JobExecutionContext) -> Result<Option<Vec<String>>> {
        if context.command().is_empty() {
            Ok(None)
        } else {
            Ok(Some(context.command().to_vec()))
        }
    }
}

/// Always yields no command. Useful for virtual nodes and tests.
#[derive(Debug, Default)]
pub struct NoOpCommandBuilder;

impl CommandBuilder for NoOpCommandBuilder {
    fn build_command(&self, _context: &JobExecutionContext) -> Result<Option<Vec<String>>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_builder_forwards_args() {
        let ctx = JobExecutionContext::new("j", "/tmp")
            .with_command(vec!["echo".to_string(), "hi".to_string()]);
        let cmd = ShellCommandBuilder.build_command(&ctx).unwrap();
        assert_eq!(cmd, Some(vec!["echo".to_string(), "hi".to_string()]));
    }

    #[test]
    fn test_empty_args_mean_no_command() {
        let ctx = JobExecutionContext::new("j", "/tmp");
        assert_eq!(ShellCommandBuilder.build_command(&ctx).unwrap(), None);
        assert_eq!(NoOpCommandBuilder.build_command(&ctx).unwrap(), None);
    }
}
