//! Per-attempt job configuration and runtime state.
//!
//! One context exists per job-node execution attempt and is owned exclusively
//! by the [`ProcessSupervisor`](super::ProcessSupervisor) that executes it.
//! Everything here is read-only for the rest of the system; the start time,
//! exit code, and completion flag are recorded only by the owning supervisor.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct JobExecutionContext {
    job_id: String,
    working_dir: PathBuf,
    proxy_user: Option<String>,
    env_file: Option<PathBuf>,
    command: Vec<String>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    exit_code: Option<i32>,
    complete: bool,
}

impl JobExecutionContext {
    pub fn new(job_id: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            job_id: job_id.into(),
            working_dir: working_dir.into(),
            proxy_user: None,
            env_file: None,
            command: Vec::new(),
            start_time: None,
            end_time: None,
            exit_code: None,
            complete: false,
        }
    }

    /// Generate a unique job id for a fresh attempt.
    pub fn generate_job_id() -> String {
        format!("job_{}", Uuid::new_v4().simple())
    }

    pub fn with_proxy_user(mut self, proxy_user: impl Into<String>) -> Self {
        self.proxy_user = Some(proxy_user.into());
        self
    }

    pub fn with_env_file(mut self, env_file: impl Into<PathBuf>) -> Self {
        self.env_file = Some(env_file.into());
        self
    }

    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn proxy_user(&self) -> Option<&str> {
        self.proxy_user.as_deref()
    }

    pub fn env_file(&self) -> Option<&Path> {
        self.env_file.as_deref()
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub(crate) fn record_start(&mut self) {
        self.start_time = Some(Utc::now());
    }

    pub(crate) fn record_exit(&mut self, exit_code: i32) {
        self.exit_code = Some(exit_code);
        self.end_time = Some(Utc::now());
    }

    pub(crate) fn mark_complete(&mut self) {
        self.complete = true;
    }
}
