//! # Process Supervisor
//!
//! Deterministically runs one external command to completion or termination,
//! never leaking the OS process.
//!
//! The supervising task owns the child handle for the whole attempt. Output
//! is drained by a background task that the supervisor awaits before reading
//! the exit code, so the code is never computed while output may still be in
//! flight. The one-shot completion latch is the sole coordination primitive
//! between the natural-completion path and the cancellation path: whichever
//! path races ahead, the latch fires exactly once and late waiters observe it
//! immediately.
//!
//! Cancellation is reached through a [`CancelHandle`], which may live on a
//! different task than `run`. Graceful termination sends `kill <pid>` (as the
//! proxy user when one is configured), waits up to the configured grace
//! period on the latch, then falls back to `kill -9 <pid>` plus destruction
//! of the child handle. A pid that cannot be resolved (0) skips the signal
//! steps but still destroys the handle.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ProcessConfig;
use crate::error::{CoreError, Result};
use crate::execution::command_builder::CommandBuilder;
use crate::execution::context::JobExecutionContext;

/// Destination for captured process output, one line at a time.
pub trait LogSink: Send + Sync {
    fn append_line(&self, line: &str);
}

/// Default sink: forward each line to the structured log, tagged with the job id.
pub struct TracingLogSink {
    job_id: String,
}

impl TracingLogSink {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
        }
    }
}

impl LogSink for TracingLogSink {
    fn append_line(&self, line: &str) {
        info!(job_id = %self.job_id, "{line}");
    }
}

/// Result of a finished attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    pub exit_code: i32,
    pub completed: bool,
}

/// State shared between the supervising task and cancel handles.
struct SupervisorShared {
    job_id: String,
    proxy_user: Option<String>,
    config: ProcessConfig,
    started: AtomicBool,
    /// OS process id of the running child; 0 while unresolved.
    pid: AtomicU32,
    /// Completion latch: fired exactly once, after the exit code is known.
    latch_tx: watch::Sender<bool>,
    /// Forceful-destroy request from the cancel path to the owning task.
    destroy_tx: watch::Sender<bool>,
}

pub struct ProcessSupervisor {
    context: JobExecutionContext,
    builder: Box<dyn CommandBuilder>,
    sink: Arc<dyn LogSink>,
    shared: Arc<SupervisorShared>,
}

impl ProcessSupervisor {
    pub fn new(
        context: JobExecutionContext,
        builder: Box<dyn CommandBuilder>,
        config: ProcessConfig,
    ) -> Self {
        let sink: Arc<dyn LogSink> = Arc::new(TracingLogSink::new(context.job_id()));
        Self::with_sink(context, builder, config, sink)
    }

    pub fn with_sink(
        context: JobExecutionContext,
        builder: Box<dyn CommandBuilder>,
        config: ProcessConfig,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        let (latch_tx, _) = watch::channel(false);
        let (destroy_tx, _) = watch::channel(false);
        let shared = Arc::new(SupervisorShared {
            job_id: context.job_id().to_string(),
            proxy_user: context.proxy_user().map(str::to_string),
            config,
            started: AtomicBool::new(false),
            pid: AtomicU32::new(0),
            latch_tx,
            destroy_tx,
        });
        Self {
            context,
            builder,
            sink,
            shared,
        }
    }

    /// Cancellation entry point, detachable from the supervising task.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn context(&self) -> &JobExecutionContext {
        &self.context
    }

    /// Run the job's command to completion.
    ///
    /// A builder that yields no command marks the attempt trivially
    /// successful with no process spawned. Any spawn or drain failure is
    /// logged and mapped to exit code −1; a non-zero exit code becomes
    /// [`CoreError::Execution`].
    pub async fn run(&mut self) -> Result<ExitOutcome> {
        let command = match self.builder.build_command(&self.context) {
            Ok(None) => {
                self.context.record_exit(0);
                self.context.mark_complete();
                return Ok(ExitOutcome {
                    exit_code: 0,
                    completed: true,
                });
            }
            Ok(Some(command)) => command,
            Err(err) => {
                error!(job_id = %self.shared.job_id, error = %err, "Failed to build job command");
                self.context.record_exit(-1);
                return Err(CoreError::execution(-1));
            }
        };

        let exit_code = match self.execute(command).await {
            Ok(code) => code,
            Err(err) => {
                error!(job_id = %self.shared.job_id, error = %err, "Job process failed");
                -1
            }
        };
        self.context.record_exit(exit_code);

        if exit_code != 0 {
            return Err(CoreError::execution(exit_code));
        }
        self.context.mark_complete();
        Ok(ExitOutcome {
            exit_code: 0,
            completed: true,
        })
    }

    async fn execute(&mut self, command: Vec<String>) -> std::io::Result<i32> {
        let proxy_user = self.context.proxy_user().map(str::to_string);
        let workdir = self.context.working_dir().to_path_buf();
        info!(
            job_id = %self.shared.job_id,
            proxy_user = proxy_user.as_deref(),
            workdir = %workdir.display(),
            "Preparing job process"
        );

        let argv = if let Some(user) = &proxy_user {
            // Privilege delegation is deferred to the OS: the command goes
            // into a generated script and the invocation becomes an
            // identity-switch wrapper running that script.
            let script_path = workdir.join(format!("{}.command", self.shared.job_id));
            let script = render_command_script(&command, self.context.env_file());
            info!(job_id = %self.shared.job_id, script = %script_path.display(), "Generating command file");
            std::fs::write(&script_path, script)?;
            vec![
                self.shared.config.delegate_command.clone(),
                "-u".to_string(),
                user.clone(),
                self.shared.config.shell.clone(),
                script_path.display().to_string(),
            ]
        } else {
            vec![
                self.shared.config.shell.clone(),
                "-c".to_string(),
                command.join(" "),
            ]
        };
        info!(job_id = %self.shared.job_id, command = ?argv, "Run command");

        let mut child = Command::new(&argv[0])
            .args(&argv[1..])
            .current_dir(&workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            // The error stream is merged into the standard output drain.
            .stderr(Stdio::piped())
            .spawn()?;

        self.shared
            .pid
            .store(child.id().unwrap_or(0), Ordering::SeqCst);
        self.shared.started.store(true, Ordering::SeqCst);
        self.context.record_start();

        let mut drain = self.spawn_drain(&mut child);
        let mut destroy_rx = self.shared.destroy_tx.subscribe();

        // All output must be captured before the exit code is computed; a
        // forceful-destroy request is honored while draining.
        loop {
            tokio::select! {
                _ = &mut drain => break,
                changed = destroy_rx.changed() => {
                    if changed.is_ok() {
                        warn!(job_id = %self.shared.job_id, "Destroying job process handle");
                        let _ = child.start_kill();
                    }
                }
            }
        }

        // A child may close its pipes and keep running; the destroy request
        // stays honored while waiting for exit.
        let status = loop {
            tokio::select! {
                status = child.wait() => break status?,
                changed = destroy_rx.changed() => {
                    if changed.is_ok() {
                        warn!(job_id = %self.shared.job_id, "Destroying job process handle");
                        let _ = child.start_kill();
                    }
                }
            }
        };
        let exit_code = status.code().unwrap_or(-1);
        self.shared.latch_tx.send_replace(true);
        Ok(exit_code)
    }

    /// Background task forwarding child output line-by-line to the sink
    /// until end-of-stream.
    fn spawn_drain(&self, child: &mut tokio::process::Child) -> JoinHandle<()> {
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_sink = Arc::clone(&self.sink);
        let err_sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            tokio::join!(
                async {
                    if let Some(stdout) = stdout {
                        drain_stream(stdout, out_sink).await;
                    }
                },
                async {
                    if let Some(stderr) = stderr {
                        drain_stream(stderr, err_sink).await;
                    }
                },
            );
        })
    }
}

/// Handle for cancelling a running attempt, valid only once the process
/// has started.
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<SupervisorShared>,
}

impl CancelHandle {
    /// Gracefully, then forcefully, terminate the supervised process.
    ///
    /// Blocks the caller for up to the configured grace period while waiting
    /// for graceful shutdown; invoke from a separate task when that is not
    /// acceptable.
    pub async fn cancel(&self) -> Result<()> {
        if !self.shared.started.load(Ordering::SeqCst) {
            return Err(CoreError::invalid_state("process has not yet started"));
        }

        let pid = self.shared.pid.load(Ordering::SeqCst);
        info!(job_id = %self.shared.job_id, pid, "Cancelling job process");

        if pid != 0 {
            self.spawn_kill(pid, false).await;
            let mut latch_rx = self.shared.latch_tx.subscribe();
            let grace = Duration::from_millis(self.shared.config.kill_grace_ms);
            let completed =
                tokio::time::timeout(grace, latch_rx.wait_for(|fired| *fired)).await;
            if completed.is_ok() {
                // Natural completion observed; no forceful signal.
                return Ok(());
            }
            warn!(
                job_id = %self.shared.job_id,
                pid,
                "Kill with signal TERM failed, killing with KILL signal"
            );
            self.spawn_kill(pid, true).await;
        }

        // Unresolved pid skips the signal steps but the handle is still
        // destroyed.
        self.shared.destroy_tx.send_replace(true);
        Ok(())
    }

    /// Issue a kill command, running it as the proxy user when one is
    /// configured. Failures are logged and fall through; the forceful
    /// handle-destroy path covers them.
    async fn spawn_kill(&self, pid: u32, force: bool) {
        let config = &self.shared.config;
        let mut cmd = match &self.shared.proxy_user {
            Some(user) => {
                let mut cmd = Command::new(&config.delegate_command);
                cmd.arg("-u").arg(user).arg("kill");
                cmd
            }
            None => Command::new("kill"),
        };
        if force {
            cmd.arg("-9");
        }
        cmd.arg(pid.to_string());

        if let Err(err) = cmd.status().await {
            info!(job_id = %self.shared.job_id, pid, error = %err, "Kill attempt failed");
        }
    }
}

/// Render the generated proxy-user script: shell shebang first, then the
/// sourced environment file (when configured), then the command itself.
pub fn render_command_script(command: &[String], env_file: Option<&std::path::Path>) -> String {
    let mut script = String::from("#!/bin/sh\n");
    script.push_str("BASEDIR=$(cd `dirname $0`; pwd)\n");
    script.push_str("cd $BASEDIR\n");
    if let Some(env_file) = env_file {
        script.push_str(&format!("source {}\n", env_file.display()));
    }
    script.push_str("\n\n");
    script.push_str(&command.join(" "));
    script.push('\n');
    script
}

async fn drain_stream<R: AsyncRead + Unpin>(reader: R, sink: Arc<dyn LogSink>) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => sink.append_line(&line),
            Ok(None) => break,
            Err(err) => {
                error!(error = %err, "Failed reading process output");
                break;
            }
        }
    }
}
