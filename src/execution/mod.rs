//! Job-process lifecycle engine: per-attempt context, command building, and
//! process supervision.

pub mod command_builder;
pub mod context;
pub mod supervisor;

pub use command_builder::{CommandBuilder, NoOpCommandBuilder, ShellCommandBuilder};
pub use context::JobExecutionContext;
pub use supervisor::{
    CancelHandle, ExitOutcome, LogSink, ProcessSupervisor, TracingLogSink,
};
