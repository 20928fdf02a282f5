//! Command execution behind a narrow seam.
//!
//! The relay hands every decoded request to an [`Executor`]. The default
//! [`LocalExecutor`] trusts the command name completely; an
//! [`AllowListExecutor`] can be layered on top without touching the
//! decoder or the response encoder.

mod allow_list;
mod error;
mod local;

pub use allow_list::AllowListExecutor;
pub use error::ExecError;
pub use local::LocalExecutor;

use std::ffi::{OsStr, OsString};

use async_trait::async_trait;

/// Everything the response encoder needs from one command run.
/// Produced once per request, consumed once.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Executor-side failure description (spawn failure, exit status, ...)
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn succeeded(stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        Self {
            success: true,
            stdout,
            stderr,
            error: None,
        }
    }

    pub fn failed(error: ExecError, stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        Self {
            success: false,
            stdout,
            stderr,
            error: Some(error.to_string()),
        }
    }
}

impl From<ExecError> for ExecutionOutcome {
    fn from(error: ExecError) -> Self {
        Self::failed(error, Vec::new(), Vec::new())
    }
}

/// Runs a named program with already-translated arguments.
///
/// Implementations never retry and never time out; a hung child blocks
/// the calling handler until it exits.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn run(&self, command: &OsStr, args: &[OsString]) -> ExecutionOutcome;

    /// Short name for logs.
    fn mode(&self) -> &'static str;
}
