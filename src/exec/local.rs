use std::ffi::{OsStr, OsString};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{ExecError, ExecutionOutcome, Executor};

/// No isolation: the command name is looked up on `PATH` and run as-is.
#[derive(Debug, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn run(&self, command: &OsStr, args: &[OsString]) -> ExecutionOutcome {
        let child = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A client hanging up must not take the child down with it
            .kill_on_drop(false)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(source) => {
                return ExecError::Spawn {
                    command: command.to_string_lossy().into_owned(),
                    source,
                }
                .into()
            }
        };
        debug!("Spawned {command:?} (pid {:?})", child.id());

        let output = match child.wait_with_output().await {
            Ok(output) => output,
            Err(e) => return ExecError::Io(e).into(),
        };

        if output.status.success() {
            ExecutionOutcome::succeeded(output.stdout, output.stderr)
        } else {
            ExecutionOutcome::failed(
                ExecError::Exited(output.status),
                output.stdout,
                output.stderr,
            )
        }
    }

    fn mode(&self) -> &'static str {
        "local"
    }
}
