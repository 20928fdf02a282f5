use std::process::ExitStatus;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Exited(ExitStatus),

    #[error("command not allowed: {0}")]
    Denied(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
