pub mod handler;
pub mod listener;
pub mod request;
pub mod response;

use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::exec::{AllowListExecutor, Executor, LocalExecutor};
use crate::installer::Payload;
use request::PathTranslator;

/// Process-wide, read-only state shared by every connection handler.
/// Built once at startup and never mutated.
pub struct RelayContext {
    pub translator: PathTranslator,
    pub executor: Box<dyn Executor>,
    pub payload: Payload,
}

impl RelayContext {
    pub fn new(translator: PathTranslator, executor: Box<dyn Executor>, payload: Payload) -> Self {
        Self {
            translator,
            executor,
            payload,
        }
    }

    /// Resolves the sandbox root and the installer payload. Any failure
    /// here is fatal: the relay cannot work without them.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let root = config.sandbox.resolve_root()?;
        let payload = config.installer.load_payload()?;

        let local: Box<dyn Executor> = Box::new(LocalExecutor::new());
        let executor: Box<dyn Executor> = if config.exec.allowed_commands.is_empty() {
            local
        } else {
            info!(
                "Allowed commands: {}",
                config.exec.allowed_commands.join(", ")
            );
            Box::new(AllowListExecutor::new(
                config.exec.allowed_commands.iter().cloned(),
                local,
            ))
        };

        Ok(Self::new(PathTranslator::new(root), executor, payload))
    }
}

/// Transport failures on a single connection. Logged, never fatal.
#[derive(Debug, Error)]
pub enum HandleError {
    #[error("failed to read request: {0}")]
    Read(#[source] std::io::Error),

    #[error("connection closed before end of line ({read} bytes read)")]
    UnexpectedEof { read: usize },

    #[error("failed to write response: {0}")]
    Write(#[source] std::io::Error),
}
