use std::collections::HashSet;
use std::ffi::{OsStr, OsString};

use async_trait::async_trait;
use tracing::warn;

use super::{ExecError, ExecutionOutcome, Executor};

/// Rejects command names that are not explicitly listed, then delegates.
pub struct AllowListExecutor {
    allowed: HashSet<OsString>,
    inner: Box<dyn Executor>,
}

impl AllowListExecutor {
    pub fn new(allowed: impl IntoIterator<Item = String>, inner: Box<dyn Executor>) -> Self {
        Self {
            allowed: allowed.into_iter().map(OsString::from).collect(),
            inner,
        }
    }

    /// Exact match on the command name; `/usr/bin/kubectl` does not match `kubectl`.
    pub fn is_allowed(&self, command: &OsStr) -> bool {
        self.allowed.contains(command)
    }
}

#[async_trait]
impl Executor for AllowListExecutor {
    async fn run(&self, command: &OsStr, args: &[OsString]) -> ExecutionOutcome {
        if !self.is_allowed(command) {
            let name = command.to_string_lossy();
            warn!("Rejected command not in allow-list: {name}");
            return ExecError::Denied(name.into_owned()).into();
        }
        self.inner.run(command, args).await
    }

    fn mode(&self) -> &'static str {
        "allow-list"
    }
}
