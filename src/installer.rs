/// Side-channel payload served for the `install_lendctl` command.
///
/// The payload is written raw, with no `OK|`/`ERROR|` tag and no trailing
/// line; the client reads until the connection closes.
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Reserved command name that triggers the side channel.
pub const INSTALL_COMMAND: &str = "install_lendctl";

/// Source of the companion client, compiled into the daemon.
static LENDCTL_SOURCE: &[u8] = include_bytes!("../assets/lendctl.c");

#[derive(Debug, Clone)]
pub struct Payload {
    bytes: Arc<[u8]>,
}

impl Payload {
    pub fn embedded() -> Self {
        Self::from_bytes(LENDCTL_SOURCE)
    }

    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Reads the payload once; callers do this at startup.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading installer payload {}", path.display()))?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Writes the whole payload and flushes. Returns the byte count.
    pub async fn send<W>(&self, writer: &mut W) -> std::io::Result<usize>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.bytes).await?;
        writer.flush().await?;
        Ok(self.bytes.len())
    }
}
