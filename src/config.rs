use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;

use crate::installer::Payload;

/// Port the companion `lendctl` client connects to.
pub const DEFAULT_PORT: u16 = 52698;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub listener: ListenerConfig,
    pub sandbox: SandboxConfig,
    pub exec: ExecConfig,
    pub installer: InstallerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ListenerConfig {
    pub host: String,
    pub port: u16,
    /// SO_REUSEADDR, so the daemon can restart while old sockets linger
    pub reuse_address: bool,
    /// SO_REUSEPORT (unix only, ignored elsewhere)
    pub reuse_port: bool,
    pub backlog: u32,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            reuse_address: true,
            reuse_port: false,
            backlog: 1024,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SandboxConfig {
    /// Supports `~` and ${ENV_VAR} substitution.
    /// Defaults to `$HOME/.lend/files`.
    pub root: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ExecConfig {
    /// Commands the relay may run. Empty means any command.
    pub allowed_commands: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct InstallerConfig {
    /// Serve this file for `install_lendctl` instead of the embedded client
    pub payload: Option<PathBuf>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        // Expand environment variables like ${LEND_PORT}
        let expanded = shellexpand::env(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.listener.host, self.listener.port);
        addr.parse()
            .map_err(|e| anyhow!("Invalid listen address {addr}: {e}"))
    }
}

impl SandboxConfig {
    /// Resolves the sandbox root once, at startup.
    pub fn resolve_root(&self) -> anyhow::Result<PathBuf> {
        self.resolve_root_with(home_dir)
    }

    fn resolve_root_with(
        &self,
        home: impl Fn() -> anyhow::Result<PathBuf>,
    ) -> anyhow::Result<PathBuf> {
        match &self.root {
            Some(raw) => {
                let expanded = shellexpand::full(raw)
                    .with_context(|| format!("expanding sandbox root {raw}"))?;
                Ok(PathBuf::from(expanded.as_ref()))
            }
            None => Ok(home()?.join(".lend").join("files")),
        }
    }
}

impl InstallerConfig {
    pub fn load_payload(&self) -> anyhow::Result<Payload> {
        match &self.payload {
            Some(path) => Payload::from_file(path),
            None => Ok(Payload::embedded()),
        }
    }
}

fn home_dir() -> anyhow::Result<PathBuf> {
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => Ok(PathBuf::from(home)),
        _ => Err(anyhow!("Failed to get home directory: HOME is not set")),
    }
}
