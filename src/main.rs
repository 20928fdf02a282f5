mod backoff;
mod config;
mod exec;
mod installer;
mod relay;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::relay::listener::{self, Bind, SocketBinder};
use crate::relay::RelayContext;

fn print_help() {
    println!(
        "\
lendd v{}

Runs commands sent by lendctl clients and returns their output.

USAGE:
    lendd [OPTIONS] [CONFIG_PATH]

ARGUMENTS:
    CONFIG_PATH    Path to TOML configuration file [default: built-in defaults]

OPTIONS:
    -h, --help       Print this help message and exit
    -V, --version    Print version and exit

PROTOCOL:
    One request per TCP connection:
        <command> [<arg> ...]\\n
    Arguments written as FILE|<path> are resolved under the sandbox root
    (default ~/.lend/files). The reply is a single line, OK|<stdout> or
    ERROR|<message>. The request `install_lendctl` returns the lendctl.c
    client source instead.

ENVIRONMENT VARIABLES:
    Variables are referenced in the config file via ${{VAR_NAME}} syntax.

    RUST_LOG    Log level filter for tracing
                (e.g. debug, lendd=debug,warn)
    HOME        Base of the default sandbox root

EXAMPLES:
    lendd                          # port {}, sandbox ~/.lend/files
    lendd /etc/lend/lendd.toml     # custom config path
    RUST_LOG=lendd=debug lendd     # with debug logging",
        env!("CARGO_PKG_VERSION"),
        config::DEFAULT_PORT,
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --help / --version before anything else
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("lendd v{}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {}
        }
    }

    // Initialize logging (RUST_LOG=debug for debug mode)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lendd=info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from {path}");
            Config::load(&path)?
        }
        None => Config::default(),
    };

    let ctx = RelayContext::from_config(&config)?;
    let root = ctx.translator.root();
    info!("Sandbox root: {}", root.display());
    if !root.is_dir() {
        warn!("Sandbox root {} does not exist yet", root.display());
    }
    info!("Installer payload: {} bytes", ctx.payload.as_bytes().len());
    info!("Executor: {}", ctx.executor.mode());

    let addr = config.listen_addr()?;
    let tcp = SocketBinder::from_config(&config.listener)
        .bind(addr)
        .with_context(|| format!("Failed to listen on {addr}"))?;
    info!("Listening on {addr}");

    listener::serve(tcp, Arc::new(ctx), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await;

    info!("lendd stopped");
    Ok(())
}
