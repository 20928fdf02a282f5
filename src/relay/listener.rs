/// Listening socket setup and the accept loop.
///
/// Socket options live behind [`Bind`] so the connection handling code
/// never touches OS-specific flags.
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpSocket};
use tracing::{debug, error, info, warn};

use super::handler;
use super::RelayContext;
use crate::backoff::Backoff;
use crate::config::ListenerConfig;

/// Produces a bound, listening socket.
pub trait Bind {
    fn bind(&self, addr: SocketAddr) -> io::Result<TcpListener>;
}

#[derive(Debug, Clone)]
pub struct SocketBinder {
    pub reuse_address: bool,
    pub reuse_port: bool,
    pub backlog: u32,
}

impl SocketBinder {
    pub fn from_config(config: &ListenerConfig) -> Self {
        Self {
            reuse_address: config.reuse_address,
            reuse_port: config.reuse_port,
            backlog: config.backlog,
        }
    }
}

impl Bind for SocketBinder {
    fn bind(&self, addr: SocketAddr) -> io::Result<TcpListener> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(self.reuse_address)?;
        #[cfg(unix)]
        socket.set_reuseport(self.reuse_port)?;
        socket.bind(addr)?;
        socket.listen(self.backlog)
    }
}

/// Accepts until `shutdown` resolves, one spawned task per connection.
///
/// No connection limit. Accept errors are logged and followed by a short
/// pause; they never stop the loop. In-flight handlers are not awaited on
/// shutdown.
pub async fn serve<F>(listener: TcpListener, ctx: Arc<RelayContext>, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut backoff = Backoff::for_accept_errors();

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = &mut shutdown => {
                info!("Shutdown signal received, no longer accepting");
                return;
            }
        };

        match accepted {
            Ok((stream, peer)) => {
                backoff.reset();
                debug!("Accepted connection from {peer}");
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    match handler::handle(&ctx, stream).await {
                        Ok(outcome) => debug!("Connection from {peer} {outcome}"),
                        Err(e) => warn!("Connection from {peer}: {e}"),
                    }
                });
            }
            Err(e) => {
                let delay = backoff.next_delay();
                error!(
                    "Connection failed: {e} (retrying accept in {}ms, {} consecutive)",
                    delay.as_millis(),
                    backoff.attempt
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = &mut shutdown => {
                        info!("Shutdown signal received, no longer accepting");
                        return;
                    }
                }
            }
        }
    }
}
