/// One connection, one exchange.
///
/// `AWAIT_LINE -> DECODE -> { EXECUTE -> RESPOND | INSTALL | CLOSE }`.
/// Every path ends with the connection shut down; nothing is kept alive.
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use super::request::{self, Decoded};
use super::response::Response;
use super::{HandleError, RelayContext};

/// How a connection ended, for logging and tests.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionOutcome {
    /// A tagged line was written
    Responded { ok: bool },
    /// The raw installer payload was written
    Installed { bytes: usize },
    /// Blank line: nothing written
    Dropped,
}

impl std::fmt::Display for ConnectionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionOutcome::Responded { ok: true } => write!(f, "responded OK"),
            ConnectionOutcome::Responded { ok: false } => write!(f, "responded ERROR"),
            ConnectionOutcome::Installed { bytes } => write!(f, "sent installer ({bytes} bytes)"),
            ConnectionOutcome::Dropped => write!(f, "dropped empty request"),
        }
    }
}

pub async fn handle<S>(ctx: &RelayContext, mut stream: S) -> Result<ConnectionOutcome, HandleError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let line = {
        let mut reader = BufReader::new(&mut stream);
        request::read_request_line(&mut reader).await?
    };

    let outcome = match request::decode(&line, &ctx.translator) {
        Decoded::Empty => {
            debug!("Empty request, closing");
            ConnectionOutcome::Dropped
        }
        Decoded::Install => {
            let bytes = ctx
                .payload
                .send(&mut stream)
                .await
                .map_err(HandleError::Write)?;
            info!("Sent lendctl.c ({bytes} bytes)");
            ConnectionOutcome::Installed { bytes }
        }
        Decoded::Execute { command, args } => {
            debug!("Executing {command:?} {args:?}");
            let outcome = ctx.executor.run(&command, &args).await;
            if let Some(error) = outcome.error.as_deref().filter(|_| !outcome.success) {
                warn!("Command failed [{command:?} {args:?}]: {error}");
            }
            let response = Response::from_outcome(outcome);
            response
                .write_to(&mut stream)
                .await
                .map_err(HandleError::Write)?;
            ConnectionOutcome::Responded {
                ok: response.is_ok(),
            }
        }
    };

    // Peer may already be gone; the exchange is complete either way.
    let _ = stream.shutdown().await;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{AllowListExecutor, LocalExecutor};
    use crate::installer::Payload;
    use crate::relay::request::PathTranslator;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt};

    fn context() -> RelayContext {
        RelayContext::new(
            PathTranslator::new("/home/u/.lend/files"),
            Box::new(LocalExecutor::new()),
            Payload::from_bytes(&b"#include <stdio.h>\n\x00\x01"[..]),
        )
    }

    /// Sends `request`, runs the handler, returns (outcome, everything the client read).
    async fn exchange(
        ctx: &RelayContext,
        request: &[u8],
    ) -> (Result<ConnectionOutcome, HandleError>, Vec<u8>) {
        let (mut client, server) = duplex(64 * 1024);
        client.write_all(request).await.unwrap();
        client.shutdown().await.unwrap();

        let result = handle(ctx, server).await;
        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        (result, reply)
    }

    #[tokio::test]
    async fn test_echo_with_file_argument() {
        let (result, reply) = exchange(&context(), b"echo hello FILE|server1/config.yaml\n").await;
        assert_eq!(result.unwrap(), ConnectionOutcome::Responded { ok: true });
        assert_eq!(reply, b"OK|hello /home/u/.lend/files/server1/config.yaml\n");
    }

    #[tokio::test]
    async fn test_false_yields_error_with_fallback() {
        let (result, reply) = exchange(&context(), b"false\n").await;
        assert_eq!(result.unwrap(), ConnectionOutcome::Responded { ok: false });
        let reply = String::from_utf8(reply).unwrap();
        assert!(reply.starts_with("ERROR|"), "{reply}");
        assert!(reply.len() > "ERROR|\n".len(), "{reply}");
        assert_eq!(reply.matches('\n').count(), 1);
    }

    #[tokio::test]
    async fn test_stderr_is_reported() {
        let (_, reply) = exchange(&context(), b"ls /nonexistent-lendd-dir\n").await;
        let reply = String::from_utf8_lossy(&reply);
        assert!(reply.starts_with("ERROR|"), "{reply}");
        assert!(reply.contains("nonexistent-lendd-dir"), "{reply}");
    }

    #[tokio::test]
    async fn test_unknown_command_is_error_line() {
        let (result, reply) = exchange(&context(), b"nonexistent_command_12345 a\n").await;
        assert_eq!(result.unwrap(), ConnectionOutcome::Responded { ok: false });
        assert!(reply.starts_with(b"ERROR|"));
    }

    #[tokio::test]
    async fn test_blank_lines_get_no_response() {
        for request in [&b"\n"[..], b"   \t  \n", b"\r\n"] {
            let (result, reply) = exchange(&context(), request).await;
            assert_eq!(result.unwrap(), ConnectionOutcome::Dropped);
            assert!(reply.is_empty());
        }
    }

    #[tokio::test]
    async fn test_eof_before_newline_executes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let request = format!("touch {}", marker.display());

        let (result, reply) = exchange(&context(), request.as_bytes()).await;
        assert!(matches!(result, Err(HandleError::UnexpectedEof { .. })));
        assert!(reply.is_empty());
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_install_sends_raw_payload() {
        let ctx = context();
        let (result, reply) = exchange(&ctx, b"install_lendctl\n").await;
        assert_eq!(
            result.unwrap(),
            ConnectionOutcome::Installed {
                bytes: ctx.payload.as_bytes().len()
            }
        );
        assert_eq!(reply, ctx.payload.as_bytes());
    }

    #[tokio::test]
    async fn test_only_first_line_is_used() {
        let (_, reply) = exchange(&context(), b"echo first\necho second\n").await;
        assert_eq!(reply, b"OK|first\n");
    }

    #[tokio::test]
    async fn test_allow_list_rejection_is_error_line() {
        let ctx = RelayContext::new(
            PathTranslator::new("/srv/files"),
            Box::new(AllowListExecutor::new(
                vec!["echo".to_string()],
                Box::new(LocalExecutor::new()),
            )),
            Payload::embedded(),
        );
        let (_, reply) = exchange(&ctx, b"rm -rf FILE|x\n").await;
        assert_eq!(reply, b"ERROR|command not allowed: rm\n");
    }

    #[tokio::test]
    async fn test_non_utf8_file_token_reaches_child_unchanged() {
        let ctx = RelayContext::new(
            PathTranslator::new("/r"),
            Box::new(LocalExecutor::new()),
            Payload::embedded(),
        );
        let (result, reply) = exchange(&ctx, b"printf %s FILE|a\xffb\n").await;
        assert_eq!(result.unwrap(), ConnectionOutcome::Responded { ok: true });
        assert_eq!(reply, b"OK|/r/a\xffb\n");
    }

    #[tokio::test]
    async fn test_client_disconnect_does_not_kill_child() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let script = dir.path().join("late.sh");
        std::fs::write(&script, format!("sleep 0.3\ntouch '{}'\n", marker.display())).unwrap();

        let (mut client, server) = duplex(1024);
        client
            .write_all(format!("sh {}\n", script.display()).as_bytes())
            .await
            .unwrap();
        let task = tokio::spawn(async move { handle(&context(), server).await });

        // Child is running; the client goes away and the handler is torn down
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(client);
        task.abort();
        let _ = task.await;

        for _ in 0..50 {
            if marker.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(marker.exists());
    }
}
