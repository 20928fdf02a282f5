use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::exec::ExecutionOutcome;

pub const OK_TAG: &[u8] = b"OK|";
pub const ERROR_TAG: &[u8] = b"ERROR|";

/// Used when a command failed without stderr and without an executor message.
const FALLBACK_ERROR: &str = "command failed";

/// The single tagged line written back for a normal command.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ok(Vec<u8>),
    Error(Vec<u8>),
}

impl Response {
    /// Stderr wins over the executor's own failure description. Both
    /// stdout and stderr are forwarded as raw bytes.
    pub fn from_outcome(outcome: ExecutionOutcome) -> Self {
        if outcome.success {
            return Response::Ok(outcome.stdout);
        }
        let message = if !outcome.stderr.is_empty() {
            outcome.stderr
        } else {
            outcome
                .error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| FALLBACK_ERROR.to_string())
                .into_bytes()
        };
        Response::Error(message)
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok(_))
    }

    /// `<TAG><payload>\n`; a payload already ending in `\n` is not given a second one.
    pub fn encode(&self) -> Vec<u8> {
        let (tag, payload) = match self {
            Response::Ok(stdout) => (OK_TAG, stdout.as_slice()),
            Response::Error(message) => (ERROR_TAG, message.as_slice()),
        };
        let mut line = Vec::with_capacity(tag.len() + payload.len() + 1);
        line.extend_from_slice(tag);
        line.extend_from_slice(payload);
        if line.last() != Some(&b'\n') {
            line.push(b'\n');
        }
        line
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.encode()).await?;
        writer.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(stderr: &[u8], error: Option<&str>) -> ExecutionOutcome {
        ExecutionOutcome {
            success: false,
            stdout: b"ignored".to_vec(),
            stderr: stderr.to_vec(),
            error: error.map(String::from),
        }
    }

    #[test]
    fn test_ok_line() {
        let response = Response::from_outcome(ExecutionOutcome::succeeded(
            b"hello /home/u/.lend/files/server1/config.yaml\n".to_vec(),
            Vec::new(),
        ));
        assert!(response.is_ok());
        assert_eq!(
            response.encode(),
            b"OK|hello /home/u/.lend/files/server1/config.yaml\n"
        );
    }

    #[test]
    fn test_ok_without_trailing_newline_gets_one() {
        assert_eq!(Response::Ok(b"42".to_vec()).encode(), b"OK|42\n");
    }

    #[test]
    fn test_ok_empty_stdout() {
        assert_eq!(Response::Ok(Vec::new()).encode(), b"OK|\n");
    }

    #[test]
    fn test_ok_keeps_raw_bytes() {
        assert_eq!(
            Response::Ok(b"a\nb\xff".to_vec()).encode(),
            b"OK|a\nb\xff\n"
        );
    }

    #[test]
    fn test_error_prefers_stderr() {
        let response = Response::from_outcome(failure(b"no such pod\n", Some("exit status: 1")));
        assert_eq!(response, Response::Error(b"no such pod\n".to_vec()));
        assert_eq!(response.encode(), b"ERROR|no such pod\n");
    }

    #[test]
    fn test_error_falls_back_to_executor_message() {
        let response = Response::from_outcome(failure(b"", Some("exit status: 1")));
        assert_eq!(response.encode(), b"ERROR|exit status: 1\n");
    }

    #[test]
    fn test_error_never_empty() {
        let response = Response::from_outcome(failure(b"", None));
        assert_eq!(response.encode(), b"ERROR|command failed\n");

        let response = Response::from_outcome(failure(b"", Some("")));
        assert_eq!(response.encode(), b"ERROR|command failed\n");
    }

    #[test]
    fn test_error_keeps_raw_stderr() {
        let response = Response::from_outcome(failure(b"cannot open a\xffb\n", None));
        assert_eq!(response.encode(), b"ERROR|cannot open a\xffb\n");
    }

    #[test]
    fn test_success_ignores_stderr() {
        let response = Response::from_outcome(ExecutionOutcome::succeeded(
            b"out".to_vec(),
            b"warning: deprecated".to_vec(),
        ));
        assert_eq!(response, Response::Ok(b"out".to_vec()));
    }

    #[tokio::test]
    async fn test_write_to() {
        let mut out = Vec::new();
        Response::Error(b"boom".to_vec())
            .write_to(&mut out)
            .await
            .unwrap();
        assert_eq!(out, b"ERROR|boom\n");
    }
}
