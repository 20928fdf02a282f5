/// Request line decoding and `FILE|` path translation.
///
/// A request is one newline-terminated line: `<command> [<arg> ...]\n`.
/// Arguments of the form `FILE|<remote-relative-path>` are rewritten to a
/// path under the sandbox root; everything else passes through verbatim.
///
/// The line stays raw bytes from socket to `execve`: file names sent by the
/// client need not be UTF-8.
use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::HandleError;
use crate::installer::INSTALL_COMMAND;

/// Marker in front of a remote-relative path.
pub const FILE_PREFIX: &[u8] = b"FILE|";

/// One raw argument, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentToken<'a> {
    /// Opaque bytes, passed through unchanged
    Plain(&'a [u8]),
    /// Remote path segment after `FILE|`
    File(&'a [u8]),
}

impl<'a> ArgumentToken<'a> {
    /// Only the first `|` is significant, so `FILE|a|b` carries `a|b`.
    pub fn classify(raw: &'a [u8]) -> Self {
        match raw.strip_prefix(FILE_PREFIX) {
            Some(remote) => ArgumentToken::File(remote),
            None => ArgumentToken::Plain(raw),
        }
    }
}

/// Maps remote-declared paths under a fixed local root.
///
/// No existence check, no `..` normalisation and no containment check:
/// `FILE|../x` resolves to `<root>/../x`.
#[derive(Debug, Clone)]
pub struct PathTranslator {
    root: PathBuf,
}

impl PathTranslator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins `remote` segment by segment. Empty segments are skipped, so a
    /// leading `/` never replaces the root.
    pub fn resolve(&self, remote: &[u8]) -> PathBuf {
        remote
            .split(|&b| b == b'/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| {
                path.join(OsStr::from_bytes(segment))
            })
    }

    pub fn translate(&self, raw: &[u8]) -> OsString {
        match ArgumentToken::classify(raw) {
            ArgumentToken::File(remote) => self.resolve(remote).into_os_string(),
            ArgumentToken::Plain(plain) => OsString::from_vec(plain.to_vec()),
        }
    }
}

/// A parsed request line. Discarded once the connection is handled.
#[derive(Debug, Clone, PartialEq)]
pub struct Request<'a> {
    pub command: &'a [u8],
    pub raw_args: Vec<&'a [u8]>,
}

impl<'a> Request<'a> {
    /// Splits on runs of ASCII whitespace. Returns `None` when the line
    /// holds no tokens.
    pub fn parse(line: &'a [u8]) -> Option<Self> {
        let mut tokens = line
            .split(|b| b.is_ascii_whitespace())
            .filter(|token| !token.is_empty());
        let command = tokens.next()?;
        Some(Self {
            command,
            raw_args: tokens.collect(),
        })
    }
}

/// What the handler should do with a line.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Zero tokens: close silently
    Empty,
    /// `install_lendctl`: serve the side-channel payload
    Install,
    Execute {
        command: OsString,
        args: Vec<OsString>,
    },
}

pub fn decode(line: &[u8], translator: &PathTranslator) -> Decoded {
    let Some(request) = Request::parse(line) else {
        return Decoded::Empty;
    };
    if request.command == INSTALL_COMMAND.as_bytes() {
        return Decoded::Install;
    }
    let args = request
        .raw_args
        .iter()
        .map(|raw| translator.translate(raw))
        .collect();
    Decoded::Execute {
        command: OsString::from_vec(request.command.to_vec()),
        args,
    }
}

/// Reads exactly one line. End-of-stream before `\n` is a read failure;
/// bytes after the newline are ignored.
pub async fn read_request_line<R>(reader: &mut R) -> Result<Vec<u8>, HandleError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    reader
        .read_until(b'\n', &mut buf)
        .await
        .map_err(HandleError::Read)?;
    if buf.last() != Some(&b'\n') {
        return Err(HandleError::UnexpectedEof { read: buf.len() });
    }
    Ok(buf)
}
