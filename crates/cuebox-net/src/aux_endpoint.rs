//! Auxiliary HTTP-style endpoint.
//!
//! Accepts `GET /?src=<url-encoded-item>&frames=<n>` and queues the item
//! through a dispatcher shared by all auxiliary requests. Every request gets
//! a status line and is closed.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};

use cuebox_terminal::Dispatcher;
use cuebox_types::error::{CueError, Result};
use percent_encoding::percent_decode_str;

use crate::connection::ReadStatus;

pub(crate) const RESPONSE_OK: &[u8] = b"HTTP/1.0 204 No Content\r\n\r\n";
pub(crate) const RESPONSE_BAD: &[u8] = b"HTTP/1.0 400 Bad Request\r\n\r\n";

const HEADER_END: &[u8] = b"\r\n\r\n";
const SRC_PREFIX: &str = "/?src=";

/// Requests larger than this are rejected.
const MAX_REQUEST_LEN: usize = 8 * 1024;

/// Turn a request head into the tokens to push.
///
/// The path is percent-decoded as a whole before it is split on `&`, so an
/// encoded `&` inside the source still separates arguments.
pub(crate) fn request_tokens(head: &str) -> Result<Vec<String>> {
    let request_line = head.split("\r\n").next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    if parts.next() != Some("GET") {
        return Err(CueError::Parse(format!("unsupported request: {request_line}")));
    }
    let target = parts
        .next()
        .ok_or_else(|| CueError::Parse("request has no target".to_string()))?;
    let decoded = percent_decode_str(target)
        .decode_utf8()
        .map_err(|e| CueError::Parse(format!("invalid request target: {e}")))?;
    let query = decoded
        .strip_prefix(SRC_PREFIX)
        .ok_or_else(|| CueError::Parse(format!("missing src in {decoded}")))?;

    let mut args = query.split('&');
    let src = args.next().unwrap_or_default();
    if src.is_empty() {
        return Err(CueError::Parse("empty src".to_string()));
    }
    let mut tokens = vec![src.to_string()];
    tokens.extend(
        args.filter(|arg| arg.starts_with("frames="))
            .map(str::to_string),
    );
    tokens.push("add".to_string());
    Ok(tokens)
}

/// Push the tokens of one request through `dispatcher`.
///
/// The dispatcher is shared by every request, so each one must leave it
/// idle: a word still collecting arguments is dropped, signals are drained,
/// and either case fails the request.
pub(crate) fn handle_request(dispatcher: &mut Dispatcher, head: &str) -> Result<()> {
    let tokens = request_tokens(head)?;
    let result = tokens.iter().try_for_each(|token| dispatcher.push(token));
    dispatcher.take_output();
    let pending = dispatcher.cancel_pending();
    let signals = dispatcher.take_signals();
    result?;

    if let Some(pending) = pending {
        return Err(CueError::Parse(format!(
            "request left {pending:?} waiting for arguments"
        )));
    }
    if !signals.is_empty() {
        return Err(CueError::Parse(format!(
            "request raised {signals:?}, which the auxiliary endpoint cannot honour"
        )));
    }
    Ok(())
}

/// One auxiliary client: a request being read or a response being sent.
pub(crate) struct AuxConnection {
    stream: TcpStream,
    peer: SocketAddr,
    request: Vec<u8>,
    response: Option<Vec<u8>>,
}

impl AuxConnection {
    pub(crate) fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            request: Vec::new(),
            response: None,
        }
    }

    pub(crate) fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub(crate) fn has_output(&self) -> bool {
        self.response.is_some()
    }

    /// Read a chunk; once the request head is complete, answer it.
    pub(crate) fn read(
        &mut self,
        scratch: &mut [u8],
        dispatcher: &mut Dispatcher,
    ) -> io::Result<ReadStatus> {
        if self.response.is_some() {
            return Ok(ReadStatus::Idle);
        }
        let n = match self.stream.read(scratch) {
            Ok(0) => return Ok(ReadStatus::Closed),
            Ok(n) => n,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
                return Ok(ReadStatus::Idle);
            },
            Err(e) => return Err(e),
        };
        self.request.extend_from_slice(&scratch[..n]);

        if let Some(end) = self.request.windows(4).position(|w| w == HEADER_END) {
            let head = String::from_utf8_lossy(&self.request[..end]).into_owned();
            let response = match handle_request(dispatcher, &head) {
                Ok(()) => {
                    log::info!("{}: queued via auxiliary endpoint", self.peer);
                    RESPONSE_OK
                },
                Err(e) => {
                    log::warn!("{}: auxiliary request failed: {e}", self.peer);
                    RESPONSE_BAD
                },
            };
            self.response = Some(response.to_vec());
        } else if self.request.len() > MAX_REQUEST_LEN {
            log::warn!("{}: auxiliary request too large", self.peer);
            self.response = Some(RESPONSE_BAD.to_vec());
        }
        Ok(ReadStatus::Progress)
    }

    /// Send the response. Returns `Ok(true)` once it is fully written.
    pub(crate) fn flush(&mut self) -> io::Result<bool> {
        let Some(response) = self.response.as_mut() else {
            return Ok(false);
        };
        while !response.is_empty() {
            match self.stream.write(response) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(n) => {
                    response.drain(..n);
                },
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }
}
