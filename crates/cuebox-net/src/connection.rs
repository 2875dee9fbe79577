//! Per-client state of the command protocol.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};

use cuebox_terminal::{Dispatcher, Signal};

/// Reply closing a successful line.
pub const REPLY_OK: &str = "OK";

/// Prefix of a failure reply.
pub const REPLY_ERROR: &str = "ERROR: ";

/// Maximum bytes buffered without a line terminator.
const MAX_LINE_LEN: usize = 64 * 1024;

/// Remove every complete CRLF-terminated line from `buf`.
///
/// The unterminated remainder stays in the buffer.
pub(crate) fn extract_lines(buf: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buf.windows(2).position(|w| w == b"\r\n") {
        let line: Vec<u8> = buf.drain(..pos + 2).collect();
        lines.push(String::from_utf8_lossy(&line[..pos]).into_owned());
    }
    lines
}

/// Dispatch one line, returning its output lines and the reply line.
///
/// `Signal::StartServer` is refused here: only the shell owns a server.
/// Returns `true` as the second element when the client asked to leave.
pub(crate) fn dispatch_line(dispatcher: &mut Dispatcher, line: &str) -> (Vec<String>, bool) {
    let result = dispatcher.define(line);
    let mut lines = dispatcher.take_output();
    let mut refused = None;
    let mut exit = false;
    for signal in dispatcher.take_signals() {
        match signal {
            Signal::StartServer { port } => {
                refused = Some(format!("server {port} is only available from the shell"));
            },
            Signal::Exit => exit = true,
        }
    }
    let reply = match (result, refused) {
        (Err(e), _) => format!("{REPLY_ERROR}{e}"),
        (Ok(()), Some(message)) => format!("{REPLY_ERROR}{message}"),
        (Ok(()), None) => REPLY_OK.to_string(),
    };
    lines.push(reply);
    (lines, exit)
}

/// What a read did to the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadStatus {
    /// Nothing was available.
    Idle,
    /// Data was read and dispatched.
    Progress,
    /// The peer closed the connection.
    Closed,
}

/// A connected client with its own dispatcher.
pub(crate) struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Dispatcher,
    read_buf: Vec<u8>,
    write_buf: Vec<u8>,
    /// Set by `exit`: close once the reply has been sent.
    closing: bool,
}

impl Connection {
    pub(crate) fn new(stream: TcpStream, peer: SocketAddr, dispatcher: Dispatcher) -> Self {
        Self {
            stream,
            peer,
            dispatcher,
            read_buf: Vec::with_capacity(256),
            write_buf: Vec::new(),
            closing: false,
        }
    }

    pub(crate) fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub(crate) fn has_output(&self) -> bool {
        !self.write_buf.is_empty()
    }

    /// Whether the connection asked to close and has nothing left to send.
    pub(crate) fn is_finished(&self) -> bool {
        self.closing && self.write_buf.is_empty()
    }

    fn queue(&mut self, line: &str) {
        self.write_buf.extend_from_slice(line.as_bytes());
        self.write_buf.extend_from_slice(b"\r\n");
    }

    /// Read into `scratch` and dispatch any complete lines.
    pub(crate) fn read(&mut self, scratch: &mut [u8]) -> io::Result<ReadStatus> {
        if self.closing {
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
        self.read_buf.extend_from_slice(&scratch[..n]);

        for line in extract_lines(&mut self.read_buf) {
            if line.is_empty() {
                continue;
            }
            log::debug!("{}: {line}", self.peer);
            let (replies, exit) = dispatch_line(&mut self.dispatcher, &line);
            for reply in &replies {
                self.queue(reply);
            }
            if exit {
                log::info!("{} requested exit", self.peer);
                self.closing = true;
                self.read_buf.clear();
                break;
            }
        }

        if self.read_buf.len() > MAX_LINE_LEN {
            log::warn!("{}: discarding overlong line", self.peer);
            self.read_buf.clear();
            self.queue(&format!("{REPLY_ERROR}line too long"));
        }
        Ok(ReadStatus::Progress)
    }

    /// Send as much queued output as the socket accepts.
    ///
    /// Returns whether any bytes were written.
    pub(crate) fn flush(&mut self) -> io::Result<bool> {
        let mut progress = false;
        while !self.write_buf.is_empty() {
            match self.stream.write(&self.write_buf) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(n) => {
                    self.write_buf.drain(..n);
                    progress = true;
                },
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
                Err(e) => return Err(e),
            }
        }
        Ok(progress)
    }
}
