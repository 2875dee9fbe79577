//! Blocking line client for the command protocol.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

use cuebox_types::config::DEFAULT_PORT;
use cuebox_types::error::{CueError, Result};

use crate::connection::{REPLY_ERROR, REPLY_OK};

/// Split `host[:port]`, falling back to the default port.
pub fn parse_address(address: &str) -> (String, u16) {
    if let Some((host, port)) = address.rsplit_once(':')
        && let Ok(port) = port.parse::<u16>()
    {
        return (host.to_string(), port);
    }
    (address.to_string(), DEFAULT_PORT)
}

/// Sends one command line at a time and waits for its reply.
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Client {
    /// Connect to `host[:port]`.
    pub fn connect(address: &str) -> Result<Self> {
        let (host, port) = parse_address(address);
        let stream = TcpStream::connect((host.as_str(), port))
            .map_err(|e| CueError::Connection(format!("connect to {host}:{port}: {e}")))?;
        log::debug!("connected to {host}:{port}");
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
        })
    }

    /// Bound how long [`Client::send`] waits for each reply line.
    pub fn set_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.writer.set_read_timeout(timeout)?;
        Ok(())
    }

    /// Send `line` and collect the reply.
    ///
    /// Output lines are returned in order. A closing `OK` is dropped; an
    /// `ERROR: ...` line is kept as the last entry.
    pub fn send(&mut self, line: &str) -> Result<Vec<String>> {
        if line.contains(['\r', '\n']) {
            return Err(CueError::Parse("command must be a single line".to_string()));
        }
        self.writer.write_all(format!("{line}\r\n").as_bytes())?;
        self.writer.flush()?;

        let mut lines = Vec::new();
        let mut buf = String::new();
        loop {
            buf.clear();
            if self.reader.read_line(&mut buf)? == 0 {
                return Err(CueError::Connection("connection closed by server".to_string()));
            }
            let reply = buf.trim_end_matches(['\r', '\n']);
            if reply == REPLY_OK {
                break;
            }
            let failed = reply.starts_with(REPLY_ERROR.trim_end());
            lines.push(reply.to_string());
            if failed {
                break;
            }
        }
        Ok(lines)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("peer", &self.writer.peer_addr().ok())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_with_port() {
        assert_eq!(parse_address("media1:9100"), ("media1".to_string(), 9100));
    }

    #[test]
    fn address_without_port() {
        assert_eq!(
            parse_address("localhost"),
            ("localhost".to_string(), DEFAULT_PORT)
        );
    }

    #[test]
    fn address_with_bad_port() {
        assert_eq!(
            parse_address("host:http"),
            ("host:http".to_string(), DEFAULT_PORT)
        );
    }
}
