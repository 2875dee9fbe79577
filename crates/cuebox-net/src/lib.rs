//! Networking: the connection multiplexer serving the command protocol,
//! the auxiliary queueing endpoint, and a blocking client.
//!
//! The command protocol is line based. Each CRLF-terminated line is defined
//! through the connection's own dispatcher; its output lines are followed by
//! exactly one `OK` or `ERROR: <message>` line.

mod aux_endpoint;
mod client;
mod connection;
mod server;

pub use client::{Client, parse_address};
pub use connection::{REPLY_ERROR, REPLY_OK};
pub use server::{EngineFactory, Server, ServerHandle};

#[cfg(test)]
mod tests;
