//! Error types for cuebox.

use std::io;

/// Errors produced by the cuebox framework.
#[derive(Debug, thiserror::Error)]
pub enum CueError {
    /// Malformed tokenization of an input line.
    #[error("parse error: {0}")]
    Parse(String),

    /// The engine or a recognized word reported non-success for a token.
    #[error("{message} ({token})")]
    Command { token: String, message: String },

    /// Socket-level failure on a single connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// A bounded wait expired before it was acknowledged.
    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("media error: {0}")]
    Media(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CueError {
    /// Build a command error for `token`.
    pub fn command(token: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Command {
            token: token.into(),
            message: message.into(),
        }
    }

    /// Whether the error only affects the line being interpreted.
    pub fn is_line_scoped(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Command { .. })
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, CueError>;
