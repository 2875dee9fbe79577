//! Runtime configuration loaded from TOML.
//!
//! Every section falls back to its defaults, so an empty file (or no file)
//! yields a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default command port. The auxiliary endpoint listens on `port + 1`.
pub const DEFAULT_PORT: u16 = 55378;

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "CUEBOX_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CueboxConfig {
    pub server: ServerConfig,
    pub player: PlayerConfig,
    pub shell: ShellConfig,
}

/// Connection multiplexer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address both listeners bind to.
    pub bind: String,
    /// Command port.
    pub port: u16,
    /// Whether to open the auxiliary `port + 1` endpoint.
    pub aux_endpoint: bool,
    /// Sleep between event-loop ticks when no socket made progress.
    pub poll_interval_ms: u64,
    /// Bytes read from a socket per readiness event.
    pub read_chunk: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            aux_endpoint: true,
            poll_interval_ms: 10,
            read_chunk: 1024,
        }
    }
}

impl ServerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Port of the auxiliary endpoint, if enabled.
    pub fn aux_port(&self) -> Option<u16> {
        if self.aux_endpoint {
            self.port.checked_add(1)
        } else {
            None
        }
    }
}

/// Playout coordinator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Maximum number of previously played items retained.
    pub history_capacity: usize,
    /// Upper bound on how long `seek` waits for the run loop.
    pub seek_timeout_ms: u64,
    /// Bounded idle wait used while paused or holding the last frame.
    pub idle_wait_ms: u64,
    /// Delivery rate of the pacing sink.
    pub frame_rate: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            history_capacity: 10,
            seek_timeout_ms: 250,
            idle_wait_ms: 100,
            frame_rate: 25,
        }
    }
}

impl PlayerConfig {
    pub fn seek_timeout(&self) -> Duration {
        Duration::from_millis(self.seek_timeout_ms)
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms.max(1))
    }
}

/// Interactive shell settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub prompt: String,
    /// Directories searched by `include` for relative script paths.
    pub include_dirs: Vec<PathBuf>,
    /// Scripts defined before the prompt is shown.
    pub startup: Vec<PathBuf>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: "cuebox> ".to_string(),
            include_dirs: Vec::new(),
            startup: Vec::new(),
        }
    }
}

impl CueboxConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from `explicit`, else from `$CUEBOX_CONFIG`, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        let config = CueboxConfig::default();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.aux_port(), Some(DEFAULT_PORT + 1));
        assert_eq!(config.player.history_capacity, 10);
        assert_eq!(config.player.seek_timeout(), Duration::from_millis(250));
        assert_eq!(config.shell.prompt, "cuebox> ");
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(CueboxConfig::from_toml("").unwrap(), CueboxConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = CueboxConfig::from_toml(
            r#"
            [server]
            port = 9100
            aux_endpoint = false

            [player]
            history_capacity = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.aux_port(), None);
        assert_eq!(config.server.read_chunk, 1024);
        assert_eq!(config.player.history_capacity, 3);
        assert_eq!(config.player.idle_wait_ms, 100);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(CueboxConfig::from_toml("[server\nport = ").is_err());
    }

    #[test]
    fn aux_port_overflow_disables_endpoint() {
        let server = ServerConfig {
            port: u16::MAX,
            ..Default::default()
        };
        assert_eq!(server.aux_port(), None);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[shell]\nprompt = \"> \"\ninclude_dirs = [\"/tmp\"]").unwrap();
        let config = CueboxConfig::load(file.path()).unwrap();
        assert_eq!(config.shell.prompt, "> ");
        assert_eq!(config.shell.include_dirs, vec![PathBuf::from("/tmp")]);
    }

    #[test]
    fn resolve_prefers_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[player]\nframe_rate = 50").unwrap();
        let config = CueboxConfig::resolve(Some(file.path())).unwrap();
        assert_eq!(config.player.frame_rate, 50);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = CueboxConfig::load(Path::new("/nonexistent/cuebox.toml")).unwrap_err();
        assert!(format!("{err}").contains("I/O error"));
    }
}
