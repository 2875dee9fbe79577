//! The local interactive shell.
//!
//! Owns the shell's dispatcher and, once started, the network server. Every
//! line is defined against the dispatcher, its output is printed, and any
//! signals the words raised are acted on before the next prompt.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::Result;
use cuebox_net::{Server, ServerHandle};
use cuebox_player::Player;
use cuebox_terminal::{Dispatcher, Signal};
use cuebox_types::config::{CueboxConfig, ServerConfig};

pub struct Shell<W: Write> {
    config: CueboxConfig,
    dispatcher: Dispatcher,
    server: Option<ServerHandle>,
    out: W,
    done: bool,
}

impl<W: Write> Shell<W> {
    pub fn new(config: CueboxConfig, player: Player, out: W) -> Self {
        let mut dispatcher = Dispatcher::with_stack_engine(player);
        dispatcher.set_include_dirs(config.shell.include_dirs.clone());
        Self {
            config,
            dispatcher,
            server: None,
            out,
            done: false,
        }
    }

    /// Whether `exit` was seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn server(&self) -> Option<&ServerHandle> {
        self.server.as_ref()
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Define one line and print what it produced.
    pub fn run_line(&mut self, line: &str) -> Result<()> {
        let result = self.dispatcher.define(line);
        self.finish(result)
    }

    /// Run a script file through `include`.
    pub fn run_script(&mut self, path: &Path) -> Result<()> {
        let result = self.dispatcher.include(&path.to_string_lossy());
        self.finish(result)
    }

    fn finish(&mut self, result: cuebox_types::error::Result<()>) -> Result<()> {
        for line in self.dispatcher.take_output() {
            writeln!(self.out, "{line}")?;
        }
        if let Err(e) = result {
            writeln!(self.out, "ERROR: {e}")?;
        }
        for signal in self.dispatcher.take_signals() {
            self.process_signal(signal)?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn process_signal(&mut self, signal: Signal) -> Result<()> {
        match signal {
            Signal::StartServer { port } => match self.start_server(port) {
                Ok(port) => writeln!(self.out, "Server is started on port {port}.")?,
                Err(e) => writeln!(self.out, "ERROR: {e}")?,
            },
            Signal::Exit => self.done = true,
        }
        Ok(())
    }

    /// Start the network server on `port`. Only one may run at a time.
    pub fn start_server(&mut self, port: u16) -> Result<u16> {
        if let Some(server) = &self.server
            && server.is_running()
        {
            anyhow::bail!("server is already running on port {}", server.port());
        }
        let config = ServerConfig {
            port,
            ..self.config.server.clone()
        };
        let handle = Server::bind(config, self.dispatcher.player().clone())
            .map_err(|e| anyhow::anyhow!("server failed to start on port {port}: {e}"))?
            .with_include_dirs(self.config.shell.include_dirs.clone())
            .spawn()?;
        let port = handle.port();
        self.server = Some(handle);
        Ok(port)
    }

    /// Read lines until end of input or `exit`.
    pub fn interact(&mut self, mut input: impl BufRead, show_prompt: bool) -> Result<()> {
        let mut line = String::new();
        while !self.done {
            if show_prompt {
                write!(self.out, "{}", self.config.shell.prompt)?;
                self.out.flush()?;
            }
            line.clear();
            if input.read_line(&mut line)? == 0 {
                break;
            }
            self.run_line(line.trim_end_matches(['\r', '\n']))?;
        }
        Ok(())
    }

    /// Stop the server, if any.
    pub fn shutdown(&mut self) {
        if let Some(mut server) = self.server.take() {
            log::info!("stopping server on port {}", server.port());
            server.stop();
        }
    }
}
