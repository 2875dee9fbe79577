//! Connection multiplexer.
//!
//! One thread serves every client. Sockets are non-blocking and polled each
//! tick: accept, then flush queued replies, then read. When a tick makes no
//! progress the loop sleeps for the configured poll interval, so the stop
//! flag is observed promptly without busy-waiting.

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::JoinHandle;

use cuebox_media::StackEngine;
use cuebox_player::Player;
use cuebox_terminal::Dispatcher;
use cuebox_types::backend::Engine;
use cuebox_types::config::ServerConfig;
use cuebox_types::error::Result;

use crate::aux_endpoint::AuxConnection;
use crate::connection::{Connection, ReadStatus};

/// Builds the engine for each new dispatcher.
pub type EngineFactory = Arc<dyn Fn() -> Box<dyn Engine> + Send + Sync>;

/// Remove `indices` from `items`, highest first so the rest stay valid.
fn remove_indices<T>(items: &mut Vec<T>, mut indices: Vec<usize>) {
    indices.sort_unstable();
    indices.dedup();
    for idx in indices.into_iter().rev() {
        items.remove(idx);
    }
}

fn bind_listener(host: &str, port: u16) -> Result<TcpListener> {
    let listener = TcpListener::bind((host, port))?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

/// The command server and, optionally, the auxiliary endpoint.
pub struct Server {
    config: ServerConfig,
    player: Player,
    engines: EngineFactory,
    include_dirs: Vec<PathBuf>,
    listener: TcpListener,
    aux_listener: Option<TcpListener>,
    /// Shared by every auxiliary request; created on first use.
    aux_dispatcher: Option<Dispatcher>,
    connections: Vec<Connection>,
    aux_connections: Vec<AuxConnection>,
    connection_count: Arc<AtomicUsize>,
    /// Read buffer shared by every socket, `read_chunk` bytes long.
    scratch: Vec<u8>,
}

impl Server {
    /// Bind the command port and, when enabled, `port + 1`.
    pub fn bind(config: ServerConfig, player: Player) -> Result<Self> {
        let listener = bind_listener(&config.bind, config.port)?;
        log::info!("command server listening on {}", listener.local_addr()?);

        let aux_listener = match config.aux_port() {
            Some(port) => {
                let aux = bind_listener(&config.bind, port)?;
                log::info!("auxiliary endpoint listening on {}", aux.local_addr()?);
                Some(aux)
            },
            None => None,
        };

        let scratch = vec![0u8; config.read_chunk.max(1)];
        Ok(Self {
            config,
            player,
            engines: Arc::new(|| Box::new(StackEngine::default()) as Box<dyn Engine>),
            include_dirs: Vec::new(),
            listener,
            aux_listener,
            aux_dispatcher: None,
            connections: Vec::new(),
            aux_connections: Vec::new(),
            connection_count: Arc::new(AtomicUsize::new(0)),
            scratch,
        })
    }

    /// Use `factory` for the engines of new connections.
    pub fn with_engine_factory(mut self, factory: EngineFactory) -> Self {
        self.engines = factory;
        self
    }

    /// Directories searched by `include` on every connection.
    pub fn with_include_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.include_dirs = dirs;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn aux_addr(&self) -> Option<SocketAddr> {
        self.aux_listener
            .as_ref()
            .and_then(|listener| listener.local_addr().ok())
    }

    /// Number of open command connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn new_dispatcher(&self) -> Dispatcher {
        let mut dispatcher = Dispatcher::new(self.player.clone(), (self.engines)());
        dispatcher.set_include_dirs(self.include_dirs.clone());
        dispatcher
    }

    /// Run one accept/write/read pass. Returns whether anything happened.
    pub fn tick(&mut self) -> bool {
        let mut progress = self.accept();
        progress |= self.write_phase();
        progress |= self.read_phase();
        self.connection_count
            .store(self.connections.len(), Ordering::Relaxed);
        progress
    }

    fn accept(&mut self) -> bool {
        let mut progress = false;

        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    progress = true;
                    if let Err(e) = stream.set_nonblocking(true) {
                        log::warn!("{peer}: cannot make socket non-blocking: {e}");
                        continue;
                    }
                    log::info!("client connected: {peer}");
                    let dispatcher = self.new_dispatcher();
                    self.connections
                        .push(Connection::new(stream, peer, dispatcher));
                },
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::warn!("accept error: {e}");
                    break;
                },
            }
        }

        if let Some(listener) = &self.aux_listener {
            loop {
                match listener.accept() {
                    Ok((stream, peer)) => {
                        progress = true;
                        if let Err(e) = stream.set_nonblocking(true) {
                            log::warn!("{peer}: cannot make socket non-blocking: {e}");
                            continue;
                        }
                        log::debug!("auxiliary client connected: {peer}");
                        self.aux_connections.push(AuxConnection::new(stream, peer));
                    },
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) => {
                        log::warn!("auxiliary accept error: {e}");
                        break;
                    },
                }
            }
        }

        progress
    }

    fn write_phase(&mut self) -> bool {
        let mut progress = false;

        let mut to_remove = Vec::new();
        for (idx, conn) in self.connections.iter_mut().enumerate() {
            if conn.has_output() {
                match conn.flush() {
                    Ok(wrote) => progress |= wrote,
                    Err(e) => {
                        log::info!("client {} dropped: send failed: {e}", conn.peer());
                        to_remove.push(idx);
                        continue;
                    },
                }
            }
            if conn.is_finished() {
                log::info!("client {} closed", conn.peer());
                to_remove.push(idx);
            }
        }
        progress |= !to_remove.is_empty();
        remove_indices(&mut self.connections, to_remove);

        let mut to_remove = Vec::new();
        for (idx, conn) in self.aux_connections.iter_mut().enumerate() {
            if !conn.has_output() {
                continue;
            }
            match conn.flush() {
                Ok(true) => {
                    progress = true;
                    to_remove.push(idx);
                },
                Ok(false) => {},
                Err(e) => {
                    log::debug!("auxiliary client {} dropped: {e}", conn.peer());
                    to_remove.push(idx);
                },
            }
        }
        remove_indices(&mut self.aux_connections, to_remove);

        progress
    }

    fn read_phase(&mut self) -> bool {
        let mut progress = false;

        let mut to_remove = Vec::new();
        for (idx, conn) in self.connections.iter_mut().enumerate() {
            match conn.read(&mut self.scratch) {
                Ok(ReadStatus::Idle) => {},
                Ok(ReadStatus::Progress) => progress = true,
                Ok(ReadStatus::Closed) => {
                    log::info!("client disconnected: {}", conn.peer());
                    progress = true;
                    to_remove.push(idx);
                },
                Err(e) => {
                    log::info!("client {} dropped: read failed: {e}", conn.peer());
                    to_remove.push(idx);
                },
            }
        }
        remove_indices(&mut self.connections, to_remove);

        if self.aux_dispatcher.is_none() && !self.aux_connections.is_empty() {
            self.aux_dispatcher = Some(self.new_dispatcher());
        }
        if let Some(dispatcher) = self.aux_dispatcher.as_mut() {
            let mut to_remove = Vec::new();
            for (idx, conn) in self.aux_connections.iter_mut().enumerate() {
                match conn.read(&mut self.scratch, dispatcher) {
                    Ok(ReadStatus::Idle) => {},
                    Ok(ReadStatus::Progress) => progress = true,
                    Ok(ReadStatus::Closed) => {
                        progress = true;
                        to_remove.push(idx);
                    },
                    Err(e) => {
                        log::debug!("auxiliary client {} dropped: {e}", conn.peer());
                        to_remove.push(idx);
                    },
                }
            }
            remove_indices(&mut self.aux_connections, to_remove);
        }

        progress
    }

    /// Serve until `stop` is set.
    pub fn run(&mut self, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            if !self.tick() {
                std::thread::sleep(self.config.poll_interval());
            }
        }
        log::info!(
            "server stopped, closing {} connection(s)",
            self.connections.len() + self.aux_connections.len()
        );
        self.connections.clear();
        self.aux_connections.clear();
        self.connection_count.store(0, Ordering::Relaxed);
    }

    /// Move the server onto its own thread.
    pub fn spawn(mut self) -> Result<ServerHandle> {
        let port = self.local_addr()?.port();
        let aux_port = self.aux_addr().map(|addr| addr.port());
        let stop = Arc::new(AtomicBool::new(false));
        let connections = Arc::clone(&self.connection_count);

        let thread_stop = Arc::clone(&stop);
        let thread = std::thread::Builder::new()
            .name("cuebox-server".to_string())
            .spawn(move || self.run(&thread_stop))?;

        Ok(ServerHandle {
            stop,
            connections,
            port,
            aux_port,
            thread: Some(thread),
        })
    }
}

/// Owner's view of a spawned [`Server`]. Dropping it stops the server.
pub struct ServerHandle {
    stop: Arc<AtomicBool>,
    connections: Arc<AtomicUsize>,
    port: u16,
    aux_port: Option<u16>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn aux_port(&self) -> Option<u16> {
        self.aux_port
    }

    /// Open command connections as of the last tick.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Ask the event loop to stop and wait for it.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            log::error!("server thread panicked");
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("port", &self.port)
            .field("aux_port", &self.aux_port)
            .field("connections", &self.connection_count())
            .finish()
    }
}
