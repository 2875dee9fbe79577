//! cuebox -- interactive playout shell.
//!
//! Runs the local shell against an in-process player, optionally serving the
//! command protocol on the network, or acts as a remote shell for a running
//! instance with `--connect`.

mod args;
mod remote;
mod shell;

use std::io::{self, IsTerminal};

use anyhow::Result;
use cuebox_media::ClockStore;
use cuebox_player::Player;
use cuebox_types::backend::Store;
use cuebox_types::config::CueboxConfig;

use crate::shell::Shell;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = args::parse(std::env::args().skip(1))?;
    if args.help {
        println!("{}", args::USAGE);
        return Ok(());
    }

    let config = CueboxConfig::resolve(args.config.as_deref())?;
    let interactive = io::stdin().is_terminal();

    if let Some(address) = &args.connect {
        let prompt = interactive.then_some(config.shell.prompt.as_str());
        return remote::run(address, io::stdin().lock(), io::stdout(), prompt);
    }

    log::info!("cuebox starting");
    let stores: Vec<Box<dyn Store>> = vec![Box::new(ClockStore::new(config.player.frame_rate))];
    let player = Player::with_stores(config.player.clone(), stores);
    player.start()?;
    let guard = player.control();

    let mut shell = Shell::new(config.clone(), player.clone(), io::stdout());
    if let Some(port) = args.server {
        let port = shell.start_server(port)?;
        log::info!("Server is started on port {port}.");
    }

    for script in config.shell.startup.iter().chain(args.scripts.iter()) {
        shell.run_script(script)?;
        if shell.is_done() {
            break;
        }
    }
    if !shell.is_done() {
        shell.interact(io::stdin().lock(), interactive)?;
    }

    shell.shutdown();
    drop(guard);
    player.shutdown();
    log::info!("cuebox stopped");
    Ok(())
}
