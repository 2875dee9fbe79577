//! Remote shell: forwards each input line to a running server.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use cuebox_net::Client;

/// Forward lines from `input` to `address` and print each reply.
pub fn run(address: &str, mut input: impl BufRead, mut out: impl Write, prompt: Option<&str>) -> Result<()> {
    let mut client = Client::connect(address).with_context(|| format!("cannot reach {address}"))?;
    log::info!("connected to {address}");

    let mut line = String::new();
    loop {
        if let Some(prompt) = prompt {
            write!(out, "{prompt}")?;
            out.flush()?;
        }
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let command = line.trim_end_matches(['\r', '\n']);
        if command.trim().is_empty() {
            continue;
        }
        for reply in client.send(command)? {
            writeln!(out, "{reply}")?;
        }
        out.flush()?;
        if command.trim() == "exit" {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use cuebox_net::Server;
    use cuebox_player::Player;
    use cuebox_types::config::{PlayerConfig, ServerConfig};

    use super::*;

    #[test]
    fn forwards_lines_and_prints_replies() {
        let config = ServerConfig {
            bind: "127.0.0.1".to_string(),
            port: 0,
            aux_endpoint: false,
            poll_interval_ms: 2,
            ..Default::default()
        };
        let server = Server::bind(config, Player::new(PlayerConfig::default()))
            .unwrap()
            .spawn()
            .unwrap();

        let mut out = Vec::new();
        let input = Cursor::new("1 2 + .\n\ndrop\nexit\n4 .\n");
        run(&format!("127.0.0.1:{}", server.port()), input, &mut out, None).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "3\nERROR: stack underflow (drop)\n"
        );
    }

    #[test]
    fn unreachable_server_is_an_error() {
        let tmp = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = tmp.local_addr().unwrap().port();
        drop(tmp);

        let err = run(&format!("127.0.0.1:{port}"), Cursor::new(""), Vec::new(), None).unwrap_err();
        assert!(err.to_string().starts_with("cannot reach"));
    }
}
