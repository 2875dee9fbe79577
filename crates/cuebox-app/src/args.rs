//! Command-line parsing.

use std::path::PathBuf;

use anyhow::{Result, bail};

pub const USAGE: &str = "\
usage: cuebox [options] [script...]

options:
  --config <path>        configuration file (default: $CUEBOX_CONFIG)
  --server <port>        start the network server on <port> (auxiliary on port + 1)
  --connect <host[:port]> run a remote shell against a running server
  -h, --help             show this message

Scripts are run in order before the prompt appears.";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Args {
    pub config: Option<PathBuf>,
    pub server: Option<u16>,
    pub connect: Option<String>,
    pub scripts: Vec<PathBuf>,
    pub help: bool,
}

/// Parse arguments, excluding the program name.
pub fn parse<I>(args: I) -> Result<Args>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => parsed.help = true,
            "--config" => parsed.config = Some(PathBuf::from(value(&mut args, &arg)?)),
            "--server" => {
                let port = value(&mut args, &arg)?;
                match port.parse::<u16>() {
                    Ok(port) if port != 0 => parsed.server = Some(port),
                    _ => bail!("invalid port for --server: {port}"),
                }
            },
            "--connect" => parsed.connect = Some(value(&mut args, &arg)?),
            flag if flag.starts_with("--") => bail!("unknown option {flag}"),
            _ => parsed.scripts.push(PathBuf::from(arg)),
        }
    }

    if parsed.connect.is_some() && parsed.server.is_some() {
        bail!("--connect and --server cannot be combined");
    }
    Ok(parsed)
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    match args.next() {
        Some(value) => Ok(value),
        None => bail!("{flag} needs a value"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_strs(args: &[&str]) -> Result<Args> {
        parse(args.iter().map(|a| a.to_string()))
    }

    #[test]
    fn no_arguments() {
        assert_eq!(parse_strs(&[]).unwrap(), Args::default());
    }

    #[test]
    fn options_and_scripts() {
        let args = parse_strs(&["--config", "c.toml", "a.cue", "--server", "9100", "b.cue"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("c.toml")));
        assert_eq!(args.server, Some(9100));
        assert_eq!(
            args.scripts,
            vec![PathBuf::from("a.cue"), PathBuf::from("b.cue")]
        );
    }

    #[test]
    fn connect_mode() {
        let args = parse_strs(&["--connect", "media1:9100"]).unwrap();
        assert_eq!(args.connect.as_deref(), Some("media1:9100"));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_strs(&["--server"]).is_err());
        assert!(parse_strs(&["--server", "0"]).is_err());
        assert!(parse_strs(&["--server", "99999"]).is_err());
        assert!(parse_strs(&["--verbose"]).is_err());
        assert!(parse_strs(&["--connect", "a", "--server", "1"]).is_err());
    }

    #[test]
    fn help_flag() {
        assert!(parse_strs(&["-h"]).unwrap().help);
    }
}
