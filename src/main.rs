//! sshline - an interactive SSH client for the terminal
//!
//! sshline opens a password-authenticated shell on a remote host and shows
//! it in two ways. Ordinary command output lands in a scrollback above a
//! locally edited prompt line. Full-screen programs (vim, top, less) switch
//! the view to raw passthrough, where every key goes straight to the remote
//! pty, and back again when they exit.
//!
//! # Quick Start
//!
//! ```text
//! sshline                      # Empty login form
//! sshline -H 10.0.0.5 -u admin # Prefilled host and user
//! sshline admin@10.0.0.5:2222  # Same, as a destination
//! ```
//!
//! # Keys
//!
//! | Key | Action |
//! |-----|--------|
//! | Enter | Send the input line |
//! | PageUp/PageDown | Scroll the output |
//! | Ctrl+C | Interrupt the remote command |
//! | Ctrl+D | End of input |
//! | Ctrl+Q | Quit |

mod app;
mod config;
mod core;
mod ui;

use std::env;
use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use crossterm::terminal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::app::App;
use crate::config::Config;

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Command-line overrides for the config file
#[derive(Debug, Default, PartialEq)]
struct Args {
    host: Option<String>,
    port: Option<String>,
    user: Option<String>,
    log_level: Option<String>,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if self.host.is_some() {
            config.host = self.host;
        }
        if self.port.is_some() {
            config.port = self.port;
        }
        if self.user.is_some() {
            config.user = self.user;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
    }
}

fn print_version() {
    eprintln!("sshline {}", VERSION);
}

fn print_help() {
    eprintln!("sshline {} - interactive SSH client", VERSION);
    eprintln!();
    eprintln!("Usage: sshline [OPTIONS] [[USER@]HOST[:PORT]]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -H, --host <HOST>     Prefill the host field");
    eprintln!("  -p, --port <PORT>     Prefill the port field (default 22)");
    eprintln!("  -u, --user <USER>     Prefill the user field");
    eprintln!("  --log-level <LEVEL>   trace, debug, info, warn or error");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Session keys:");
    eprintln!("  Enter                 Send the input line");
    eprintln!("  PageUp/PageDown       Scroll output");
    eprintln!("  Ctrl+C                Interrupt remote command");
    eprintln!("  Ctrl+D                End of input");
    eprintln!("  Ctrl+Q                Quit");
    eprintln!();
    eprintln!("Configuration: ~/.sshline/config.toml");
    eprintln!("Log file:      ~/.sshline/sshline.log");
}

/// Parse `[user@]host[:port]`
fn parse_destination(dest: &str, args: &mut Args) {
    let rest = match dest.rsplit_once('@') {
        Some((user, rest)) => {
            args.user = Some(user.to_string());
            rest
        }
        None => dest,
    };
    match rest.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => {
            args.host = Some(host.to_string());
            args.port = Some(port.to_string());
        }
        _ => args.host = Some(rest.to_string()),
    }
}

fn parse_args(argv: &[String]) -> Result<Args, String> {
    let mut args = Args::default();
    let mut i = 0;

    while i < argv.len() {
        let flag = argv[i].as_str();
        match flag {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-H" | "--host" | "-p" | "--port" | "-u" | "--user" | "--log-level" => {
                i += 1;
                let value = argv
                    .get(i)
                    .ok_or_else(|| format!("Missing value for {}", flag))?
                    .clone();
                match flag {
                    "-H" | "--host" => args.host = Some(value),
                    "-p" | "--port" => {
                        if value.parse::<u16>().is_err() {
                            return Err(format!("Invalid port: {}", value));
                        }
                        args.port = Some(value);
                    }
                    "-u" | "--user" => args.user = Some(value),
                    _ => args.log_level = Some(value),
                }
            }
            other if other.starts_with('-') => {
                return Err(format!("Unknown option: {}", other));
            }
            dest => parse_destination(dest, &mut args),
        }
        i += 1;
    }

    Ok(args)
}

fn init_logging(level: &str) {
    let Some(dir) = config::data_dir() else {
        return;
    };
    let _ = fs::create_dir_all(&dir);

    let Ok(file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("sshline.log"))
    else {
        return;
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> anyhow::Result<()> {
    let argv: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: {}; using defaults", e);
        Config::default()
    });
    args.apply(&mut config);

    init_logging(&config.log_level);
    info!("sshline {} starting", VERSION);

    let size = terminal::size().unwrap_or((80, 24));
    let mut app = App::new(config, size);

    app.renderer_mut().init()?;
    let result = app.run();
    let _ = app.renderer_mut().cleanup();

    if let Err(e) = &result {
        error!("fatal: {:#}", e);
    }
    result
}
