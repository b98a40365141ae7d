//! serterm - A line-oriented serial terminal
//!
//! serterm connects to a serial port, prints every received line in the
//! color its ANSI escape codes ask for, and sends what you type back to the
//! device. Traffic can be mirrored to a plain text log.
//!
//! # Quick Start
//!
//! ```text
//! serterm --list                     # Show available ports
//! serterm -p /dev/ttyUSB0 -b 115200  # Connect
//! serterm -p COM3 --cr -l uart.txt   # CRLF line endings, log to uart.txt
//! ```
//!
//! # Commands
//!
//! Lines typed at the prompt are sent as-is. Lines starting with `/` are
//! commands:
//!
//! | Command | Action |
//! |---------|--------|
//! | /connect [port] [baud] | Connect (defaults to the last port/baud) |
//! | /disconnect | Close the port |
//! | /cr on\|off, /lf on\|off | Line endings appended to sent text |
//! | /log PATH, /log on\|off | Traffic log |
//! | /ports | List serial ports |
//! | /clear | Clear the screen |
//! | /quit | Exit |

mod config;
mod core;
mod ui;

use std::env;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::core::log_sink::{LogSettings, LogSink};
use crate::core::session::{ConnectionState, SendPolicy, Session, SessionEvent, SessionOptions};
use crate::core::transport::{self, SerialOpener};
use crate::ui::Renderer;

/// Baud rate used when none is given
const DEFAULT_BAUD: u32 = 9600;

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Command line options
#[derive(Debug, Default, PartialEq)]
struct Args {
    port: Option<String>,
    baud: Option<u32>,
    append_cr: Option<bool>,
    append_lf: Option<bool>,
    log_path: Option<PathBuf>,
    list_ports: bool,
    help: bool,
    version: bool,
}

fn print_help() {
    eprintln!("serterm {} - A line-oriented serial terminal", VERSION);
    eprintln!();
    eprintln!("Usage: serterm [OPTIONS]");
    eprintln!();
    eprintln!("Connection options:");
    eprintln!("  -p, --port <PORT>     Serial port to open at startup");
    eprintln!("  -b, --baud <RATE>     Baud rate (default: {})", DEFAULT_BAUD);
    eprintln!("  -L, --list            List available serial ports and exit");
    eprintln!();
    eprintln!("Send options:");
    eprintln!("  --cr                  Append CR to sent lines");
    eprintln!("  --no-lf               Do not append LF to sent lines");
    eprintln!();
    eprintln!("Logging options:");
    eprintln!("  -l, --log <PATH>      Log traffic to PATH");
    eprintln!();
    eprintln!("Other options:");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Commands: /connect [port] [baud], /disconnect, /cr on|off, /lf on|off,");
    eprintln!("          /log PATH, /log on|off, /ports, /clear, /quit");
    eprintln!();
    eprintln!("Configuration: ~/.serterm/config.toml");
}

fn parse_baud(value: &str) -> Result<u32, String> {
    match value.parse::<u32>() {
        Ok(baud) if baud > 0 => Ok(baud),
        _ => Err("Invalid baud rate. Please enter a valid number.".to_string()),
    }
}

fn parse_args<I>(args: I) -> Result<Args, String>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => parsed.help = true,
            "-v" | "--version" => parsed.version = true,
            "-L" | "--list" => parsed.list_ports = true,
            "-p" | "--port" => {
                let port = args.next().ok_or("Missing port argument")?;
                parsed.port = Some(port);
            }
            "-b" | "--baud" => {
                let baud = args.next().ok_or("Missing baud argument")?;
                parsed.baud = Some(parse_baud(&baud)?);
            }
            "--cr" => parsed.append_cr = Some(true),
            "--no-lf" => parsed.append_lf = Some(false),
            "-l" | "--log" => {
                let path = args.next().ok_or("Missing log path argument")?;
                parsed.log_path = Some(PathBuf::from(path));
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
    }

    Ok(parsed)
}

/// A line typed by the user
#[derive(Debug, PartialEq)]
enum Command {
    Send(String),
    Connect { port: Option<String>, baud: Option<u32> },
    Disconnect,
    CarriageReturn(bool),
    LineFeed(bool),
    LogPath(PathBuf),
    LogEnabled(bool),
    Ports,
    Clear,
    Quit,
}

fn parse_switch(value: Option<&str>) -> Result<bool, String> {
    match value {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        _ => Err("Expected 'on' or 'off'".to_string()),
    }
}

fn parse_command(line: &str) -> Result<Command, String> {
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Send(line.to_string()));
    };

    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or("");
    let command = match name {
        "connect" => {
            let port = words.next().map(str::to_string);
            let baud = words.next().map(parse_baud).transpose()?;
            Command::Connect { port, baud }
        }
        "disconnect" => Command::Disconnect,
        "cr" => Command::CarriageReturn(parse_switch(words.next())?),
        "lf" => Command::LineFeed(parse_switch(words.next())?),
        "log" => match words.next() {
            Some("on") => Command::LogEnabled(true),
            Some("off") => Command::LogEnabled(false),
            Some(path) => Command::LogPath(PathBuf::from(path)),
            None => return Err("Usage: /log PATH | /log on | /log off".to_string()),
        },
        "ports" => Command::Ports,
        "clear" => Command::Clear,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("Unknown command: /{}", other)),
    };
    Ok(command)
}

/// Send diagnostics to `~/.serterm/serterm.log`; the terminal is for traffic
fn init_logging(config: &Config) {
    let log_path = Config::data_dir()
        .map(|dir| dir.join("serterm.log"))
        .unwrap_or_else(|| PathBuf::from("serterm.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_env("SERTERM_LOG")
            .or_else(|_| EnvFilter::try_new(&config.log_level))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

/// Read stdin on its own thread so the main loop can keep draining events
fn spawn_input_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Interactive shell state
struct Shell {
    session: Session,
    renderer: Renderer<std::io::Stdout>,
    last_port: Option<String>,
    last_baud: u32,
}

impl Shell {
    fn render_event(&mut self, event: SessionEvent) -> std::io::Result<()> {
        match event {
            SessionEvent::Line(record) => self.renderer.line(&record),
            SessionEvent::Sent(payload) => self.renderer.sent(&payload),
            SessionEvent::Opened { port, baud } => self
                .renderer
                .status(&format!("Connected to {} at {} baud.", port, baud)),
            SessionEvent::StateChanged(ConnectionState::Disconnected) => {
                self.renderer.status("Disconnected.")
            }
            SessionEvent::StateChanged(_) => Ok(()),
            SessionEvent::Error(e) => self.renderer.error(&e.to_string()),
        }
    }

    /// Handle one input line; returns false to quit
    fn handle_input(&mut self, line: &str) -> std::io::Result<bool> {
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(message) => {
                self.renderer.error(&message)?;
                return Ok(true);
            }
        };

        match command {
            Command::Send(text) => {
                if let Err(e) = self.session.send(&text) {
                    self.renderer.error(&e.to_string())?;
                }
            }
            Command::Connect { port, baud } => {
                if let Some(port) = port {
                    self.last_port = Some(port);
                }
                if let Some(baud) = baud {
                    self.last_baud = baud;
                }
                let port = self.last_port.clone().unwrap_or_default();
                // Failures arrive as an error event
                let _ = self.session.connect(&port, self.last_baud);
            }
            Command::Disconnect => self.session.disconnect(),
            Command::CarriageReturn(on) => {
                let policy = SendPolicy {
                    append_cr: on,
                    ..self.session.send_policy()
                };
                self.session.set_send_policy(policy);
            }
            Command::LineFeed(on) => {
                let policy = SendPolicy {
                    append_lf: on,
                    ..self.session.send_policy()
                };
                self.session.set_send_policy(policy);
            }
            Command::LogPath(path) => {
                self.session.set_logging(true, Some(path.clone()));
                self.renderer
                    .status(&format!("Logging to: {}", path.display()))?;
            }
            Command::LogEnabled(enabled) => {
                let settings = self.session.log_sink().settings();
                if enabled && settings.path.is_none() {
                    self.renderer.error("No log file selected. Use /log PATH")?;
                } else {
                    self.session.set_logging(enabled, None);
                    let state = if enabled { "enabled" } else { "disabled" };
                    self.renderer.status(&format!("Logging {}.", state))?;
                }
            }
            Command::Ports => self.show_ports()?,
            Command::Clear => self.renderer.clear()?,
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    fn show_ports(&mut self) -> std::io::Result<()> {
        match transport::list_ports() {
            Ok(ports) if ports.is_empty() => self.renderer.status("No serial ports found."),
            Ok(ports) => {
                for port in ports {
                    self.renderer.status(&port)?;
                }
                Ok(())
            }
            Err(e) => self.renderer.error(&format!("Error updating ports: {}", e)),
        }
    }
}

fn run(args: Args, config: Config) -> anyhow::Result<()> {
    // Command line overrides the config file
    let mut log_settings = LogSettings::from(&config.log);
    if let Some(path) = args.log_path.clone() {
        log_settings.enabled = true;
        log_settings.path = Some(path);
    }
    let log = Arc::new(LogSink::new(log_settings));

    let mut policy = SendPolicy::from(&config.send);
    if let Some(cr) = args.append_cr {
        policy.append_cr = cr;
    }
    if let Some(lf) = args.append_lf {
        policy.append_lf = lf;
    }

    let (events_tx, events_rx) = mpsc::channel();
    let mut session = Session::new(
        Box::new(SerialOpener),
        SessionOptions::from(&config.serial),
        log,
        events_tx,
    );
    session.set_send_policy(policy);

    let mut shell = Shell {
        session,
        renderer: Renderer::stdout(),
        last_port: args.port.clone(),
        last_baud: args.baud.unwrap_or(DEFAULT_BAUD),
    };

    let settings = shell.session.log_sink().settings();
    if let (true, Some(path)) = (settings.enabled, settings.path) {
        shell
            .renderer
            .status(&format!("Logging to: {}", path.display()))?;
    }

    if let Some(port) = args.port {
        let _ = shell.session.connect(&port, shell.last_baud);
    } else {
        shell
            .renderer
            .status("Not connected. Use /connect PORT [BAUD] or /ports.")?;
    }

    let input = spawn_input_reader();
    loop {
        for event in events_rx.try_iter() {
            shell.render_event(event)?;
        }

        match input.recv_timeout(Duration::from_millis(20)) {
            Ok(line) => {
                if !shell.handle_input(&line)? {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                info!("stdin closed");
                break;
            }
        }
    }

    shell.session.disconnect();
    for event in events_rx.try_iter() {
        shell.render_event(event)?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args(env::args().skip(1)) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    if args.help {
        print_help();
        return Ok(());
    }
    if args.version {
        eprintln!("serterm {}", VERSION);
        return Ok(());
    }

    let config = Config::load();
    init_logging(&config);
    info!("serterm {} starting...", VERSION);

    if args.list_ports {
        match transport::list_ports() {
            Ok(ports) => {
                for port in ports {
                    println!("{}", port);
                }
            }
            Err(e) => {
                error!("Port enumeration failed: {}", e);
                eprintln!("Error updating ports: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    run(args, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, String> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_args() {
        let parsed = args(&["-p", "/dev/ttyUSB0", "-b", "115200", "--cr", "-l", "uart.txt"]).expect("args");
        assert_eq!(parsed.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(parsed.baud, Some(115200));
        assert_eq!(parsed.append_cr, Some(true));
        assert_eq!(parsed.append_lf, None);
        assert_eq!(parsed.log_path, Some(PathBuf::from("uart.txt")));
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(args(&["-b", "fast"]).is_err());
        assert!(args(&["-b", "0"]).is_err());
        assert!(args(&["-p"]).is_err());
        assert!(args(&["--bogus"]).is_err());
    }

    #[test]
    fn test_plain_lines_are_sent() {
        assert_eq!(parse_command("AT+GMR"), Ok(Command::Send("AT+GMR".to_string())));
        assert_eq!(parse_command(""), Ok(Command::Send(String::new())));
    }

    #[test]
    fn test_commands() {
        assert_eq!(
            parse_command("/connect COM3 57600"),
            Ok(Command::Connect {
                port: Some("COM3".to_string()),
                baud: Some(57600)
            })
        );
        assert_eq!(
            parse_command("/connect"),
            Ok(Command::Connect { port: None, baud: None })
        );
        assert_eq!(parse_command("/cr on"), Ok(Command::CarriageReturn(true)));
        assert_eq!(parse_command("/lf off"), Ok(Command::LineFeed(false)));
        assert_eq!(parse_command("/log off"), Ok(Command::LogEnabled(false)));
        assert_eq!(
            parse_command("/log /tmp/uart.txt"),
            Ok(Command::LogPath(PathBuf::from("/tmp/uart.txt")))
        );
        assert_eq!(parse_command("/quit"), Ok(Command::Quit));
    }

    #[test]
    fn test_command_errors() {
        assert!(parse_command("/connect COM3 abc").is_err());
        assert!(parse_command("/cr maybe").is_err());
        assert!(parse_command("/log").is_err());
        assert!(parse_command("/frobnicate").is_err());
    }
}
