//! Entry point for `tcp-file-transfer`.
//!
//! Parses CLI arguments and dispatches into either **send** or **receive**
//! mode.  All transfer work is delegated to library modules; `main.rs` owns
//! only process setup (logging, the Ctrl-C flag, argument and port
//! validation) and the exit-status contract: 1 on usage or configuration
//! errors and fatal receiver failures, 0 on a completed send pass or a clean
//! interrupt-driven receiver shutdown.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use env_logger::Env;

use tcp_file_transfer::{config, receiver::Receiver, sender, shutdown::Shutdown};

/// Whole-file transfer over raw TCP, one connection per file.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Send one or more files to a listening receiver.
    Send {
        /// Receiver IP address (e.g. 127.0.0.1).
        server_ip: String,
        /// Receiver port (1024-65535).
        server_port: u16,
        /// Files to transfer, in order.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Listen for connections, persisting each stream as file-NN.dat.
    Receive {
        /// Listening port (1024-65535).
        port: u16,
        /// Directory to write received files into.
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
}

fn main() {
    // Progress narration is part of the contract, so default to info level;
    // RUST_LOG still overrides.
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            process::exit(parse_exit_code(&e));
        }
    };

    let code = match cli.mode {
        Mode::Send {
            server_ip,
            server_port,
            files,
        } => run_send(&server_ip, server_port, &files),
        Mode::Receive { port, output_dir } => run_receive(port, output_dir),
    };
    process::exit(code);
}

/// Exit status for an argument-parse result.
///
/// `--help` and `--version` are successful outcomes; everything else (bad
/// argument count, unknown flags, unparsable values) is a usage error.
fn parse_exit_code(e: &clap::Error) -> i32 {
    use clap::error::ErrorKind;
    match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

fn run_send(server_ip: &str, server_port: u16, files: &[PathBuf]) -> i32 {
    let port = match config::validate_port(server_port) {
        Ok(port) => port,
        Err(e) => {
            log::error!("{e}");
            return 1;
        }
    };

    let shutdown = Shutdown::new();
    if let Err(e) = shutdown.install_ctrlc() {
        log::error!("failed to install interrupt handler: {e}");
        return 1;
    }

    let delivered = sender::run(server_ip, port, files, &shutdown);
    log::info!("file transfer(s) complete: {delivered} of {} delivered", files.len());

    if shutdown.is_requested() {
        1
    } else {
        0
    }
}

fn run_receive(port: u16, output_dir: PathBuf) -> i32 {
    let port = match config::validate_port(port) {
        Ok(port) => port,
        Err(e) => {
            log::error!("{e}");
            return 1;
        }
    };

    let shutdown = Shutdown::new();
    if let Err(e) = shutdown.install_ctrlc() {
        log::error!("failed to install interrupt handler: {e}");
        return 1;
    }

    // Wildcard bind: accept from any interface.
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    let mut receiver = match Receiver::bind(addr, output_dir) {
        Ok(receiver) => receiver,
        Err(e) => {
            log::error!("{e}");
            return 1;
        }
    };

    log::info!("awaiting TCP connections over port {port}...");
    match receiver.run(&shutdown) {
        Ok(()) => {
            log::info!("shutdown complete");
            0
        }
        Err(e) => {
            log::error!("{e}");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn help_and_version_exit_zero() {
        let err = Cli::try_parse_from(["tcp-file-transfer", "--help"]).unwrap_err();
        assert_eq!(parse_exit_code(&err), 0);
        let err = Cli::try_parse_from(["tcp-file-transfer", "--version"]).unwrap_err();
        assert_eq!(parse_exit_code(&err), 0);
    }

    #[test]
    fn usage_errors_exit_one() {
        // No subcommand at all.
        let err = Cli::try_parse_from(["tcp-file-transfer"]).unwrap_err();
        assert_eq!(parse_exit_code(&err), 1);
        // Missing port and file list.
        let err = Cli::try_parse_from(["tcp-file-transfer", "send", "127.0.0.1"]).unwrap_err();
        assert_eq!(parse_exit_code(&err), 1);
        // Port above the u16 range fails at parse time.
        let err = Cli::try_parse_from(["tcp-file-transfer", "receive", "70000"]).unwrap_err();
        assert_eq!(parse_exit_code(&err), 1);
    }
}
