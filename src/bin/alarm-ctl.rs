//! alarm-ctl - send one arm/disarm command to the alarm daemon
//!
//! # Usage
//!
//! ```text
//! alarm-ctl arm          # manual arm
//! alarm-ctl disarm       # manual disarm
//! alarm-ctl auto-arm     # arm on behalf of an automation
//! alarm-ctl auto-disarm  # disarm only if the alarm was auto-armed
//! ```
//!
//! Prints the resulting status on stdout and exits 0. Any failure prints a
//! message on stderr and exits -1.

use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use acsr_core::AlarmCommand;
use acsr_ctl::{effective_uid, resolve_socket_path, run_command, ControlClient};

/// Send a command to the alarm daemon
#[derive(Parser, Debug)]
#[command(name = "alarm-ctl", version, about)]
struct Args {
    /// Daemon socket (default: $ACSR_SOCKET, then /tmp/alarmd.sock)
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Command to send
    #[arg(value_enum)]
    command: CommandArg,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CommandArg {
    Arm,
    Disarm,
    AutoArm,
    AutoDisarm,
}

impl From<CommandArg> for AlarmCommand {
    fn from(arg: CommandArg) -> Self {
        match arg {
            CommandArg::Arm => AlarmCommand::Arm,
            CommandArg::Disarm => AlarmCommand::Disarm,
            CommandArg::AutoArm => AlarmCommand::AutoArm,
            CommandArg::AutoDisarm => AlarmCommand::AutoDisarm,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let client = ControlClient::new(resolve_socket_path(args.socket));

    match run_command(args.command.into(), effective_uid(), &client).await {
        Ok(status) => println!("{status}"),
        Err(e) => {
            eprintln!("{e}");
            process::exit(-1);
        }
    }
}
