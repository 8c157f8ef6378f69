//! Alarm Daemon - arm/disarm state owner and notification relay
//!
//! This binary runs the control socket server for `alarm-ctl` and the
//! event batching and notification pipeline.
//!
//! # Usage
//!
//! ```bash
//! # Start the daemon (foreground)
//! alarmd start
//!
//! # Start the daemon (background/daemonized) with a config file
//! alarmd start -d --config /etc/acsr/alarmd.toml
//!
//! # Stop the daemon
//! alarmd stop
//!
//! # Check daemon status
//! alarmd status
//! ```

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use acsrd::collector::spawn_collector;
use acsrd::config::{resolve_config_path, AlarmdConfig};
use acsrd::notify::{build_channels, spawn_dispatcher};
use acsrd::server::DaemonServer;
use acsrd::state::{spawn_state_machine, JsonFileStore};

/// How long shutdown waits for queued notifications
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Alarm daemon - central station receiver
#[derive(Parser, Debug)]
#[command(name = "alarmd", version, about)]
struct Args {
    /// Config file (default: $ACSR_CONFIG, then /etc/acsr/alarmd.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon
    Start {
        /// Run as a background daemon (fork to background)
        #[arg(short = 'd', long)]
        daemon: bool,
    },
    /// Stop the running daemon
    Stop,
    /// Show daemon status
    Status,
}

fn state_dir() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("acsr")
}

fn pid_file_path() -> PathBuf {
    state_dir().join("alarmd.pid")
}

fn log_file_path() -> PathBuf {
    state_dir().join("alarmd.log")
}

fn read_pid() -> Option<u32> {
    let path = pid_file_path();
    let mut file = File::open(&path).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

fn write_pid() -> Result<()> {
    let path = pid_file_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create state directory")?;
    }
    let mut file = File::create(&path).context("Failed to create PID file")?;
    write!(file, "{}", process::id()).context("Failed to write PID")?;
    Ok(())
}

fn remove_pid_file() {
    let path = pid_file_path();
    let _ = fs::remove_file(path);
}

fn is_process_running(pid: u32) -> bool {
    PathBuf::from(format!("/proc/{pid}")).exists()
}

fn is_daemon_running() -> Option<u32> {
    if let Some(pid) = read_pid() {
        if is_process_running(pid) {
            return Some(pid);
        }
        remove_pid_file();
    }
    None
}

fn stop_daemon(pid: u32) -> Result<()> {
    let result = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
    if result != 0 {
        bail!("Failed to send SIGTERM to process {pid}");
    }
    Ok(())
}

fn load_config(explicit: Option<PathBuf>) -> Result<AlarmdConfig> {
    let path = resolve_config_path(explicit);
    let mut config = AlarmdConfig::load(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    config.apply_env_overrides();
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let command = args.command.unwrap_or(Command::Start { daemon: false });

    match command {
        Command::Start { daemon } => {
            if let Some(pid) = is_daemon_running() {
                eprintln!("Daemon is already running (PID {pid})");
                eprintln!("Use 'alarmd stop' to stop it first.");
                process::exit(1);
            }

            // Validate before forking so a bad file fails in the terminal
            let config = load_config(args.config)?;

            if daemon {
                daemonize()?;
            }

            write_pid()?;

            let result = run_daemon(config);

            remove_pid_file();

            result
        }
        Command::Stop => {
            if let Some(pid) = is_daemon_running() {
                println!("Stopping daemon (PID {pid})...");
                stop_daemon(pid)?;

                for _ in 0..50 {
                    if !is_process_running(pid) {
                        println!("Daemon stopped.");
                        return Ok(());
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }

                eprintln!("Daemon did not stop within 5 seconds.");
                process::exit(1);
            } else {
                println!("Daemon is not running.");
                Ok(())
            }
        }
        Command::Status => {
            if let Some(pid) = is_daemon_running() {
                println!("Daemon is running (PID {pid})");

                let socket_path = load_config(args.config)
                    .map(|c| c.daemon.socket_path)
                    .unwrap_or_else(|_| PathBuf::from(acsrd::config::DEFAULT_SOCKET_PATH));
                if socket_path.exists() {
                    println!("Socket: {}", socket_path.display());
                }

                Ok(())
            } else {
                println!("Daemon is not running.");
                process::exit(1);
            }
        }
    }
}

fn daemonize() -> Result<()> {
    use daemonize::Daemonize;

    let log_path = log_file_path();

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }

    let stdout = File::create(&log_path).context("Failed to create log file for stdout")?;
    let stderr = stdout
        .try_clone()
        .context("Failed to create log file for stderr")?;

    let daemonize = Daemonize::new()
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr);

    daemonize.start().context("Failed to daemonize")?;

    Ok(())
}

#[tokio::main]
async fn run_daemon(config: AlarmdConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("acsrd=info".parse()?)
                .add_directive("acsr_core=info".parse()?)
                .add_directive("acsr_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "Alarm daemon starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let store = JsonFileStore::new(&config.daemon.state_path);
    let state = spawn_state_machine(store).with_context(|| {
        format!(
            "Failed to load alarm state from {}",
            config.daemon.state_path.display()
        )
    })?;
    if let Some(current) = state.current().await {
        info!(state = %current, "Alarm state machine started");
    }

    let channels = build_channels(&config).context("Failed to build notification channels")?;
    if channels.is_empty() {
        warn!("No notification channels configured; events will only be logged by the collector");
    }

    let (dispatcher, dispatcher_task) = spawn_dispatcher(&config.dispatch, channels);
    let (collector, collector_task) =
        spawn_collector(config.batching.clone(), dispatcher, cancel_token.clone());
    info!("Notification pipeline started");

    let server = DaemonServer::from_settings(&config.daemon, state, cancel_token.clone());

    info!(socket = %server.socket_path().display(), "Starting server");

    let served = server.run().await;
    if let Err(e) = &served {
        error!(error = %e, "Server error");
        cancel_token.cancel();
    }

    // Panel interface detaches here; the collector flushes its partial batch
    drop(collector);
    if let Err(e) = collector_task.await {
        error!(error = %e, "Event collector failed");
    }

    match tokio::time::timeout(DRAIN_TIMEOUT, dispatcher_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Dispatcher failed"),
        Err(_) => warn!("Notification dispatch did not drain in time"),
    }

    served?;
    info!("Alarm daemon stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
    }

    Ok(())
}
