//! End-to-end tests: `ControlClient` against a real daemon server.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::path::PathBuf;
use std::time::Duration;

use acsr_core::{AlarmCommand, AlarmState, Provenance};
use acsr_ctl::{run_command, ControlClient, CtlError};
use acsrd::server::DaemonServer;
use acsrd::state::{spawn_state_machine, MemoryStore, StateHandle};
use tempfile::TempDir;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

struct Daemon {
    socket_path: PathBuf,
    state: StateHandle,
    store: MemoryStore,
    cancel_token: CancellationToken,
    _temp_dir: TempDir,
}

impl Daemon {
    async fn start() -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let socket_path = temp_dir.path().join("alarmd.sock");
        let store = MemoryStore::new();
        let state = spawn_state_machine(store.clone()).unwrap();
        let cancel_token = CancellationToken::new();

        let server = DaemonServer::new(socket_path.clone(), state.clone(), cancel_token.clone());
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        for _ in 0..50 {
            if socket_path.exists() {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert!(socket_path.exists(), "daemon socket did not appear");

        Self {
            socket_path,
            state,
            store,
            cancel_token,
            _temp_dir: temp_dir,
        }
    }

    fn client(&self) -> ControlClient {
        ControlClient::new(&self.socket_path)
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

#[tokio::test]
async fn test_auto_cycle() {
    let daemon = Daemon::start().await;
    let client = daemon.client();

    assert_eq!(run_command(AlarmCommand::AutoArm, 0, &client).await.unwrap(), "armed");
    assert_eq!(
        daemon.state.current().await,
        Some(AlarmState::Armed(Provenance::Auto))
    );

    assert_eq!(
        run_command(AlarmCommand::AutoDisarm, 0, &client).await.unwrap(),
        "disarmed"
    );
    assert_eq!(daemon.store.stored(), Some(AlarmState::Disarmed));
}

#[tokio::test]
async fn test_manual_arm_survives_auto_disarm() {
    let daemon = Daemon::start().await;
    let client = daemon.client();

    assert_eq!(run_command(AlarmCommand::Arm, 0, &client).await.unwrap(), "armed");
    assert_eq!(
        run_command(AlarmCommand::AutoDisarm, 0, &client).await.unwrap(),
        "skipped"
    );
    assert_eq!(
        daemon.state.current().await,
        Some(AlarmState::Armed(Provenance::Manual))
    );
    assert_eq!(run_command(AlarmCommand::Disarm, 0, &client).await.unwrap(), "disarmed");
}

#[tokio::test]
async fn test_persist_failure_reported() {
    let daemon = Daemon::start().await;
    daemon.store.set_fail_saves(true);

    let result = run_command(AlarmCommand::Arm, 0, &daemon.client()).await;
    match result {
        Err(CtlError::Rejected(text)) => assert_eq!(text, "state persist failed"),
        other => panic!("expected Rejected, got {other:?}"),
    }
    assert_eq!(daemon.state.current().await, Some(AlarmState::Disarmed));
}

#[tokio::test]
async fn test_untrusted_caller_leaves_state_alone() {
    let daemon = Daemon::start().await;

    let result = run_command(AlarmCommand::Arm, 1000, &daemon.client()).await;
    assert!(matches!(result, Err(CtlError::Privilege { .. })));
    assert!(daemon.store.history().is_empty());
}
