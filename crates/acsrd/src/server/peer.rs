//! Peer credential check for control connections.

use tokio::net::UnixStream;
use tracing::warn;

use crate::config::DaemonSettings;

use super::ConnectionError;

/// Effective uid of the daemon process.
pub fn effective_uid() -> u32 {
    unsafe { libc::geteuid() }
}

/// Which peers may issue commands over the control socket.
///
/// A peer is trusted when its uid is listed in `trusted_uids` or equals the
/// daemon's own effective uid. With verification off every peer is trusted
/// and the socket file permissions are the only gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerPolicy {
    verify: bool,
    trusted_uids: Vec<u32>,
    own_uid: u32,
}

impl PeerPolicy {
    pub fn new(verify: bool, trusted_uids: Vec<u32>) -> Self {
        Self {
            verify,
            trusted_uids,
            own_uid: effective_uid(),
        }
    }

    pub fn from_settings(settings: &DaemonSettings) -> Self {
        Self::new(settings.verify_peer, settings.trusted_uids.clone())
    }

    /// Policy that rejects every peer, including the daemon's own uid.
    #[cfg(test)]
    pub(crate) fn trusting_nobody() -> Self {
        Self {
            verify: true,
            trusted_uids: Vec::new(),
            own_uid: u32::MAX,
        }
    }

    pub fn is_trusted(&self, uid: u32) -> bool {
        !self.verify || uid == self.own_uid || self.trusted_uids.contains(&uid)
    }

    /// Reads the peer's credentials and applies the policy.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::PermissionDenied` for an untrusted uid
    /// - `ConnectionError::Io` if the credentials cannot be read
    pub fn check(&self, stream: &UnixStream) -> Result<(), ConnectionError> {
        if !self.verify {
            return Ok(());
        }

        let cred = stream
            .peer_cred()
            .map_err(|e| ConnectionError::Io(e.to_string()))?;
        let uid = cred.uid();

        if self.is_trusted(uid) {
            Ok(())
        } else {
            warn!(peer_uid = uid, pid = ?cred.pid(), "Rejected untrusted peer");
            Err(ConnectionError::PermissionDenied { uid })
        }
    }
}

impl Default for PeerPolicy {
    fn default() -> Self {
        Self::from_settings(&DaemonSettings::default())
    }
}
