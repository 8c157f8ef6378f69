//! Trusted-principal check, done before any connection is attempted.

use crate::error::{CtlError, Result};

/// Uid allowed to issue alarm commands
pub const TRUSTED_UID: u32 = 0;

/// Effective uid of the calling process.
pub fn effective_uid() -> u32 {
    unsafe { libc::geteuid() }
}

pub fn is_trusted_principal(euid: u32) -> bool {
    euid == TRUSTED_UID
}

/// Fails with `CtlError::Privilege` unless `euid` is the trusted principal.
pub fn check_trusted_principal(euid: u32) -> Result<()> {
    if is_trusted_principal(euid) {
        Ok(())
    } else {
        Err(CtlError::Privilege { euid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_root_is_trusted() {
        assert!(check_trusted_principal(0).is_ok());
        assert!(matches!(
            check_trusted_principal(1000),
            Err(CtlError::Privilege { euid: 1000 })
        ));
        assert!(!is_trusted_principal(65_534));
    }
}
