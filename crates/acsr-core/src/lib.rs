//! ACSR Core - Shared types for the alarm central station receiver
//!
//! This crate provides the domain types shared between
//! the daemon (acsrd) and the control CLI (alarm-ctl).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod command;
pub mod error;
pub mod event;
pub mod state;

// Re-exports for convenience
pub use command::{AlarmCommand, CommandStatus};
pub use error::{DomainError, DomainResult};
pub use event::{AlarmEvent, EventBatch};
pub use state::{AlarmState, PersistedState, Provenance, Transition};
