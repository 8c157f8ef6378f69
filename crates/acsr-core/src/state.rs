//! Alarm state and the arm/disarm transition table.
//!
//! The state carries its provenance only while armed, so a disarmed
//! system with a leftover provenance cannot be represented.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::command::{AlarmCommand, CommandStatus};

/// Who armed the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Armed by a person (keypad, `arm` command)
    Manual,
    /// Armed by automation (`auto-arm`)
    Auto,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

/// Armed/disarmed state of the alarm system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlarmState {
    #[default]
    Disarmed,
    Armed(Provenance),
}

/// Result of applying one command to a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State after the command
    pub next: AlarmState,
    /// Status reported to the caller
    pub status: CommandStatus,
}

impl Transition {
    /// Returns true when the command was a no-op.
    pub fn is_skipped(&self) -> bool {
        self.status == CommandStatus::Skipped
    }
}

impl AlarmState {
    /// Returns true if the system is armed.
    pub fn is_armed(&self) -> bool {
        matches!(self, Self::Armed(_))
    }

    /// Returns the provenance of the arming, if armed.
    pub fn provenance(&self) -> Option<Provenance> {
        match self {
            Self::Disarmed => None,
            Self::Armed(p) => Some(*p),
        }
    }

    /// Applies a command and returns the resulting transition.
    ///
    /// `AutoDisarm` only acts on a state that was itself auto-armed; in
    /// every other state it reports `Skipped` and leaves the state as is.
    pub fn apply(self, command: AlarmCommand) -> Transition {
        match (self, command) {
            (_, AlarmCommand::Arm) => Transition {
                next: Self::Armed(Provenance::Manual),
                status: CommandStatus::Armed,
            },
            (_, AlarmCommand::AutoArm) => Transition {
                next: Self::Armed(Provenance::Auto),
                status: CommandStatus::Armed,
            },
            (_, AlarmCommand::Disarm) | (Self::Armed(Provenance::Auto), AlarmCommand::AutoDisarm) => {
                Transition {
                    next: Self::Disarmed,
                    status: CommandStatus::Disarmed,
                }
            }
            (current, AlarmCommand::AutoDisarm) => Transition {
                next: current,
                status: CommandStatus::Skipped,
            },
        }
    }
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disarmed => write!(f, "disarmed"),
            Self::Armed(p) => write!(f, "armed ({p})"),
        }
    }
}

/// Storage form of [`AlarmState`]: `{"armed": bool, "provenance": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub armed: bool,
    #[serde(default)]
    pub provenance: Option<Provenance>,
}

impl From<AlarmState> for PersistedState {
    fn from(state: AlarmState) -> Self {
        Self {
            armed: state.is_armed(),
            provenance: state.provenance(),
        }
    }
}

impl From<PersistedState> for AlarmState {
    /// An armed record without provenance loads as `Manual`, so automation
    /// can never disarm a system whose arming origin is unknown.
    fn from(persisted: PersistedState) -> Self {
        if persisted.armed {
            Self::Armed(persisted.provenance.unwrap_or(Provenance::Manual))
        } else {
            Self::Disarmed
        }
    }
}
