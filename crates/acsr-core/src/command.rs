//! Control commands and their result statuses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// Commands accepted by the alarm state machine.
///
/// Closed set: `arm`, `disarm`, `auto-arm`, `auto-disarm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlarmCommand {
    /// Manual arming by a person
    Arm,

    /// Manual disarming, always honored
    Disarm,

    /// Arming by a scheduler (cron job, timer)
    AutoArm,

    /// Disarming by a scheduler; only undoes an `AutoArm`
    AutoDisarm,
}

impl AlarmCommand {
    /// All commands, in wire order.
    pub const ALL: [AlarmCommand; 4] = [
        AlarmCommand::Arm,
        AlarmCommand::Disarm,
        AlarmCommand::AutoArm,
        AlarmCommand::AutoDisarm,
    ];

    /// Returns the wire name of this command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arm => "arm",
            Self::Disarm => "disarm",
            Self::AutoArm => "auto-arm",
            Self::AutoDisarm => "auto-disarm",
        }
    }
}

impl FromStr for AlarmCommand {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "arm" => Ok(Self::Arm),
            "disarm" => Ok(Self::Disarm),
            "auto-arm" => Ok(Self::AutoArm),
            "auto-disarm" => Ok(Self::AutoDisarm),
            other => Err(DomainError::UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for AlarmCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful outcome of applying a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandStatus {
    Armed,
    Disarmed,
    /// `auto-disarm` left the state alone (not auto-armed)
    Skipped,
}

impl CommandStatus {
    /// Status text sent back to the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Armed => "armed",
            Self::Disarmed => "disarmed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        for cmd in AlarmCommand::ALL {
            assert_eq!(cmd.as_str().parse::<AlarmCommand>(), Ok(cmd));
        }
    }

    #[test]
    fn test_command_parsing_is_exact() {
        assert_eq!(
            "ARM".parse::<AlarmCommand>(),
            Err(DomainError::UnknownCommand("ARM".to_string()))
        );
        assert!("auto_arm".parse::<AlarmCommand>().is_err());
        assert!("".parse::<AlarmCommand>().is_err());
    }

    #[test]
    fn test_command_serde_names() {
        let json = serde_json::to_string(&AlarmCommand::AutoDisarm).unwrap();
        assert_eq!(json, "\"auto-disarm\"");
    }

    #[test]
    fn test_status_text() {
        assert_eq!(CommandStatus::Armed.to_string(), "armed");
        assert_eq!(CommandStatus::Disarmed.to_string(), "disarmed");
        assert_eq!(CommandStatus::Skipped.to_string(), "skipped");
    }
}
