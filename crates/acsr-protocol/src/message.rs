//! Protocol message types for daemon communication.

use acsr_core::{AlarmCommand, CommandStatus};
use serde::{Deserialize, Serialize};

/// Error text for a request whose command is missing or unrecognized.
pub const UNKNOWN_COMMAND: &str = "unknown command";

/// Error text when a transition could not be written to durable storage.
pub const PERSIST_FAILED: &str = "state persist failed";

/// Error text for a peer that is not allowed to issue commands.
pub const PERMISSION_DENIED: &str = "permission denied";

/// Request sent by the CLI: `{"command": "<arm|disarm|auto-arm|auto-disarm>"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlRequest {
    pub command: AlarmCommand,
}

impl ControlRequest {
    pub fn new(command: AlarmCommand) -> Self {
        Self { command }
    }
}

/// Response sent by the daemon: exactly one of `status` or `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawControlResponse", into = "RawControlResponse")]
pub enum ControlResponse {
    /// Command applied (or skipped); carries the status text
    Status(String),
    /// Command rejected or failed
    Error(String),
}

impl ControlResponse {
    /// Creates a success response from a command status.
    pub fn status(status: CommandStatus) -> Self {
        Self::Status(status.as_str().to_string())
    }

    /// Creates an error response.
    pub fn error(message: &str) -> Self {
        Self::Error(message.to_string())
    }

    /// Creates the response for a missing or unrecognized command.
    pub fn unknown_command() -> Self {
        Self::error(UNKNOWN_COMMAND)
    }

    /// Creates the response for a transition that could not be persisted.
    pub fn persist_failed() -> Self {
        Self::error(PERSIST_FAILED)
    }

    /// Creates the response for an untrusted peer.
    pub fn permission_denied() -> Self {
        Self::error(PERMISSION_DENIED)
    }
}

/// Wire shape of a response; unknown fields are ignored.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RawControlResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TryFrom<RawControlResponse> for ControlResponse {
    type Error = String;

    fn try_from(raw: RawControlResponse) -> Result<Self, String> {
        match (raw.status, raw.error) {
            (Some(status), None) => Ok(Self::Status(status)),
            (None, Some(error)) => Ok(Self::Error(error)),
            (Some(_), Some(_)) => Err("response carries both status and error".to_string()),
            (None, None) => Err("response carries neither status nor error".to_string()),
        }
    }
}

impl From<ControlResponse> for RawControlResponse {
    fn from(response: ControlResponse) -> Self {
        match response {
            ControlResponse::Status(status) => Self {
                status: Some(status),
                error: None,
            },
            ControlResponse::Error(error) => Self {
                status: None,
                error: Some(error),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let json = serde_json::to_string(&ControlRequest::new(AlarmCommand::AutoArm)).unwrap();
        assert_eq!(json, r#"{"command":"auto-arm"}"#);
    }

    #[test]
    fn test_status_response_serialization() {
        let json = serde_json::to_string(&ControlResponse::status(CommandStatus::Skipped)).unwrap();
        assert_eq!(json, r#"{"status":"skipped"}"#);
    }

    #[test]
    fn test_error_response_serialization() {
        let json = serde_json::to_string(&ControlResponse::persist_failed()).unwrap();
        assert_eq!(json, r#"{"error":"state persist failed"}"#);
    }

    #[test]
    fn test_response_tags_are_exclusive() {
        let both: Result<ControlResponse, _> =
            serde_json::from_str(r#"{"status":"armed","error":"boom"}"#);
        assert!(both.is_err());

        let neither: Result<ControlResponse, _> = serde_json::from_str(r#"{}"#);
        assert!(neither.is_err());
    }

    #[test]
    fn test_response_ignores_unknown_fields() {
        let parsed: ControlResponse =
            serde_json::from_str(r#"{"status":"armed","since":"2024-01-01T00:00:00Z"}"#).unwrap();
        assert_eq!(parsed, ControlResponse::Status("armed".to_string()));
    }
}
