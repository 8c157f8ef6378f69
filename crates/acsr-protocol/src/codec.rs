//! Line-delimited JSON codec.
//!
//! Each message is one JSON object terminated by `\n`. A connection carries
//! exactly one request followed by exactly one response.

use acsr_core::AlarmCommand;
use serde::Deserialize;
use thiserror::Error;

use crate::message::{ControlRequest, ControlResponse};

/// Maximum encoded message size (64 KiB)
pub const MAX_MESSAGE_SIZE: usize = 65_536;

/// Errors raised while encoding or decoding protocol messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("missing command")]
    MissingCommand,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("message too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },

    #[error("failed to encode message: {0}")]
    Encode(String),
}

/// Wire shape of a request; unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct RawControlRequest {
    #[serde(default)]
    command: Option<String>,
}

fn check_size(line: &str) -> Result<(), CodecError> {
    if line.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::TooLarge {
            size: line.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(())
}

/// Encodes a request as a newline-terminated JSON line.
pub fn encode_request(request: &ControlRequest) -> Result<String, CodecError> {
    let mut json = serde_json::to_string(request).map_err(|e| CodecError::Encode(e.to_string()))?;
    json.push('\n');
    Ok(json)
}

/// Decodes a request line, validating the command against the known set.
pub fn decode_request(line: &str) -> Result<ControlRequest, CodecError> {
    check_size(line)?;

    let raw: RawControlRequest =
        serde_json::from_str(line.trim_end()).map_err(|e| CodecError::Malformed(e.to_string()))?;

    let command = raw.command.ok_or(CodecError::MissingCommand)?;
    let command = command
        .parse::<AlarmCommand>()
        .map_err(|_| CodecError::UnknownCommand(command))?;

    Ok(ControlRequest::new(command))
}

/// Encodes a response as a newline-terminated JSON line.
pub fn encode_response(response: &ControlResponse) -> Result<String, CodecError> {
    let mut json =
        serde_json::to_string(response).map_err(|e| CodecError::Encode(e.to_string()))?;
    json.push('\n');
    Ok(json)
}

/// Decodes a response line.
pub fn decode_response(line: &str) -> Result<ControlResponse, CodecError> {
    check_size(line)?;
    serde_json::from_str(line.trim_end()).map_err(|e| CodecError::Malformed(e.to_string()))
}
