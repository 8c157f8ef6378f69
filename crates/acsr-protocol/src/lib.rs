//! ACSR Protocol - Control protocol for daemon communication
//!
//! This crate provides the request/response types exchanged between
//! `alarm-ctl` and the daemon, and the line-delimited JSON codec that
//! carries them over the local socket.

pub mod codec;
pub mod message;

/// Default control socket path, shared by the daemon and `alarm-ctl`
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/alarmd.sock";

/// Environment variable overriding the control socket path
pub const SOCKET_ENV: &str = "ACSR_SOCKET";

pub use codec::{
    decode_request, decode_response, encode_request, encode_response, CodecError,
    MAX_MESSAGE_SIZE,
};
pub use message::{
    ControlRequest, ControlResponse, PERMISSION_DENIED, PERSIST_FAILED, UNKNOWN_COMMAND,
};
