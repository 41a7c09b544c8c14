use std::net::SocketAddr;

use crate::protocol::Opcode;

/// All error types that can occur when talking to LIFX gateways and bulbs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A datagram was too short for a packet header, or its declared size
    /// disagrees with the number of bytes received.
    #[error("malformed header: {reason}")]
    MalformedHeader { reason: String },

    /// The payload following a valid header is shorter than the fixed layout
    /// of its opcode.
    #[error("malformed {opcode} payload: expected {expected} bytes, got {actual}")]
    MalformedPayload {
        opcode: Opcode,
        expected: usize,
        actual: usize,
    },

    /// The packet type is not one this client understands.
    ///
    /// Devices emit plenty of undocumented packets, so this is not a bug.
    #[error("unknown opcode {0:#06x}")]
    UnknownOpcode(u16),

    /// Writing a packet into its byte buffer failed.
    #[error("failed to encode packet: {0:?}")]
    Encode(std::io::Error),

    /// The discovery socket could not be bound, usually because another
    /// process already owns the port.
    #[error("failed to bind {addr}: {err:?}")]
    Bind { addr: SocketAddr, err: std::io::Error },

    /// Sending a packet to a gateway (or the broadcast address) failed.
    #[error("failed to send to {target}: {err:?}")]
    Send {
        target: SocketAddr,
        err: std::io::Error,
    },

    /// A network socket operation failed outside of bind/send.
    #[error("socket {action} error: {err:?}")]
    Socket { action: String, err: std::io::Error },

    /// Reading from the bound receive socket failed; device tracking stops.
    #[error("receive socket failed: {0:?}")]
    Receive(std::io::Error),

    /// A device or site address could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to deserialize a configuration document.
    #[error("failed to load config: {0:?}")]
    ConfigLoad(serde_json::Error),
}

impl Error {
    /// Create a new socket error
    pub fn socket(action: &str, err: std::io::Error) -> Self {
        Error::Socket {
            action: action.to_string(),
            err,
        }
    }

    /// Create a new malformed header error
    pub fn malformed_header(reason: impl Into<String>) -> Self {
        Error::MalformedHeader {
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors that only affect a single datagram.
    ///
    /// The receive loop drops such datagrams and keeps going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::MalformedHeader { .. } | Error::MalformedPayload { .. } | Error::UnknownOpcode(_)
        )
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
