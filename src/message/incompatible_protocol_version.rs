//! Incompatible protocol version message.

use super::{id, MAGIC_LEN};

/// Reply sent when a client requests a protocol version the server does
/// not support. Carries the newest version the server accepts.
#[derive(Debug, Clone, Default)]
pub struct IncompatibleProtocolVersion {
    pub server_protocol: u8,
    pub server_guid: u64,
}

impl IncompatibleProtocolVersion {
    /// Creates a new incompatible protocol version message.
    pub fn new(server_protocol: u8, server_guid: u64) -> Self {
        Self {
            server_protocol,
            server_guid,
        }
    }

    /// Serializes the message to bytes.
    pub fn write(&self, magic: &[u8; MAGIC_LEN]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(26);
        buf.push(id::INCOMPATIBLE_PROTOCOL_VERSION);
        buf.push(self.server_protocol);
        buf.extend_from_slice(magic);
        buf.extend_from_slice(&self.server_guid.to_be_bytes());
        buf
    }
}
