//! Unconnected pong message.

use super::{id, MAGIC_LEN};

/// An unconnected pong sent in response to a ping.
#[derive(Debug, Clone, Default)]
pub struct UnconnectedPong {
    pub ping_time: i64,
    pub server_guid: u64,
    /// Advertisement body, typically an MOTD string. When absent the pong
    /// is sent without the trailing length-prefixed block.
    pub advertisement: Option<Vec<u8>>,
}

impl UnconnectedPong {
    /// Creates a new unconnected pong.
    pub fn new(ping_time: i64, server_guid: u64, advertisement: Option<Vec<u8>>) -> Self {
        Self {
            ping_time,
            server_guid,
            advertisement,
        }
    }

    /// Serializes the message to bytes.
    pub fn write(&self, magic: &[u8; MAGIC_LEN]) -> Vec<u8> {
        let adv_len = self.advertisement.as_ref().map_or(0, Vec::len);
        let mut buf = Vec::with_capacity(35 + adv_len);
        buf.push(id::UNCONNECTED_PONG);
        buf.extend_from_slice(&self.ping_time.to_be_bytes());
        buf.extend_from_slice(&self.server_guid.to_be_bytes());
        buf.extend_from_slice(magic);
        if let Some(advertisement) = &self.advertisement {
            buf.extend_from_slice(&(advertisement.len() as u16).to_be_bytes());
            buf.extend_from_slice(advertisement);
        }
        buf
    }
}
