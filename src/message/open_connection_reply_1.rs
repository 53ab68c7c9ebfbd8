//! Open connection reply 1 message.

use super::{id, MAGIC_LEN};

/// Open connection reply 1, the server's response to request 1.
#[derive(Debug, Clone, Default)]
pub struct OpenConnectionReply1 {
    pub server_guid: u64,
    pub server_has_security: bool,
    pub cookie: u32,
    pub mtu: u16,
}

impl OpenConnectionReply1 {
    /// Creates a new open connection reply 1 without a cookie challenge.
    pub fn new(server_guid: u64, mtu: u16) -> Self {
        Self {
            server_guid,
            server_has_security: false,
            cookie: 0,
            mtu,
        }
    }

    /// Creates a new open connection reply 1 carrying a cookie challenge.
    pub fn with_security(server_guid: u64, cookie: u32, mtu: u16) -> Self {
        Self {
            server_guid,
            server_has_security: true,
            cookie,
            mtu,
        }
    }

    /// Serializes the message to bytes.
    pub fn write(&self, magic: &[u8; MAGIC_LEN]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(if self.server_has_security { 32 } else { 28 });
        buf.push(id::OPEN_CONNECTION_REPLY_1);
        buf.extend_from_slice(magic);
        buf.extend_from_slice(&self.server_guid.to_be_bytes());
        if self.server_has_security {
            buf.push(1);
            buf.extend_from_slice(&self.cookie.to_be_bytes());
        } else {
            buf.push(0);
        }
        buf.extend_from_slice(&self.mtu.to_be_bytes());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::UNCONNECTED_MESSAGE_SEQUENCE;

    #[test]
    fn test_write_lengths() {
        let plain = OpenConnectionReply1::new(1, 1400).write(&UNCONNECTED_MESSAGE_SEQUENCE);
        assert_eq!(plain.len(), 28);
        assert_eq!(plain[17 + 8], 0);

        let secured =
            OpenConnectionReply1::with_security(1, 0xC00C1E, 1400).write(&UNCONNECTED_MESSAGE_SEQUENCE);
        assert_eq!(secured.len(), 32);
        assert_eq!(secured[17 + 8], 1);
        assert_eq!(&secured[26..30], &0xC00C1Eu32.to_be_bytes());
    }
}
