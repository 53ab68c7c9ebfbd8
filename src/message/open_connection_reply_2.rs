//! Open connection reply 2 message.

use std::net::SocketAddr;

use super::addr::{sizeof_addr, write_addr};
use super::{id, MAGIC_LEN};

/// Open connection reply 2, the server's final response completing the
/// offline handshake.
#[derive(Debug, Clone)]
pub struct OpenConnectionReply2 {
    pub server_guid: u64,
    pub client_address: SocketAddr,
    pub mtu: u16,
}

impl OpenConnectionReply2 {
    /// Creates a new open connection reply 2.
    pub fn new(server_guid: u64, client_address: SocketAddr, mtu: u16) -> Self {
        Self {
            server_guid,
            client_address,
            mtu,
        }
    }

    /// Serializes the message to bytes.
    pub fn write(&self, magic: &[u8; MAGIC_LEN]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(28 + sizeof_addr(&self.client_address));
        buf.push(id::OPEN_CONNECTION_REPLY_2);
        buf.extend_from_slice(magic);
        buf.extend_from_slice(&self.server_guid.to_be_bytes());
        write_addr(&mut buf, &self.client_address);
        buf.extend_from_slice(&self.mtu.to_be_bytes());
        // Security is never requested by this server
        buf.push(0);
        buf
    }
}
