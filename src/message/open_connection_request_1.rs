//! Open connection request 1 message.

use super::MAGIC_LEN;
use crate::binary;
use crate::error::Result;

/// Open connection request 1, the first message in the connection
/// handshake. The body is padded by the client to its desired MTU; the
/// padding itself carries no data and is left unread.
#[derive(Debug, Clone, Default)]
pub struct OpenConnectionRequest1 {
    pub protocol_version: u8,
}

impl OpenConnectionRequest1 {
    /// Deserializes the message from the body following the packet ID.
    pub fn read(data: &[u8]) -> Result<Self> {
        let mut buf = data;
        binary::skip(&mut buf, MAGIC_LEN)?;
        let protocol_version = binary::read_u8(&mut buf)?;
        Ok(Self { protocol_version })
    }
}
