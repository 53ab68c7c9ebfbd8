//! Unconnected ping message.

use crate::binary;
use crate::error::Result;

/// An unconnected ping received for server discovery.
///
/// The body also carries the magic and a client guid after the timestamp;
/// neither is needed to answer the ping, so only the timestamp is decoded.
#[derive(Debug, Clone, Default)]
pub struct UnconnectedPing {
    pub ping_time: i64,
}

impl UnconnectedPing {
    /// Deserializes the message from the body following the packet ID.
    pub fn read(data: &[u8]) -> Result<Self> {
        let mut buf = data;
        let ping_time = binary::read_i64(&mut buf)?;
        Ok(Self { ping_time })
    }
}
