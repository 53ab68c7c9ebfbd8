//! Open connection request 2 message.

use std::net::SocketAddr;

use super::addr::read_addr;
use super::MAGIC_LEN;
use crate::binary;
use crate::error::Result;

/// Open connection request 2, the second request in the connection
/// handshake.
#[derive(Debug, Clone)]
pub struct OpenConnectionRequest2 {
    /// Cookie echoed from OPEN_CONNECTION_REPLY_1. Zero when the server
    /// did not send one.
    pub cookie: u32,
    pub server_address: SocketAddr,
    pub mtu: u16,
    pub client_guid: u64,
}

impl OpenConnectionRequest2 {
    /// Deserializes the message from the body following the packet ID.
    ///
    /// The wire layout depends on whether the preceding reply carried a
    /// cookie: if so, the body starts with the echoed cookie and a
    /// challenge flag after the magic.
    pub fn read(data: &[u8], server_has_security: bool) -> Result<Self> {
        let mut buf = data;
        binary::skip(&mut buf, MAGIC_LEN)?;

        let mut cookie = 0;
        if server_has_security {
            cookie = binary::read_u32(&mut buf)?;
            // Client challenge flag
            binary::read_u8(&mut buf)?;
        }

        let server_address = read_addr(&mut buf)?;
        let mtu = binary::read_u16(&mut buf)?;
        let client_guid = binary::read_u64(&mut buf)?;

        Ok(Self {
            cookie,
            server_address,
            mtu,
            client_guid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{write_addr, UNCONNECTED_MESSAGE_SEQUENCE};

    fn body(with_cookie: Option<u32>) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&UNCONNECTED_MESSAGE_SEQUENCE);
        if let Some(cookie) = with_cookie {
            buf.extend_from_slice(&cookie.to_be_bytes());
            buf.push(0);
        }
        write_addr(&mut buf, &"127.0.0.1:19132".parse().unwrap());
        buf.extend_from_slice(&1200u16.to_be_bytes());
        buf.extend_from_slice(&0xAABBCCDDu64.to_be_bytes());
        buf
    }

    #[test]
    fn test_read_without_security() {
        let pk = OpenConnectionRequest2::read(&body(None), false).unwrap();
        assert_eq!(pk.cookie, 0);
        assert_eq!(pk.mtu, 1200);
        assert_eq!(pk.client_guid, 0xAABBCCDD);
    }

    #[test]
    fn test_read_with_security() {
        let pk = OpenConnectionRequest2::read(&body(Some(0x1234)), true).unwrap();
        assert_eq!(pk.cookie, 0x1234);
        assert_eq!(pk.mtu, 1200);
    }

    #[test]
    fn test_truncated_body() {
        let buf = body(None);
        assert!(OpenConnectionRequest2::read(&buf[..buf.len() - 2], false).is_err());
        // Security expected but cookie missing
        assert!(OpenConnectionRequest2::read(&buf[..MAGIC_LEN + 3], true).is_err());
    }
}
