//! Address serialization for RakNet messages.
//!
//! Addresses are encoded as one family byte (4 or 6), then for IPv4 the
//! four octets bitwise-complemented followed by a big-endian port, and for
//! IPv6 a two-byte family marker, big-endian port, flow info, the sixteen
//! raw octets and a scope id.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::Buf;

use crate::binary;
use crate::error::Result;

/// Size of an IPv4 address in RakNet format.
pub const SIZEOF_ADDR4: usize = 1 + 4 + 2;

/// Size of an IPv6 address in RakNet format.
pub const SIZEOF_ADDR6: usize = 1 + 2 + 2 + 4 + 16 + 4;

/// Returns the encoded size of an address in bytes.
pub fn sizeof_addr(addr: &SocketAddr) -> usize {
    match addr.ip() {
        IpAddr::V4(_) => SIZEOF_ADDR4,
        IpAddr::V6(_) => SIZEOF_ADDR6,
    }
}

/// Appends an address to the buffer in RakNet wire format.
pub fn write_addr(buf: &mut Vec<u8>, addr: &SocketAddr) {
    match addr.ip() {
        IpAddr::V4(ip) => {
            buf.push(4);
            let octets = ip.octets();
            buf.extend_from_slice(&[!octets[0], !octets[1], !octets[2], !octets[3]]);
            buf.extend_from_slice(&addr.port().to_be_bytes());
        }
        IpAddr::V6(ip) => {
            buf.push(6);
            // AF_INET6 family marker (23 on Windows)
            buf.extend_from_slice(&[23, 0]);
            buf.extend_from_slice(&addr.port().to_be_bytes());
            // Flow info
            buf.extend_from_slice(&[0; 4]);
            buf.extend_from_slice(&ip.octets());
            // Scope ID
            buf.extend_from_slice(&[0; 4]);
        }
    }
}

/// Reads an address in RakNet wire format from the buffer.
///
/// A family byte of 4 (or 0, which some clients send) selects the IPv4
/// layout; anything else is read as IPv6.
pub fn read_addr<B: Buf>(buf: &mut B) -> Result<SocketAddr> {
    let family = binary::read_u8(buf)?;
    if family == 4 || family == 0 {
        let octets: [u8; 4] = binary::read_bytes(buf)?;
        let ip = Ipv4Addr::new(!octets[0], !octets[1], !octets[2], !octets[3]);
        let port = binary::read_u16(buf)?;
        Ok(SocketAddr::new(IpAddr::V4(ip), port))
    } else {
        // Family marker
        binary::skip(buf, 2)?;
        let port = binary::read_u16(buf)?;
        // Flow info
        binary::skip(buf, 4)?;
        let octets: [u8; 16] = binary::read_bytes(buf)?;
        // Scope ID
        binary::skip(buf, 4)?;
        Ok(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(octets)), port))
    }
}
