//! HAProxy PROXY protocol decoder, v1 (text) and v2 (binary).
//!
//! A front-tier load balancer prepends one of these headers to a datagram
//! so the server can recover the true client address. Both decoders are
//! pure functions over buffers; the listener wires them into the receive
//! path when [`crate::ListenConfig::proxy_protocol`] is set.
//!
//! Reference: <https://www.haproxy.org/download/1.8/doc/proxy-protocol.txt>

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::Buf;
use thiserror::Error;

/// PROXY protocol v2 signature prefixing every binary header.
pub const V2_SIGNATURE: [u8; 12] = [
    0x0D, 0x0A, 0x0D, 0x0A, 0x00, 0x0D, 0x0A, 0x51, 0x55, 0x49, 0x54, 0x0A,
];

/// Fixed part of a v2 binary header.
const V2_HEADER_SIZE: usize = 16;

/// Maximum length of a v1 text header, terminator included.
const V1_MAX_LENGTH: usize = 108;

/// Bytes reserved per AF_UNIX path.
const UNIX_PATH_LEN: usize = 108;

/// Decode failure raised at the proxy boundary. These never turn into
/// RakNet replies; the datagram is discarded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    #[error("incomplete header: {got} bytes (expected: {expected}+ bytes)")]
    IncompleteHeader { got: usize, expected: usize },

    #[error("unsupported version: {0:#04x}")]
    UnsupportedVersion(u8),

    #[error("invalid command: {0:#04x}")]
    InvalidCommand(u8),

    #[error("invalid family or transport: {0:#04x}")]
    InvalidFamily(u8),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid port: {0} (expected: 1 ~ 65535)")]
    InvalidPort(String),

    #[error("malformed v1 header: {0}")]
    MalformedV1(String),

    #[error("unsupported v1 protocol: {0}")]
    UnsupportedV1Protocol(String),
}

/// Header format the proxy spoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    V1,
    V2,
}

/// What the proxy did with the connection. LOCAL marks traffic the proxy
/// originated itself (health checks); its addresses are to be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Proxy,
    Local,
}

/// Address family of the proxied endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Unspec,
    Inet,
    Inet6,
    Unix,
}

/// Transport protocol of the proxied connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportProtocol {
    Unspec,
    Stream,
    Dgram,
}

/// Address family and transport of the proxied connection, as carried in
/// the 14th byte of a v2 header or the protocol word of a v1 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxiedProtocol {
    /// The proxy does not know the original protocol; all address fields
    /// are absent.
    Unknown,
    /// A transport without a known address family.
    Unspec,
    Tcp4,
    Udp4,
    Tcp6,
    Udp6,
    UnixStream,
    UnixDgram,
}

impl ProxiedProtocol {
    /// Decodes the `(family << 4) | transport` byte of a v2 header.
    fn from_byte(value: u8) -> Result<Self, ProxyError> {
        match value {
            0x00 => Ok(Self::Unknown),
            0x01 | 0x02 => Ok(Self::Unspec),
            0x11 => Ok(Self::Tcp4),
            0x12 => Ok(Self::Udp4),
            0x21 => Ok(Self::Tcp6),
            0x22 => Ok(Self::Udp6),
            0x31 => Ok(Self::UnixStream),
            0x32 => Ok(Self::UnixDgram),
            other => Err(ProxyError::InvalidFamily(other)),
        }
    }

    /// The address family half of the protocol.
    pub fn address_family(self) -> AddressFamily {
        match self {
            Self::Unknown | Self::Unspec => AddressFamily::Unspec,
            Self::Tcp4 | Self::Udp4 => AddressFamily::Inet,
            Self::Tcp6 | Self::Udp6 => AddressFamily::Inet6,
            Self::UnixStream | Self::UnixDgram => AddressFamily::Unix,
        }
    }

    /// The transport half of the protocol.
    pub fn transport(self) -> TransportProtocol {
        match self {
            Self::Unknown | Self::Unspec => TransportProtocol::Unspec,
            Self::Tcp4 | Self::Tcp6 | Self::UnixStream => TransportProtocol::Stream,
            Self::Udp4 | Self::Udp6 | Self::UnixDgram => TransportProtocol::Dgram,
        }
    }
}

/// Decoded PROXY protocol header.
///
/// When `proxied_protocol` is [`ProxiedProtocol::Unknown`] every other
/// address field is absent or zero, per the protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HAProxyMessage {
    pub version: ProtocolVersion,
    pub command: Command,
    pub proxied_protocol: ProxiedProtocol,
    pub source_address: Option<String>,
    pub destination_address: Option<String>,
    pub source_port: u16,
    pub destination_port: u16,
}

impl HAProxyMessage {
    /// Builds a message, validating addresses and ports against the
    /// address family.
    fn new(
        version: ProtocolVersion,
        command: Command,
        proxied_protocol: ProxiedProtocol,
        source_address: Option<String>,
        destination_address: Option<String>,
        source_port: u16,
        destination_port: u16,
    ) -> Result<Self, ProxyError> {
        let family = proxied_protocol.address_family();
        check_address(source_address.as_deref(), family)?;
        check_address(destination_address.as_deref(), family)?;
        check_port(source_port, family)?;
        check_port(destination_port, family)?;

        Ok(Self {
            version,
            command,
            proxied_protocol,
            source_address,
            destination_address,
            source_port,
            destination_port,
        })
    }

    /// Placeholder for UNKNOWN proxied protocols: every other header
    /// value is discarded, per the protocol.
    fn unknown(version: ProtocolVersion, command: Command) -> Self {
        Self {
            version,
            command,
            proxied_protocol: ProxiedProtocol::Unknown,
            source_address: None,
            destination_address: None,
            source_port: 0,
            destination_port: 0,
        }
    }

    /// Decodes a version 2, binary proxy protocol header.
    ///
    /// The 12-byte signature is skipped without being matched (use
    /// [`detect_version`] to decide a buffer carries a v2 header at all).
    /// Trailing TLVs are skipped, not parsed, up to the end of the buffer;
    /// callers framing a header out of a larger datagram should bound the
    /// buffer first (see [`decode_datagram`]).
    pub fn decode_v2<B: Buf>(buf: &mut B) -> Result<Self, ProxyError> {
        if buf.remaining() < V2_HEADER_SIZE {
            return Err(ProxyError::IncompleteHeader {
                got: buf.remaining(),
                expected: V2_HEADER_SIZE,
            });
        }

        buf.advance(V2_SIGNATURE.len());
        let ver_cmd = buf.get_u8();

        if ver_cmd >> 4 != 0x02 {
            return Err(ProxyError::UnsupportedVersion(ver_cmd));
        }
        let command = match ver_cmd & 0x0F {
            0x00 => Command::Local,
            0x01 => Command::Proxy,
            _ => return Err(ProxyError::InvalidCommand(ver_cmd)),
        };
        if command == Command::Local {
            return Ok(Self::unknown(ProtocolVersion::V2, Command::Local));
        }

        let proxied_protocol = ProxiedProtocol::from_byte(buf.get_u8())?;
        if proxied_protocol.address_family() == AddressFamily::Unspec {
            return Ok(Self::unknown(ProtocolVersion::V2, Command::Proxy));
        }

        let address_info_len = buf.get_u16() as usize;

        let source_address;
        let destination_address;
        let mut source_port = 0;
        let mut destination_port = 0;

        match proxied_protocol.address_family() {
            AddressFamily::Unix => {
                // Unix sockets reserve 2 x 108 bytes of address information
                let required = 2 * UNIX_PATH_LEN;
                if address_info_len < required || buf.remaining() < required {
                    return Err(ProxyError::IncompleteHeader {
                        got: address_info_len.min(buf.remaining()),
                        expected: required,
                    });
                }
                source_address = Some(read_unix_path(buf)?);
                destination_address = Some(read_unix_path(buf)?);
            }
            family @ (AddressFamily::Inet | AddressFamily::Inet6) => {
                let (addr_len, required) = match family {
                    AddressFamily::Inet => (4, 12),
                    _ => (16, 36),
                };
                if address_info_len < required || buf.remaining() < required {
                    return Err(ProxyError::IncompleteHeader {
                        got: address_info_len.min(buf.remaining()),
                        expected: required,
                    });
                }
                source_address = Some(ip_bytes_to_string(buf, addr_len));
                destination_address = Some(ip_bytes_to_string(buf, addr_len));
                source_port = buf.get_u16();
                destination_port = buf.get_u16();
            }
            AddressFamily::Unspec => unreachable!("placeholder returned above"),
        }

        skip_tlvs(buf)?;

        Self::new(
            ProtocolVersion::V2,
            Command::Proxy,
            proxied_protocol,
            source_address,
            destination_address,
            source_port,
            destination_port,
        )
    }

    /// Decodes a version 1, human-readable proxy protocol header. The
    /// CRLF terminator must already be stripped.
    pub fn decode_v1(header: &str) -> Result<Self, ProxyError> {
        let parts: Vec<&str> = header.split(' ').collect();
        if parts.len() < 2 || parts[0] != "PROXY" {
            return Err(ProxyError::MalformedV1(header.to_string()));
        }

        let proxied_protocol = match parts[1] {
            "TCP4" => ProxiedProtocol::Tcp4,
            "TCP6" => ProxiedProtocol::Tcp6,
            // UNKNOWN discards the rest of the line, trailing fields and all
            "UNKNOWN" => return Ok(Self::unknown(ProtocolVersion::V1, Command::Proxy)),
            other => return Err(ProxyError::UnsupportedV1Protocol(other.to_string())),
        };

        if parts.len() != 6 {
            return Err(ProxyError::MalformedV1(header.to_string()));
        }

        Self::new(
            ProtocolVersion::V1,
            Command::Proxy,
            proxied_protocol,
            Some(parts[2].to_string()),
            Some(parts[3].to_string()),
            parse_v1_port(parts[4])?,
            parse_v1_port(parts[5])?,
        )
    }

    /// Resolves the source endpoint as a socket address, honouring the
    /// declared address family.
    ///
    /// Fails with [`ProxyError::InvalidAddress`] for UNIX and UNKNOWN
    /// families, which have no IP source.
    pub fn source_socket_addr(&self) -> Result<SocketAddr, ProxyError> {
        let address = self.source_address.as_deref().ok_or_else(|| {
            ProxyError::InvalidAddress(format!("no source address for {:?}", self.proxied_protocol))
        })?;
        let ip = match self.proxied_protocol.address_family() {
            AddressFamily::Inet => address
                .parse::<Ipv4Addr>()
                .map(IpAddr::V4)
                .map_err(|_| ProxyError::InvalidAddress(address.to_string()))?,
            AddressFamily::Inet6 => address
                .parse::<Ipv6Addr>()
                .map(IpAddr::V6)
                .map_err(|_| ProxyError::InvalidAddress(address.to_string()))?,
            family => {
                return Err(ProxyError::InvalidAddress(format!(
                    "no IP source for address family {family:?}"
                )))
            }
        };
        Ok(SocketAddr::new(ip, self.source_port))
    }
}

/// Sniffs which header version, if any, starts the buffer.
pub fn detect_version(data: &[u8]) -> Option<ProtocolVersion> {
    if data.len() >= 13 && data[..12] == V2_SIGNATURE && data[12] >> 4 == 0x02 {
        return Some(ProtocolVersion::V2);
    }
    if data.len() >= 6 && &data[..6] == b"PROXY " {
        return Some(ProtocolVersion::V1);
    }
    None
}

/// Decodes a PROXY header off the front of a datagram, returning the
/// message and the remaining payload.
///
/// v2 headers are framed by their declared address-information length so
/// TLV skipping stops at the header boundary; v1 headers end at the first
/// CRLF, which must appear within the first 108 bytes.
pub fn decode_datagram(data: &[u8]) -> Result<(HAProxyMessage, &[u8]), ProxyError> {
    match detect_version(data) {
        Some(ProtocolVersion::V2) => {
            if data.len() < V2_HEADER_SIZE {
                return Err(ProxyError::IncompleteHeader {
                    got: data.len(),
                    expected: V2_HEADER_SIZE,
                });
            }
            let header_len =
                V2_HEADER_SIZE + u16::from_be_bytes([data[14], data[15]]) as usize;
            if data.len() < header_len {
                return Err(ProxyError::IncompleteHeader {
                    got: data.len(),
                    expected: header_len,
                });
            }
            let mut header = &data[..header_len];
            let message = HAProxyMessage::decode_v2(&mut header)?;
            Ok((message, &data[header_len..]))
        }
        Some(ProtocolVersion::V1) => {
            let search_end = data.len().min(V1_MAX_LENGTH);
            let terminator = data[..search_end]
                .windows(2)
                .position(|window| window == b"\r\n")
                .ok_or_else(|| ProxyError::MalformedV1("missing CRLF terminator".to_string()))?;
            let line = std::str::from_utf8(&data[..terminator])
                .map_err(|_| ProxyError::MalformedV1("header is not valid UTF-8".to_string()))?;
            let message = HAProxyMessage::decode_v1(line)?;
            Ok((message, &data[terminator + 2..]))
        }
        None => Err(ProxyError::UnsupportedVersion(
            data.first().copied().unwrap_or_default(),
        )),
    }
}

/// Skips trailing type-length-value records until fewer than four bytes
/// remain.
fn skip_tlvs<B: Buf>(buf: &mut B) -> Result<(), ProxyError> {
    while buf.remaining() >= 4 {
        buf.advance(1);
        let len = buf.get_u16() as usize;
        if buf.remaining() < len {
            return Err(ProxyError::IncompleteHeader {
                got: buf.remaining(),
                expected: len,
            });
        }
        buf.advance(len);
    }
    Ok(())
}

/// Reads one NUL-padded AF_UNIX path, always consuming the full 108-byte
/// slot whatever the terminator position.
fn read_unix_path<B: Buf>(buf: &mut B) -> Result<String, ProxyError> {
    let mut slot = [0u8; UNIX_PATH_LEN];
    buf.copy_to_slice(&mut slot);
    let len = slot.iter().position(|&b| b == 0).unwrap_or(UNIX_PATH_LEN);
    std::str::from_utf8(&slot[..len])
        .map(str::to_string)
        .map_err(|_| ProxyError::InvalidAddress("unix path is not valid UTF-8".to_string()))
}

/// Renders an IP address read off a v2 header: dotted decimal for 4-byte
/// addresses, eight colon-separated hex groups (no zero-compression, no
/// leading zeros) for 16-byte ones.
fn ip_bytes_to_string<B: Buf>(buf: &mut B, addr_len: usize) -> String {
    if addr_len == 4 {
        let octets: Vec<String> = (0..4).map(|_| buf.get_u8().to_string()).collect();
        octets.join(".")
    } else {
        let groups: Vec<String> = (0..8).map(|_| format!("{:x}", buf.get_u16())).collect();
        groups.join(":")
    }
}

fn parse_v1_port(value: &str) -> Result<u16, ProxyError> {
    let port: u32 = value
        .parse()
        .map_err(|_| ProxyError::InvalidPort(value.to_string()))?;
    if port == 0 || port > u16::MAX as u32 {
        return Err(ProxyError::InvalidPort(value.to_string()));
    }
    Ok(port as u16)
}

fn check_address(address: Option<&str>, family: AddressFamily) -> Result<(), ProxyError> {
    match family {
        AddressFamily::Unspec => match address {
            Some(address) => Err(ProxyError::InvalidAddress(format!(
                "unexpected address for UNSPEC: {address}"
            ))),
            None => Ok(()),
        },
        AddressFamily::Unix => {
            let address = address
                .ok_or_else(|| ProxyError::InvalidAddress("missing unix path".to_string()))?;
            if address.len() > UNIX_PATH_LEN {
                return Err(ProxyError::InvalidAddress(address.to_string()));
            }
            Ok(())
        }
        AddressFamily::Inet => {
            let address = address
                .ok_or_else(|| ProxyError::InvalidAddress("missing IPv4 address".to_string()))?;
            address
                .parse::<Ipv4Addr>()
                .map(drop)
                .map_err(|_| ProxyError::InvalidAddress(address.to_string()))
        }
        AddressFamily::Inet6 => {
            let address = address
                .ok_or_else(|| ProxyError::InvalidAddress("missing IPv6 address".to_string()))?;
            address
                .parse::<Ipv6Addr>()
                .map(drop)
                .map_err(|_| ProxyError::InvalidAddress(address.to_string()))
        }
    }
}

fn check_port(port: u16, family: AddressFamily) -> Result<(), ProxyError> {
    match family {
        // Any u16 fits the binary wire format
        AddressFamily::Inet | AddressFamily::Inet6 => Ok(()),
        AddressFamily::Unix | AddressFamily::Unspec => {
            if port != 0 {
                return Err(ProxyError::InvalidPort(port.to_string()));
            }
            Ok(())
        }
    }
}
