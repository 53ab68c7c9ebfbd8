//! RakNet message types for connection establishment.

mod addr;
mod already_connected;
mod incompatible_protocol_version;
mod open_connection_reply_1;
mod open_connection_reply_2;
mod open_connection_request_1;
mod open_connection_request_2;
mod rak_message;
mod unconnected_ping;
mod unconnected_pong;

pub use addr::*;
pub use already_connected::*;
pub use incompatible_protocol_version::*;
pub use open_connection_reply_1::*;
pub use open_connection_reply_2::*;
pub use open_connection_request_1::*;
pub use open_connection_request_2::*;
pub use rak_message::*;
pub use unconnected_ping::*;
pub use unconnected_pong::*;

/// Message IDs for the RakNet offline protocol.
pub mod id {
    pub const UNCONNECTED_PING: u8 = 0x01;
    pub const UNCONNECTED_PING_OPEN_CONNECTIONS: u8 = 0x02;
    pub const OPEN_CONNECTION_REQUEST_1: u8 = 0x05;
    pub const OPEN_CONNECTION_REPLY_1: u8 = 0x06;
    pub const OPEN_CONNECTION_REQUEST_2: u8 = 0x07;
    pub const OPEN_CONNECTION_REPLY_2: u8 = 0x08;
    pub const ALREADY_CONNECTED: u8 = 0x12;
    pub const INCOMPATIBLE_PROTOCOL_VERSION: u8 = 0x19;
    pub const UNCONNECTED_PONG: u8 = 0x1c;
}

/// Length of the magic sequence prefixing every offline message body.
pub const MAGIC_LEN: usize = 16;

/// The default magic sequence found in every unconnected RakNet message.
pub const UNCONNECTED_MESSAGE_SEQUENCE: [u8; MAGIC_LEN] = [
    0x00, 0xff, 0xff, 0x00, 0xfe, 0xfe, 0xfe, 0xfe,
    0xfd, 0xfd, 0xfd, 0xfd, 0x12, 0x34, 0x56, 0x78,
];
