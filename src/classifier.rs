//! Offline datagram classifier.
//!
//! Decides whether an incoming datagram belongs to the offline handshake
//! layer. Anything rejected here is left untouched for the layers that
//! handle established sessions.

use crate::message::{id, MAGIC_LEN};

/// Returns whether the datagram is an offline handshake message for the
/// given magic.
///
/// Accepted opcodes are UNCONNECTED_PING, OPEN_CONNECTION_REQUEST_1 and
/// OPEN_CONNECTION_REQUEST_2, each followed by the magic sequence. For
/// pings the 8-byte timestamp between opcode and magic is skipped when
/// present; a shorter body is checked against the magic as-is and fails.
///
/// Operates on the slice without consuming it, so the caller's view of the
/// datagram is unchanged whatever the outcome.
pub fn is_offline_message(data: &[u8], magic: &[u8; MAGIC_LEN]) -> bool {
    let Some((&opcode, body)) = data.split_first() else {
        return false;
    };

    let body = match opcode {
        id::UNCONNECTED_PING if body.len() >= 8 => &body[8..],
        id::UNCONNECTED_PING => body,
        id::OPEN_CONNECTION_REQUEST_1 | id::OPEN_CONNECTION_REQUEST_2 => body,
        _ => return false,
    };

    body.len() >= MAGIC_LEN && body[..MAGIC_LEN] == *magic
}
