//! User message container handed to the reliable layer.

use bytes::Bytes;

/// How a message may be dropped, duplicated or reordered in transit.
///
/// The discriminants are the RakNet reliability ids used in the datagram
/// encapsulation header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Reliability {
    Unreliable = 0,
    UnreliableSequenced = 1,
    Reliable = 2,
    ReliableOrdered = 3,
    ReliableSequenced = 4,
}

/// Send priority of a message relative to others queued on the same
/// connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    Immediate,
    High,
    Normal,
    Low,
}

/// A user payload queued for delivery over an established session,
/// together with the parameters the reliable layer sends it with.
///
/// Two messages are equal iff payload, reliability, priority and channel
/// all match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RakMessage {
    pub payload: Bytes,
    pub reliability: Reliability,
    pub priority: Priority,
    pub channel: u8,
}

impl RakMessage {
    /// Creates a message with the default send parameters
    /// (reliable ordered, normal priority, channel 0).
    pub fn new(payload: Bytes) -> Self {
        Self {
            payload,
            reliability: Reliability::ReliableOrdered,
            priority: Priority::Normal,
            channel: 0,
        }
    }

    /// Creates a message with explicit send parameters.
    pub fn with_params(
        payload: Bytes,
        reliability: Reliability,
        priority: Priority,
        channel: u8,
    ) -> Self {
        Self {
            payload,
            reliability,
            priority,
            channel,
        }
    }
}
