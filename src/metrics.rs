//! Optional metrics sink for the handshake layer.

use std::net::SocketAddr;

/// Sink for offline-phase events. All methods default to no-ops so
/// implementations only override what they record.
pub trait ServerMetrics: Send + Sync {
    /// An unconnected ping was received from the address.
    fn unconnected_ping(&self, _addr: SocketAddr) {}

    /// A connection-establishment packet (OPEN_CONNECTION_REQUEST_1 or _2)
    /// was received from the address.
    fn connection_init(&self, _addr: SocketAddr, _packet_id: u8) {}
}
