//! Offline handshake handling.
//!
//! Implements ping/pong and the two-phase OPEN_CONNECTION_REQUEST exchange
//! that precedes a reliable session: MTU negotiation, protocol version
//! gating and the cookie challenge binding request 2 to request 1's return
//! path. State is per-address and implicit: an entry in the pending table
//! means the address is between request 1 and request 2.

use std::net::SocketAddr;
use std::sync::Arc;

use rand::{Rng as _, TryRngCore as _};
use tokio::net::UdpSocket;

use crate::classifier::is_offline_message;
use crate::config::ListenConfig;
use crate::error::Result;
use crate::message::{
    id, AlreadyConnected, IncompatibleProtocolVersion, OpenConnectionReply1,
    OpenConnectionReply2, OpenConnectionRequest1, OpenConnectionRequest2, UnconnectedPing,
    UnconnectedPong,
};
use crate::pending::{PendingConnection, PendingConnections};
use crate::{IPV4_HEADER_SIZE, IPV6_HEADER_SIZE, UDP_HEADER_SIZE};

/// An unconnected ping forwarded to the [`ServerHandler`] when
/// [`ListenConfig::handle_ping`] is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RakPing {
    pub ping_time: i64,
    pub sender: SocketAddr,
}

/// Upward-facing interface of the handshake layer.
pub trait ServerHandler: Send + Sync + 'static {
    /// Session created when a handshake completes. Opaque to this layer.
    type Session: Send + 'static;

    /// Creates a session for a client that completed the handshake.
    /// Returning `None` signals that a session already exists for the
    /// address; the client is answered with ALREADY_CONNECTED.
    fn create_child_session(
        &self,
        client_addr: SocketAddr,
        client_guid: u64,
        protocol_version: u8,
        mtu: u16,
    ) -> Option<Self::Session>;

    /// Receives pings when [`ListenConfig::handle_ping`] routes them here
    /// instead of answering with a pong.
    fn on_unconnected_ping(&self, _ping: RakPing) {}

    /// Receives datagrams that are not offline traffic. These belong to
    /// established sessions and are passed through unchanged.
    fn on_session_datagram(&self, _sender: SocketAddr, _data: &[u8]) {}
}

/// Outcome of offering a datagram to the offline handshake layer.
#[derive(Debug)]
pub enum Inbound<S> {
    /// Not offline traffic; belongs to the layers above.
    Pass,
    /// Offline traffic, consumed (a reply was sent, or the datagram was
    /// dropped on purpose).
    Handled,
    /// The final handshake message: a session was established.
    Established(S),
}

/// Handler for the offline phase of every client connection.
pub struct OfflineHandler<H: ServerHandler> {
    config: ListenConfig,
    guid: u64,
    /// Sorted copy of the configured protocol versions.
    supported_protocols: Option<Vec<u8>>,
    socket: Arc<UdpSocket>,
    handler: Arc<H>,
    pending: PendingConnections,
}

impl<H: ServerHandler> OfflineHandler<H> {
    /// Creates a handler for the socket. Fails if the configuration is
    /// invalid.
    pub fn new(config: ListenConfig, socket: Arc<UdpSocket>, handler: Arc<H>) -> Result<Self> {
        config.validate()?;

        let guid = config.guid.unwrap_or_else(|| rand::rng().random());
        let supported_protocols = config.supported_protocols.clone().map(|mut protocols| {
            protocols.sort_unstable();
            protocols.dedup();
            protocols
        });

        Ok(Self {
            config,
            guid,
            supported_protocols,
            socket,
            handler,
            pending: PendingConnections::new(),
        })
    }

    /// Returns the server GUID echoed in replies.
    pub fn guid(&self) -> u64 {
        self.guid
    }

    /// Drops pending handshakes that timed out waiting for request 2.
    pub fn purge_expired(&self) {
        self.pending.purge_expired();
    }

    /// Offers a datagram to the handshake layer.
    ///
    /// Datagrams that are not offline traffic are not touched and come
    /// back as [`Inbound::Pass`]. Offline datagrams that fail to parse
    /// past the magic are reported as errors; no reply is ever sent for
    /// them.
    pub async fn handle(&self, data: &[u8], sender: SocketAddr) -> Result<Inbound<H::Session>> {
        if !is_offline_message(data, &self.config.magic) {
            return Ok(Inbound::Pass);
        }

        let metrics = self.config.metrics.as_deref();
        match data[0] {
            id::UNCONNECTED_PING => {
                if let Some(metrics) = metrics {
                    metrics.unconnected_ping(sender);
                }
                self.on_unconnected_ping(&data[1..], sender).await?;
                Ok(Inbound::Handled)
            }
            id::OPEN_CONNECTION_REQUEST_1 => {
                if let Some(metrics) = metrics {
                    metrics.connection_init(sender, id::OPEN_CONNECTION_REQUEST_1);
                }
                self.on_open_connection_request_1(data, sender).await?;
                Ok(Inbound::Handled)
            }
            id::OPEN_CONNECTION_REQUEST_2 => {
                if let Some(metrics) = metrics {
                    metrics.connection_init(sender, id::OPEN_CONNECTION_REQUEST_2);
                }
                self.on_open_connection_request_2(&data[1..], sender).await
            }
            _ => Ok(Inbound::Pass),
        }
    }

    async fn on_unconnected_ping(&self, body: &[u8], sender: SocketAddr) -> Result<()> {
        let ping = UnconnectedPing::read(body)?;

        if self.config.handle_ping {
            self.handler.on_unconnected_ping(RakPing {
                ping_time: ping.ping_time,
                sender,
            });
            return Ok(());
        }

        let pong = UnconnectedPong::new(ping.ping_time, self.guid, self.config.advertisement.clone());
        self.send(&pong.write(&self.config.magic), sender).await
    }

    async fn on_open_connection_request_1(&self, data: &[u8], sender: SocketAddr) -> Result<()> {
        let request = OpenConnectionRequest1::read(&data[1..])?;

        // The client pads the body to its desired MTU; the negotiated
        // value adds the headers the padding stands in for.
        let ip_header_size = if sender.is_ipv6() {
            IPV6_HEADER_SIZE
        } else {
            IPV4_HEADER_SIZE
        };
        let mtu_candidate = data.len() + ip_header_size + UDP_HEADER_SIZE;

        if let Some(protocols) = &self.supported_protocols {
            if protocols.binary_search(&request.protocol_version).is_err() {
                if let Some(&latest) = protocols.last() {
                    let reply = IncompatibleProtocolVersion::new(latest, self.guid);
                    self.send(&reply.write(&self.config.magic), sender).await?;
                }
                return Ok(());
            }
        }

        let cookie = if self.config.send_cookie {
            self.random_cookie()
        } else {
            0
        };

        let previous = self
            .pending
            .insert(sender, PendingConnection::new(request.protocol_version, cookie));
        if previous.is_some() {
            tracing::trace!("received duplicate open connection request 1 from {}", sender);
        }

        let mtu = mtu_candidate.clamp(self.config.min_mtu as usize, self.config.max_mtu as usize);
        let reply = if self.config.send_cookie {
            OpenConnectionReply1::with_security(self.guid, cookie, mtu as u16)
        } else {
            OpenConnectionReply1::new(self.guid, mtu as u16)
        };
        self.send(&reply.write(&self.config.magic), sender).await
    }

    async fn on_open_connection_request_2(
        &self,
        body: &[u8],
        sender: SocketAddr,
    ) -> Result<Inbound<H::Session>> {
        // Taking the entry first makes a replayed request 2 start over
        // from request 1, whatever else is wrong with it.
        let Some(pending) = self.pending.remove(&sender) else {
            tracing::trace!(
                "received open connection request 2 from {} without open connection request 1",
                sender
            );
            return Ok(Inbound::Handled);
        };

        let request = OpenConnectionRequest2::read(body, self.config.send_cookie)?;

        if self.config.send_cookie && !cookie_matches(request.cookie, pending.cookie) {
            // Likely source address spoofing; do not reply
            tracing::trace!(
                "received open connection request 2 from {} with invalid cookie",
                sender
            );
            return Ok(Inbound::Handled);
        }

        if request.mtu < self.config.min_mtu || request.mtu > self.config.max_mtu {
            // The client already negotiated a value inside the bounds
            self.send_already_connected(sender).await?;
            return Ok(Inbound::Handled);
        }

        let Some(session) = self.handler.create_child_session(
            sender,
            request.client_guid,
            pending.protocol_version,
            request.mtu,
        ) else {
            self.send_already_connected(sender).await?;
            return Ok(Inbound::Handled);
        };

        let reply = OpenConnectionReply2::new(self.guid, sender, request.mtu);
        self.send(&reply.write(&self.config.magic), sender).await?;
        Ok(Inbound::Established(session))
    }

    async fn send_already_connected(&self, sender: SocketAddr) -> Result<()> {
        let reply = AlreadyConnected::new(self.guid);
        self.send(&reply.write(&self.config.magic), sender).await
    }

    async fn send(&self, data: &[u8], addr: SocketAddr) -> Result<()> {
        self.socket.send_to(data, addr).await?;
        Ok(())
    }

    /// Draws a handshake cookie from the operating system's RNG, falling
    /// back to the thread-local generator if that source is unavailable.
    fn random_cookie(&self) -> u32 {
        match rand::rngs::OsRng.try_next_u32() {
            Ok(cookie) => cookie,
            Err(_) => rand::rng().random(),
        }
    }
}

/// Compares cookies via xor so the check has no data-dependent branch.
fn cookie_matches(got: u32, expected: u32) -> bool {
    got ^ expected == 0
}
