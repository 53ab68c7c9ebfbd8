//! RakNet listener: socket loop around the offline handshake layer.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex as TokioMutex};

use crate::config::ListenConfig;
use crate::error::{Error, Result};
use crate::handler::{Inbound, OfflineHandler, ServerHandler};
use crate::proxy::{self, AddressFamily, Command};

/// A RakNet connection listener.
///
/// Owns the UDP socket and drives every datagram through the PROXY
/// decoder (when configured), the offline classifier and the handshake
/// state machine. Sessions created by the [`ServerHandler`] are also
/// queued for [`Listener::accept`].
pub struct Listener<H: ServerHandler> {
    /// The underlying UDP socket.
    socket: Arc<UdpSocket>,

    /// Offline handshake state machine.
    offline: OfflineHandler<H>,

    handler: Arc<H>,

    /// Whether incoming datagrams start with a PROXY protocol header.
    proxy_protocol: bool,

    /// Whether the listener is closed.
    closed: AtomicBool,

    /// Channel for established sessions.
    incoming_tx: mpsc::Sender<H::Session>,
    incoming_rx: TokioMutex<mpsc::Receiver<H::Session>>,

    /// Blocked IP addresses.
    blocks: Mutex<HashMap<[u8; 16], Instant>>,

    /// Block count for fast-path checking.
    block_count: AtomicU32,

    /// Duration to block IP addresses after errors.
    block_duration: Duration,
}

impl<H: ServerHandler> Listener<H> {
    /// Creates a listener bound to the given address with the default
    /// configuration.
    pub async fn bind(addr: &str, handler: H) -> Result<Arc<Self>> {
        Self::bind_with(addr, ListenConfig::default(), handler).await
    }

    /// Creates a listener bound to the given address.
    pub async fn bind_with(addr: &str, config: ListenConfig, handler: H) -> Result<Arc<Self>> {
        let socket = UdpSocket::bind(addr).await.map_err(Error::Io)?;
        let socket = Arc::new(socket);

        let proxy_protocol = config.proxy_protocol;
        let block_duration = config.block_duration;
        let handler = Arc::new(handler);
        let offline = OfflineHandler::new(config, Arc::clone(&socket), Arc::clone(&handler))?;

        let (incoming_tx, incoming_rx) = mpsc::channel(64);

        let listener = Arc::new(Listener {
            socket,
            offline,
            handler,
            proxy_protocol,
            closed: AtomicBool::new(false),
            incoming_tx,
            incoming_rx: TokioMutex::new(incoming_rx),
            blocks: Mutex::new(HashMap::new()),
            block_count: AtomicU32::new(0),
            block_duration,
        });

        let listener_clone = Arc::clone(&listener);
        tokio::spawn(async move {
            listener_clone.listen().await;
        });

        let listener_clone = Arc::clone(&listener);
        tokio::spawn(async move {
            listener_clone.gc().await;
        });

        Ok(listener)
    }

    /// Waits for the next session established through the handshake.
    pub async fn accept(&self) -> Result<H::Session> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ListenerClosed);
        }

        let mut rx = self.incoming_rx.lock().await;
        rx.recv().await.ok_or(Error::ListenerClosed)
    }

    /// Returns the local address of the listener.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(Error::Io)
    }

    /// Returns the server GUID.
    pub fn guid(&self) -> u64 {
        self.offline.guid()
    }

    /// Closes the listener. The receive loop stops at the next datagram.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Main listen loop.
    async fn listen(self: Arc<Self>) {
        let mut buf = vec![0u8; 4096];

        loop {
            if self.closed.load(Ordering::SeqCst) {
                return;
            }

            let (n, sender) = match self.socket.recv_from(&mut buf).await {
                Ok(result) => result,
                Err(e) => {
                    if self.closed.load(Ordering::SeqCst) {
                        return;
                    }
                    tracing::error!("read from: {}", e);
                    continue;
                }
            };

            if n == 0 || self.is_blocked(&sender) {
                continue;
            }

            if let Err(e) = self.process(&buf[..n], sender).await {
                tracing::debug!("handle packet from {}: {}", sender, e);
                self.block(&sender);
            }
        }
    }

    /// Handles one datagram: PROXY header, then the offline layer, then
    /// pass-through to the session layer.
    async fn process(&self, datagram: &[u8], socket_sender: SocketAddr) -> Result<()> {
        let (sender, payload) = if self.proxy_protocol {
            self.resolve_proxied(datagram, socket_sender)?
        } else {
            (socket_sender, datagram)
        };

        match self.offline.handle(payload, sender).await? {
            Inbound::Pass => self.handler.on_session_datagram(sender, payload),
            Inbound::Handled => {}
            Inbound::Established(session) => {
                if self.incoming_tx.try_send(session).is_err() {
                    tracing::debug!("accept queue full, dropping session handle for {}", sender);
                }
            }
        }
        Ok(())
    }

    /// Strips a PROXY header off the datagram and recovers the true
    /// client address from it.
    ///
    /// A datagram without a detectable header is passed on unchanged:
    /// only the first datagram of a flow carries one. LOCAL commands and
    /// UNKNOWN or UNIX families keep the socket address.
    fn resolve_proxied<'a>(
        &self,
        datagram: &'a [u8],
        socket_sender: SocketAddr,
    ) -> Result<(SocketAddr, &'a [u8])> {
        if proxy::detect_version(datagram).is_none() {
            return Ok((socket_sender, datagram));
        }

        let (message, payload) = proxy::decode_datagram(datagram)?;
        let sender = match message.proxied_protocol.address_family() {
            AddressFamily::Inet | AddressFamily::Inet6 if message.command == Command::Proxy => {
                message.source_socket_addr().map_err(Error::Proxy)?
            }
            _ => socket_sender,
        };
        Ok((sender, payload))
    }

    /// Blocks an IP address.
    fn block(&self, addr: &SocketAddr) {
        if self.block_duration.is_zero() {
            return;
        }

        let ip = match addr.ip() {
            std::net::IpAddr::V4(ip) => ip.to_ipv6_mapped().octets(),
            std::net::IpAddr::V6(ip) => ip.octets(),
        };

        self.block_count.fetch_add(1, Ordering::Relaxed);
        self.blocks.lock().insert(ip, Instant::now());
    }

    /// Checks if an IP address is blocked.
    fn is_blocked(&self, addr: &SocketAddr) -> bool {
        if self.block_duration.is_zero() || self.block_count.load(Ordering::Relaxed) == 0 {
            return false;
        }

        let ip = match addr.ip() {
            std::net::IpAddr::V4(ip) => ip.to_ipv6_mapped().octets(),
            std::net::IpAddr::V6(ip) => ip.octets(),
        };

        self.blocks.lock().contains_key(&ip)
    }

    /// Expires blocked addresses and timed-out pending handshakes.
    async fn gc(self: Arc<Self>) {
        let mut interval = tokio::time::interval(Duration::from_secs(1));

        loop {
            interval.tick().await;

            if self.closed.load(Ordering::SeqCst) {
                return;
            }

            self.offline.purge_expired();

            if self.block_count.load(Ordering::Relaxed) == 0 {
                continue;
            }

            let now = Instant::now();
            let mut blocks = self.blocks.lock();
            blocks.retain(|_, t| now.duration_since(*t) <= self.block_duration);
            self.block_count
                .store(blocks.len() as u32, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio::time::timeout;

    use super::*;
    use crate::message::{id, MAGIC_LEN, UNCONNECTED_MESSAGE_SEQUENCE};
    use crate::proxy::V2_SIGNATURE;

    const MAGIC: [u8; MAGIC_LEN] = UNCONNECTED_MESSAGE_SEQUENCE;

    #[derive(Default)]
    struct EchoHandler {
        datagrams: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
    }

    impl ServerHandler for EchoHandler {
        type Session = SocketAddr;

        fn create_child_session(
            &self,
            client_addr: SocketAddr,
            _client_guid: u64,
            _protocol_version: u8,
            _mtu: u16,
        ) -> Option<SocketAddr> {
            Some(client_addr)
        }

        fn on_session_datagram(&self, sender: SocketAddr, data: &[u8]) {
            self.datagrams.lock().push((sender, data.to_vec()));
        }
    }

    fn ping(ping_time: i64) -> Vec<u8> {
        let mut data = vec![id::UNCONNECTED_PING];
        data.extend_from_slice(&ping_time.to_be_bytes());
        data.extend_from_slice(&MAGIC);
        data.extend_from_slice(&1u64.to_be_bytes());
        data
    }

    async fn recv(client: &UdpSocket) -> Vec<u8> {
        let mut buf = vec![0u8; 2048];
        let n = timeout(Duration::from_secs(1), client.recv(&mut buf))
            .await
            .expect("expected a reply")
            .unwrap();
        buf.truncate(n);
        buf
    }

    #[tokio::test]
    async fn test_end_to_end_handshake() {
        let config = ListenConfig {
            guid: Some(7),
            send_cookie: false,
            ..Default::default()
        };
        let listener = Listener::bind_with("127.0.0.1:0", config, EchoHandler::default())
            .await
            .unwrap();
        let server_addr = listener.local_addr().unwrap();

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(server_addr).await.unwrap();
        let client_addr = client.local_addr().unwrap();

        client.send(&ping(1)).await.unwrap();
        assert_eq!(recv(&client).await[0], id::UNCONNECTED_PONG);

        let mut ocr1 = vec![id::OPEN_CONNECTION_REQUEST_1];
        ocr1.extend_from_slice(&MAGIC);
        ocr1.push(11);
        ocr1.resize(ocr1.len() + 1000, 0);
        client.send(&ocr1).await.unwrap();

        let reply = recv(&client).await;
        assert_eq!(reply[0], id::OPEN_CONNECTION_REPLY_1);
        let mtu = u16::from_be_bytes(reply[26..28].try_into().unwrap());

        let mut ocr2 = vec![id::OPEN_CONNECTION_REQUEST_2];
        ocr2.extend_from_slice(&MAGIC);
        crate::message::write_addr(&mut ocr2, &server_addr);
        ocr2.extend_from_slice(&mtu.to_be_bytes());
        ocr2.extend_from_slice(&9u64.to_be_bytes());
        client.send(&ocr2).await.unwrap();

        assert_eq!(recv(&client).await[0], id::OPEN_CONNECTION_REPLY_2);
        let session = timeout(Duration::from_secs(1), listener.accept())
            .await
            .expect("expected a session")
            .unwrap();
        assert_eq!(session, client_addr);
    }

    #[tokio::test]
    async fn test_session_datagrams_pass_through() {
        let listener = Listener::bind_with(
            "127.0.0.1:0",
            ListenConfig {
                guid: Some(7),
                ..Default::default()
            },
            EchoHandler::default(),
        )
        .await
        .unwrap();

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(listener.local_addr().unwrap()).await.unwrap();
        let datagram = [0x84, 0x00, 0x00, 0x00];
        client.send(&datagram).await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        let datagrams = listener.handler.datagrams.lock();
        assert_eq!(
            datagrams.as_slice(),
            &[(client.local_addr().unwrap(), datagram.to_vec())]
        );
    }

    #[tokio::test]
    async fn test_proxied_ping_recovers_client_address() {
        let config = ListenConfig {
            guid: Some(7),
            proxy_protocol: true,
            ..Default::default()
        };
        let listener = Listener::bind_with("127.0.0.1:0", config, EchoHandler::default())
            .await
            .unwrap();

        // Stands in for both the balancer and the client it proxies for
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(listener.local_addr().unwrap()).await.unwrap();
        let client_addr = client.local_addr().unwrap();

        let std::net::IpAddr::V4(client_ip) = client_addr.ip() else {
            unreachable!();
        };
        let mut datagram = Vec::new();
        datagram.extend_from_slice(&V2_SIGNATURE);
        datagram.push(0x21);
        datagram.push(0x12); // UDP4
        datagram.extend_from_slice(&12u16.to_be_bytes());
        datagram.extend_from_slice(&client_ip.octets());
        datagram.extend_from_slice(&[127, 0, 0, 1]);
        datagram.extend_from_slice(&client_addr.port().to_be_bytes());
        datagram.extend_from_slice(&19132u16.to_be_bytes());
        datagram.extend_from_slice(&ping(5));
        client.send(&datagram).await.unwrap();

        // The pong goes to the address named in the header
        let reply = recv(&client).await;
        assert_eq!(reply[0], id::UNCONNECTED_PONG);
        assert_eq!(&reply[1..9], &5i64.to_be_bytes());
    }
}
