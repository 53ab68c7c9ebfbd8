//! Table of connections between OPEN_CONNECTION_REQUEST_1 and _2.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// How long a pending entry may wait for its OPEN_CONNECTION_REQUEST_2.
pub const PENDING_TTL: Duration = Duration::from_secs(10);

/// State recorded for a client that completed OPEN_CONNECTION_REQUEST_1.
#[derive(Debug, Clone, Copy)]
pub struct PendingConnection {
    pub protocol_version: u8,
    pub cookie: u32,
    pub created_at: Instant,
}

impl PendingConnection {
    /// Creates a pending entry stamped with the current time.
    pub fn new(protocol_version: u8, cookie: u32) -> Self {
        Self {
            protocol_version,
            cookie,
            created_at: Instant::now(),
        }
    }
}

/// Pending connections keyed by client address.
///
/// Shared between the I/O path (insert on OCR1, take on OCR2) and the
/// listener's GC task (expiry). Entries older than [`PENDING_TTL`] are
/// discarded without side effect.
#[derive(Debug, Default)]
pub struct PendingConnections {
    entries: Mutex<HashMap<SocketAddr, PendingConnection>>,
}

impl PendingConnections {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry for the address, returning the previous entry if
    /// one existed. A duplicate is a valid OCR1 retransmit; the newest
    /// cookie replaces the old one.
    pub fn insert(&self, addr: SocketAddr, entry: PendingConnection) -> Option<PendingConnection> {
        self.entries.lock().insert(addr, entry)
    }

    /// Atomically takes the entry for the address, if present and not yet
    /// expired. An expired entry is dropped and reported as absent.
    pub fn remove(&self, addr: &SocketAddr) -> Option<PendingConnection> {
        let entry = self.entries.lock().remove(addr)?;
        (entry.created_at.elapsed() <= PENDING_TTL).then_some(entry)
    }

    /// Drops every entry older than [`PENDING_TTL`].
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries
            .lock()
            .retain(|_, entry| now.duration_since(entry.created_at) <= PENDING_TTL);
    }

    /// Number of live entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_insert_take() {
        let table = PendingConnections::new();
        assert!(table.insert(addr(1), PendingConnection::new(11, 7)).is_none());

        let taken = table.remove(&addr(1)).unwrap();
        assert_eq!(taken.protocol_version, 11);
        assert_eq!(taken.cookie, 7);

        // Take is atomic: a second remove finds nothing
        assert!(table.remove(&addr(1)).is_none());
    }

    #[test]
    fn test_duplicate_overwrites() {
        let table = PendingConnections::new();
        table.insert(addr(1), PendingConnection::new(11, 1));
        let old = table.insert(addr(1), PendingConnection::new(11, 2)).unwrap();
        assert_eq!(old.cookie, 1);
        assert_eq!(table.remove(&addr(1)).unwrap().cookie, 2);
    }

    #[test]
    fn test_expired_entry_is_absent() {
        let table = PendingConnections::new();
        let stale = PendingConnection {
            protocol_version: 11,
            cookie: 0,
            created_at: Instant::now() - (PENDING_TTL + Duration::from_secs(1)),
        };
        table.insert(addr(1), stale);
        assert!(table.remove(&addr(1)).is_none());
    }

    #[test]
    fn test_purge_expired() {
        let table = PendingConnections::new();
        let stale = PendingConnection {
            protocol_version: 11,
            cookie: 0,
            created_at: Instant::now() - (PENDING_TTL + Duration::from_secs(1)),
        };
        table.insert(addr(1), stale);
        table.insert(addr(2), PendingConnection::new(11, 0));

        table.purge_expired();
        assert_eq!(table.len(), 1);
        assert!(table.remove(&addr(2)).is_some());
    }
}
