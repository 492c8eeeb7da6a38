//! Live client connection registry.
//!
//! The registry is the single owner of client handles. Everything else
//! refers to a connection by its id, so a stale id is harmless: lookups just
//! miss. CDP clients and native clients live in separate maps because they
//! receive different traffic (native clients never see CDP frames).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Identifier of a client connection, unique for the process lifetime.
pub type ConnectionId = u64;

/// Which protocol a client speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    /// An automation client on the CDP port.
    Cdp,
    /// A native envelope client.
    Native,
}

/// A registered client connection.
///
/// The sender feeds the connection's dedicated writer task; frames from
/// concurrent sources are serialized by the channel, so they never
/// interleave on the socket.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    /// The connection's identifier.
    pub id: ConnectionId,
    /// CDP or native.
    pub kind: ClientKind,
    /// Outbound frame channel.
    pub tx: mpsc::Sender<String>,
    /// When the connection was accepted.
    pub connected_at: DateTime<Utc>,
}

/// The registry itself.
#[derive(Debug)]
pub struct Registry {
    next_id: AtomicU64,
    cdp: Mutex<HashMap<ConnectionId, ClientHandle>>,
    native: Mutex<HashMap<ConnectionId, ClientHandle>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            cdp: Mutex::new(HashMap::new()),
            native: Mutex::new(HashMap::new()),
        }
    }

    /// Register a freshly accepted connection and return its id.
    pub fn register(&self, kind: ClientKind, tx: mpsc::Sender<String>) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = ClientHandle {
            id,
            kind,
            tx,
            connected_at: Utc::now(),
        };
        match kind {
            ClientKind::Cdp => self.cdp.lock().insert(id, handle),
            ClientKind::Native => self.native.lock().insert(id, handle),
        };
        id
    }

    /// Drop a connection. Returns whether it was still registered.
    pub fn deregister(&self, kind: ClientKind, id: ConnectionId) -> bool {
        match kind {
            ClientKind::Cdp => self.cdp.lock().remove(&id).is_some(),
            ClientKind::Native => self.native.lock().remove(&id).is_some(),
        }
    }

    /// The writer channel of a CDP client, if it is still connected.
    pub fn cdp_sender(&self, id: ConnectionId) -> Option<mpsc::Sender<String>> {
        self.cdp.lock().get(&id).map(|h| h.tx.clone())
    }

    /// The writer channel of a native client, if it is still connected.
    pub fn native_sender(&self, id: ConnectionId) -> Option<mpsc::Sender<String>> {
        self.native.lock().get(&id).map(|h| h.tx.clone())
    }

    /// Snapshot of all live CDP client channels, for event fan-out.
    ///
    /// The snapshot is taken under the lock; sends happen outside it.
    pub fn cdp_senders(&self) -> Vec<(ConnectionId, mpsc::Sender<String>)> {
        self.cdp
            .lock()
            .values()
            .map(|h| (h.id, h.tx.clone()))
            .collect()
    }

    /// Number of live CDP clients.
    pub fn cdp_count(&self) -> usize {
        self.cdp.lock().len()
    }

    /// Number of live native clients.
    pub fn native_count(&self) -> usize {
        self.native.lock().len()
    }
}
