//! Request correlation across two id spaces.
//!
//! Three pending tables tie in-flight requests to their originating
//! connections. Browser-bound requests get a fresh id from a dedicated
//! monotonic counter (the browser sees a single connection and needs
//! globally unique ids; counter ids are never reused within a process
//! lifetime). Agent-bound requests keep the client's id; the envelope
//! carries the originating connection out of band.
//!
//! Records hold connection identifiers only, never handles: a record that
//! outlives its connection is harmless, and purge-on-disconnect removes it
//! before the id could ever be reused.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;

use crate::envelope::id_key;
use crate::registry::ConnectionId;

/// The backend route a pending CDP request took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingRoute {
    /// Forwarded to the browser under a rewritten id.
    Browser {
        /// The id used on the browser link.
        rewritten: u64,
    },
    /// Wrapped for the agent under an envelope key.
    Agent {
        /// The envelope id's canonical key.
        key: String,
    },
}

/// An in-flight request from a CDP client.
#[derive(Debug, Clone)]
pub struct PendingCdp {
    /// Originating client connection.
    pub conn: ConnectionId,
    /// The client's own request id.
    pub client_id: u64,
    /// Method name, kept for diagnostics.
    pub method: String,
    /// Session id, if the request carried one.
    pub session_id: Option<String>,
    /// The client's message, verbatim.
    pub original: Value,
    /// When the record was created.
    pub created_at: Instant,
    /// Which backend holds the request.
    pub route: PendingRoute,
}

/// Shadow record for a browser-bound request, keyed by rewritten id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingBrowser {
    /// Originating client connection.
    pub conn: ConnectionId,
    /// The id to restore on the way back.
    pub client_id: u64,
}

/// Who originated an agent-bound request.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOrigin {
    /// A CDP client whose request was wrapped in a `BROP_CDP` envelope.
    Cdp {
        /// Originating connection.
        conn: ConnectionId,
        /// The client's request id.
        client_id: u64,
    },
    /// A native client command.
    Native {
        /// Originating connection.
        conn: ConnectionId,
        /// The client's request id, echoed verbatim in replies.
        id: Value,
    },
}

/// An in-flight agent-bound request.
#[derive(Debug, Clone)]
pub struct PendingAgent {
    /// Who asked.
    pub origin: AgentOrigin,
    /// When the record was created.
    pub created_at: Instant,
}

/// A record removed without its response; the router owes this party an
/// error (superseded, unavailable, or timeout depending on the caller).
#[derive(Debug, Clone, PartialEq)]
pub enum PendingNotice {
    /// Notify a CDP client on this request id.
    Cdp {
        /// Connection to notify.
        conn: ConnectionId,
        /// Request id to answer.
        client_id: u64,
    },
    /// Notify a native client on this request id.
    Native {
        /// Connection to notify.
        conn: ConnectionId,
        /// Request id to answer.
        id: Value,
    },
}

impl From<AgentOrigin> for PendingNotice {
    fn from(origin: AgentOrigin) -> Self {
        match origin {
            AgentOrigin::Cdp { conn, client_id } => Self::Cdp { conn, client_id },
            AgentOrigin::Native { conn, id } => Self::Native { conn, id },
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    cdp: HashMap<(ConnectionId, u64), PendingCdp>,
    browser: HashMap<u64, PendingBrowser>,
    agent: HashMap<String, PendingAgent>,
}

impl Tables {
    /// Remove a CDP record and its shadow entry in whichever backend table
    /// the route points at.
    fn remove_cdp(&mut self, conn: ConnectionId, client_id: u64) -> Option<PendingCdp> {
        let record = self.cdp.remove(&(conn, client_id))?;
        match &record.route {
            PendingRoute::Browser { rewritten } => {
                self.browser.remove(rewritten);
            }
            PendingRoute::Agent { key } => {
                // The key may have been taken over by a newer request from
                // another connection; only remove our own entry.
                let ours = self.agent.get(key).is_some_and(|e| {
                    e.origin
                        == AgentOrigin::Cdp {
                            conn,
                            client_id,
                        }
                });
                if ours {
                    self.agent.remove(key);
                }
            }
        }
        Some(record)
    }

    /// Remove an agent entry by key, together with the CDP record that
    /// shadows it (if the origin was a CDP client).
    fn remove_agent_key(&mut self, key: &str) -> Option<PendingNotice> {
        let entry = self.agent.remove(key)?;
        if let AgentOrigin::Cdp { conn, client_id } = entry.origin {
            let matches = self
                .cdp
                .get(&(conn, client_id))
                .is_some_and(|r| r.route == PendingRoute::Agent { key: key.to_string() });
            if matches {
                self.cdp.remove(&(conn, client_id));
            }
        }
        Some(entry.origin.into())
    }
}

/// The three pending tables plus the rewritten-id counter.
#[derive(Debug)]
pub struct Correlator {
    next_browser_id: AtomicU64,
    inner: Mutex<Tables>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    /// Create an empty correlator.
    pub fn new() -> Self {
        Self {
            next_browser_id: AtomicU64::new(1),
            inner: Mutex::new(Tables::default()),
        }
    }

    /// Register a browser-routed request. Allocates the rewritten id and
    /// stores both the CDP record and its browser shadow.
    ///
    /// Returns the rewritten id and, when the client reused an in-flight id,
    /// a notice for the superseded earlier request.
    pub fn register_browser(
        &self,
        conn: ConnectionId,
        client_id: u64,
        method: &str,
        session_id: Option<String>,
        original: Value,
    ) -> (u64, Option<PendingNotice>) {
        let rewritten = self.next_browser_id.fetch_add(1, Ordering::Relaxed);
        let mut tables = self.inner.lock();
        let superseded = tables
            .remove_cdp(conn, client_id)
            .map(|_| PendingNotice::Cdp { conn, client_id });
        tables.cdp.insert(
            (conn, client_id),
            PendingCdp {
                conn,
                client_id,
                method: method.to_string(),
                session_id,
                original,
                created_at: Instant::now(),
                route: PendingRoute::Browser { rewritten },
            },
        );
        tables
            .browser
            .insert(rewritten, PendingBrowser { conn, client_id });
        (rewritten, superseded)
    }

    /// Register an agent-routed CDP request. The envelope key is the
    /// client's own id.
    ///
    /// Returns the key plus notices for any superseded records: the same
    /// client reusing an in-flight id, and/or another request that held the
    /// same envelope key.
    pub fn register_agent_cdp(
        &self,
        conn: ConnectionId,
        client_id: u64,
        method: &str,
        session_id: Option<String>,
        original: Value,
    ) -> (String, Vec<PendingNotice>) {
        let key = id_key(&Value::from(client_id));
        let mut tables = self.inner.lock();
        let mut notices = Vec::new();
        if tables.remove_cdp(conn, client_id).is_some() {
            notices.push(PendingNotice::Cdp { conn, client_id });
        }
        if let Some(notice) = tables.remove_agent_key(&key) {
            notices.push(notice);
        }
        tables.cdp.insert(
            (conn, client_id),
            PendingCdp {
                conn,
                client_id,
                method: method.to_string(),
                session_id,
                original,
                created_at: Instant::now(),
                route: PendingRoute::Agent { key: key.clone() },
            },
        );
        tables.agent.insert(
            key.clone(),
            PendingAgent {
                origin: AgentOrigin::Cdp { conn, client_id },
                created_at: Instant::now(),
            },
        );
        (key, notices)
    }

    /// Register a native client command.
    pub fn register_agent_native(
        &self,
        conn: ConnectionId,
        id: &Value,
    ) -> (String, Option<PendingNotice>) {
        let key = id_key(id);
        let mut tables = self.inner.lock();
        let superseded = tables.remove_agent_key(&key);
        tables.agent.insert(
            key.clone(),
            PendingAgent {
                origin: AgentOrigin::Native {
                    conn,
                    id: id.clone(),
                },
                created_at: Instant::now(),
            },
        );
        (key, superseded)
    }

    /// Resolve a browser response by rewritten id, removing both records.
    /// `None` means the id is unknown (late reply after a purge): drop it.
    pub fn resolve_browser(&self, rewritten: u64) -> Option<PendingBrowser> {
        let mut tables = self.inner.lock();
        let shadow = tables.browser.remove(&rewritten)?;
        let matches = tables
            .cdp
            .get(&(shadow.conn, shadow.client_id))
            .is_some_and(|r| r.route == PendingRoute::Browser { rewritten });
        if matches {
            tables.cdp.remove(&(shadow.conn, shadow.client_id));
        }
        Some(shadow)
    }

    /// Resolve an agent response by envelope key, removing the records.
    pub fn resolve_agent(&self, key: &str) -> Option<AgentOrigin> {
        let mut tables = self.inner.lock();
        let entry = tables.agent.remove(key)?;
        if let AgentOrigin::Cdp { conn, client_id } = &entry.origin {
            let matches = tables
                .cdp
                .get(&(*conn, *client_id))
                .is_some_and(|r| r.route == PendingRoute::Agent { key: key.to_string() });
            if matches {
                tables.cdp.remove(&(*conn, *client_id));
            }
        }
        Some(entry.origin)
    }

    /// Remove every record referencing a closed connection. Late backend
    /// replies for these requests will miss their lookup and be dropped.
    pub fn purge_connection(&self, conn: ConnectionId) -> usize {
        let mut tables = self.inner.lock();
        let keys: Vec<(ConnectionId, u64)> = tables
            .cdp
            .keys()
            .filter(|(c, _)| *c == conn)
            .copied()
            .collect();
        let mut removed = keys.len();
        for (c, id) in keys {
            tables.remove_cdp(c, id);
        }
        let before = tables.agent.len();
        tables.agent.retain(|_, e| match &e.origin {
            AgentOrigin::Cdp { conn: c, .. } | AgentOrigin::Native { conn: c, .. } => *c != conn,
        });
        removed += before - tables.agent.len();
        tables.browser.retain(|_, s| s.conn != conn);
        removed
    }

    /// Drain every agent-bound record; the agent link is gone and each
    /// caller is owed an unavailable error.
    pub fn fail_all_agent(&self) -> Vec<PendingNotice> {
        let mut tables = self.inner.lock();
        let keys: Vec<String> = tables.agent.keys().cloned().collect();
        keys.iter()
            .filter_map(|key| tables.remove_agent_key(key))
            .collect()
    }

    /// Drain every browser-bound record; the browser link is gone.
    pub fn fail_all_browser(&self) -> Vec<PendingNotice> {
        let mut tables = self.inner.lock();
        let rewritten: Vec<u64> = tables.browser.keys().copied().collect();
        let mut notices = Vec::with_capacity(rewritten.len());
        for id in rewritten {
            if let Some(shadow) = tables.browser.remove(&id) {
                tables.cdp.remove(&(shadow.conn, shadow.client_id));
                notices.push(PendingNotice::Cdp {
                    conn: shadow.conn,
                    client_id: shadow.client_id,
                });
            }
        }
        notices
    }

    /// Remove records older than `deadline` and return the parties owed a
    /// timeout error.
    pub fn expire(&self, deadline: Duration) -> Vec<PendingNotice> {
        let now = Instant::now();
        let mut tables = self.inner.lock();

        let expired_cdp: Vec<(ConnectionId, u64)> = tables
            .cdp
            .iter()
            .filter(|(_, r)| now.duration_since(r.created_at) >= deadline)
            .map(|(k, _)| *k)
            .collect();
        let mut notices: Vec<PendingNotice> = Vec::new();
        for (conn, client_id) in expired_cdp {
            if tables.remove_cdp(conn, client_id).is_some() {
                notices.push(PendingNotice::Cdp { conn, client_id });
            }
        }

        let expired_native: Vec<String> = tables
            .agent
            .iter()
            .filter(|(_, e)| {
                matches!(e.origin, AgentOrigin::Native { .. })
                    && now.duration_since(e.created_at) >= deadline
            })
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired_native {
            if let Some(notice) = tables.remove_agent_key(&key) {
                notices.push(notice);
            }
        }
        notices
    }

    /// Current table sizes (cdp, browser, agent), for diagnostics.
    pub fn pending_counts(&self) -> (usize, usize, usize) {
        let tables = self.inner.lock();
        (tables.cdp.len(), tables.browser.len(), tables.agent.len())
    }
}
