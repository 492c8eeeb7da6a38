//! Bounded in-memory log ring.
//!
//! Operator-relevant events are recorded here in addition to the tracing
//! output; the ring backs the read-only `GET /logs` endpoint. Fixed
//! capacity, FIFO eviction, no persistence.

use std::collections::VecDeque;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Severity of a ring entry. Ordered so `level=warn` filtering can use `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose routing detail.
    Debug,
    /// Normal lifecycle events.
    Info,
    /// Dropped messages, link losses, malformed traffic.
    Warn,
    /// Faults that cost a connection.
    Error,
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(()),
        }
    }
}

/// One ring entry.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: LogLevel,
    /// Human-readable message.
    pub message: String,
}

/// The bounded ring itself.
#[derive(Debug)]
pub struct LogRing {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
}

impl LogRing {
    /// Create a ring holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    /// Record an entry, evicting the oldest when full.
    pub fn record(&self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        };
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// A filtered snapshot: entries at `min_level` or above, newest-last,
    /// truncated to the last `limit` entries.
    pub fn snapshot(&self, limit: Option<usize>, min_level: Option<LogLevel>) -> Vec<LogEntry> {
        let entries = self.entries.lock();
        let filtered: Vec<LogEntry> = entries
            .iter()
            .filter(|e| min_level.is_none_or(|min| e.level >= min))
            .cloned()
            .collect();
        match limit {
            Some(n) if n < filtered.len() => filtered[filtered.len() - n..].to_vec(),
            _ => filtered,
        }
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the ring is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests;
