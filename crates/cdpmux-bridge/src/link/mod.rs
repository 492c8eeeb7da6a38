//! Outbound links to the two backends.
//!
//! Each link is a singleton with explicit install/uninstall steps and a
//! generation counter, so a reader task that outlives its session cannot
//! tear down a newer one. The installed sender feeds the session's writer
//! task; dropping it on uninstall is what closes the socket.

pub mod agent;
pub mod browser;

use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::SinkExt;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::warn;

pub use agent::AgentLink;
pub use browser::BrowserLink;

/// Shared state of a singleton link.
#[derive(Debug)]
pub struct LinkState {
    sender: Mutex<Option<mpsc::Sender<String>>>,
    generation: AtomicU64,
    wake: Notify,
}

impl Default for LinkState {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkState {
    /// A link with no live session.
    pub fn new() -> Self {
        Self {
            sender: Mutex::new(None),
            generation: AtomicU64::new(0),
            wake: Notify::new(),
        }
    }

    /// The current session's writer channel, if the link is up.
    pub fn sender(&self) -> Option<mpsc::Sender<String>> {
        self.sender.lock().clone()
    }

    /// Whether a session is installed.
    pub fn is_connected(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Install a new session, replacing any live one.
    ///
    /// Returns the new generation and whether a live session was replaced.
    pub(crate) fn install(&self, tx: mpsc::Sender<String>) -> (u64, bool) {
        let mut slot = self.sender.lock();
        let replaced = slot.replace(tx).is_some();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        (generation, replaced)
    }

    /// Clear the session if `generation` is still current. Returns whether
    /// this call actually tore the session down.
    pub(crate) fn uninstall(&self, generation: u64) -> bool {
        let mut slot = self.sender.lock();
        if self.generation.load(Ordering::SeqCst) == generation {
            *slot = None;
            true
        } else {
            false
        }
    }

    /// Ask the link's connect loop to retry now, regardless of backoff.
    pub fn force_reconnect(&self) {
        self.wake.notify_one();
    }

    /// Park until [`Self::force_reconnect`] is called.
    pub(crate) async fn wait_for_wake(&self) {
        self.wake.notified().await;
    }
}

/// Drain a session's channel into its WebSocket sink.
///
/// One writer per socket; the channel serializes frames from concurrent
/// sources so they cannot interleave.
pub(crate) async fn write_loop<S>(mut rx: mpsc::Receiver<String>, mut sink: S)
where
    S: futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    while let Some(frame) = rx.recv().await {
        if sink.send(WsMessage::Text(frame.into())).await.is_err() {
            warn!("link sink closed, ending write loop");
            break;
        }
    }
}
