//! Per-session side-channel and the registry that owns them.

use crate::error::{Result, RelayError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// A session's out-of-band channel for text events.
pub trait SideChannel: Send + Sync {
    /// False once the channel was closed from either end.
    fn is_open(&self) -> bool;

    /// Deliver one text message. Fails on a closed channel.
    fn send(&self, text: &str) -> Result<()>;

    /// Close the channel. Closing twice is not an error.
    fn close(&self) -> Result<()>;
}

/// Messages drained by the transport writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Binary(Vec<u8>),
    Close,
}

/// Side-channel backed by an unbounded queue that a transport task drains.
#[derive(Debug)]
pub struct SessionChannel {
    tx: mpsc::UnboundedSender<Outbound>,
    open: watch::Sender<bool>,
}

impl SessionChannel {
    /// Creates an open channel and the receiver its writer task consumes.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (open, _) = watch::channel(true);
        (Self { tx, open }, rx)
    }

    /// Queue binary audio for the same connection.
    pub fn send_binary(&self, bytes: Vec<u8>) -> Result<()> {
        self.push(Outbound::Binary(bytes))
    }

    /// Resolves once the channel is closed.
    pub fn closed_signal(&self) -> watch::Receiver<bool> {
        self.open.subscribe()
    }

    fn push(&self, message: Outbound) -> Result<()> {
        if !self.is_open() {
            return Err(RelayError::Notification {
                message: "channel is closed".to_string(),
            });
        }
        self.tx.send(message).map_err(|_| {
            self.open.send_replace(false);
            RelayError::Notification {
                message: "channel receiver dropped".to_string(),
            }
        })
    }
}

impl SideChannel for SessionChannel {
    fn is_open(&self) -> bool {
        *self.open.borrow() && !self.tx.is_closed()
    }

    fn send(&self, text: &str) -> Result<()> {
        self.push(Outbound::Text(text.to_string()))
    }

    fn close(&self) -> Result<()> {
        if !self.open.send_replace(false) {
            return Ok(());
        }
        // A writer that already went away has nothing left to close.
        if self.tx.send(Outbound::Close).is_err() {
            tracing::debug!("side-channel writer already gone on close");
        }
        Ok(())
    }
}

/// Registered side-channels, keyed by session id.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: RwLock<HashMap<String, Arc<dyn SideChannel>>>,
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("sessions", &self.ids())
            .finish()
    }
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `channel` for `session_id`.
    ///
    /// A previous channel for the same id is closed, which ends the
    /// superseded connection.
    pub fn register(&self, session_id: &str, channel: Arc<dyn SideChannel>) {
        let previous = self
            .channels
            .write()
            .insert(session_id.to_string(), channel.clone());
        let replaced = previous.is_some();
        if let Some(previous) = previous
            && !Arc::ptr_eq(&previous, &channel)
            && let Err(e) = previous.close()
        {
            tracing::warn!(session = session_id, error = %e, "failed to close superseded side-channel");
        }
        tracing::debug!(session = session_id, replaced, "side-channel registered");
    }

    /// Remove the registration only if it still points at `channel`.
    ///
    /// A reconnect may have replaced it already; that newer channel stays.
    pub fn unregister(&self, session_id: &str, channel: &Arc<dyn SideChannel>) -> bool {
        let mut channels = self.channels.write();
        match channels.get(session_id) {
            Some(current) if Arc::ptr_eq(current, channel) => {
                channels.remove(session_id);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<dyn SideChannel>> {
        self.channels.read().get(session_id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.channels.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }

    /// Close and drop every registered channel.
    ///
    /// Returns each session id with the outcome of closing its channel.
    pub fn teardown_all(&self) -> Vec<(String, Result<()>)> {
        let drained: Vec<(String, Arc<dyn SideChannel>)> =
            self.channels.write().drain().collect();
        drained
            .into_iter()
            .map(|(id, channel)| {
                let outcome = channel.close();
                (id, outcome)
            })
            .collect()
    }
}
