//! Best-effort delivery of pipeline events to session side-channels.

pub mod channel;

pub use channel::{ChannelRegistry, Outbound, SessionChannel, SideChannel};

use crate::pipeline::types::NotificationEvent;
use std::sync::Arc;

/// Publishes events on the side-channel registered for a session.
///
/// Delivery never fails the caller: a missing, closed or failing channel
/// is logged and reported as `false`.
#[derive(Debug, Clone)]
pub struct EventNotifier {
    registry: Arc<ChannelRegistry>,
}

impl EventNotifier {
    pub fn new(registry: Arc<ChannelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// Serialize `event` and send it to `session_id`. Returns whether it was sent.
    pub fn publish(&self, session_id: &str, event: &NotificationEvent) -> bool {
        let Some(channel) = self.registry.get(session_id) else {
            tracing::debug!(session = session_id, "no side-channel registered; event dropped");
            return false;
        };
        if !channel.is_open() {
            tracing::debug!(session = session_id, "side-channel closed; event dropped");
            return false;
        }

        let payload = match event.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(session = session_id, error = %e, "failed to serialize event");
                return false;
            }
        };

        match channel.send(&payload) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(session = session_id, error = %e, "failed to deliver event");
                false
            }
        }
    }
}
