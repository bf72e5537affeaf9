//! Shared state for the Comms subsystem — capability boundary for channels.
//!
//! Channels receive an `Arc<CommsState>` and only see [`CommsState::send_message`].
//! Whether a message is answered by the in-process [`Agent`] or forwarded to
//! an external `/chat` API is decided once, at construction.

use std::sync::Arc;

use tracing::debug;

use crate::error::AppError;
use crate::subsystems::agents::Agent;

use super::relay::RelayClient;

/// Where channel messages are answered.
pub enum Backend {
    Local(Arc<Agent>),
    Relay(RelayClient),
}

/// Shared state passed as `Arc<CommsState>` to every channel task.
pub struct CommsState {
    backend: Backend,
}

impl CommsState {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub fn local(agent: Arc<Agent>) -> Self {
        Self::new(Backend::Local(agent))
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Send `content` from `user_id` on `channel_id` and await the reply.
    ///
    /// The local backend never fails; a relay backend fails when the remote
    /// API cannot be reached or answers with something unparseable.
    pub async fn send_message(
        &self,
        channel_id: &str,
        user_id: i64,
        content: &str,
    ) -> Result<String, AppError> {
        debug!(%channel_id, user_id, "routing channel message");
        match &self.backend {
            Backend::Local(agent) => Ok(agent.process_message(content, user_id).await),
            Backend::Relay(relay) => relay.send(content, user_id).await,
        }
    }
}
