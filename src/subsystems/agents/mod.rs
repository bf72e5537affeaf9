//! Agents subsystem — the message routing pipeline.
//!
//! ```text
//! message ─► classify ─► general + provider? ─► LlmProvider::complete
//!                    │                               │ Err
//!                    │                               ▼
//!                    ├─► registered tool ─► Tool::invoke ──Err──► apology
//!                    └─► general ───────────────────────────────► canned reply
//! ```
//!
//! Every exchange is recorded in the injected [`ConversationStore`]. Errors
//! from the provider or a tool never leave [`Agent::process_message`]; they
//! are mapped to a reply by [`settle`].

pub mod matcher;
pub mod tools;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::llm::{LlmProvider, ProviderError};
use crate::subsystems::memory::{ConversationEntry, ConversationStore};

pub use matcher::classify;
pub use tools::{Tool, ToolError, ToolId, ToolRegistry};

/// Reply used when a tool handler fails.
pub const APOLOGY: &str = "Извините, произошла ошибка при обработке вашего запроса.";

/// Why a routed call produced no reply of its own.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Routing pipeline shared by every channel.
///
/// Cheap to share behind an `Arc`; all per-user state lives in the store.
pub struct Agent {
    store: Arc<dyn ConversationStore>,
    tools: ToolRegistry,
    llm: Option<LlmProvider>,
}

impl Agent {
    /// Agent with the built-in tools. `llm` of `None` keeps `general`
    /// messages on the canned replies.
    pub fn new(store: Arc<dyn ConversationStore>, llm: Option<LlmProvider>) -> Self {
        Self::with_tools(store, ToolRegistry::builtin(), llm)
    }

    pub fn with_tools(
        store: Arc<dyn ConversationStore>,
        tools: ToolRegistry,
        llm: Option<LlmProvider>,
    ) -> Self {
        match &llm {
            Some(p) => info!(provider = p.name(), "agent created with remote model"),
            None => info!("agent created with built-in tools only"),
        }
        Self { store, tools, llm }
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Produce a reply for `message` from `user_id`.
    ///
    /// Always returns a non-empty reply; failures degrade to a canned answer.
    pub async fn process_message(&self, message: &str, user_id: i64) -> String {
        debug!(user_id, content_len = message.len(), "processing message");

        let entry = match self.store.append(user_id, ConversationEntry::pending(message)) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(user_id, error = %e, "failed to record message");
                None
            }
        };

        let tool = classify(message);
        debug!(user_id, %tool, "message classified");

        let reply = settle(self.route(tool, message, user_id).await, message, user_id);

        if let Some(id) = entry {
            if let Err(e) = self.store.set_response(user_id, id, &reply) {
                warn!(user_id, error = %e, "failed to record response");
            }
        }
        reply
    }

    async fn route(&self, tool: ToolId, message: &str, user_id: i64) -> Result<String, AgentError> {
        if tool == ToolId::General {
            if let Some(llm) = &self.llm {
                return Ok(llm.complete(message, user_id).await?);
            }
        }
        match self.tools.dispatch(tool, message, user_id) {
            Some(result) => Ok(result?),
            None => Ok(tools::general_response(message).to_string()),
        }
    }
}

/// Map a routed result to the reply the user sees.
///
/// Provider failures fall back to the canned general reply for `message`;
/// tool failures become [`APOLOGY`].
fn settle(result: Result<String, AgentError>, message: &str, user_id: i64) -> String {
    match result {
        Ok(reply) => reply,
        Err(AgentError::Provider(e)) => {
            warn!(user_id, error = %e, "remote model failed, using built-in reply");
            tools::general_response(message).to_string()
        }
        Err(AgentError::Tool(e)) => {
            error!(user_id, error = %e, "tool failed");
            APOLOGY.to_string()
        }
    }
}
