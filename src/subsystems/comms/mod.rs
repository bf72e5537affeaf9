//! Comms subsystem — manages all external I/O channels.
//!
//! # Architecture
//!
//! Each channel (Telegram, HTTP) implements [`runtime::Component`] and is
//! spawned as an independent concurrent task by [`start`] via
//! [`runtime::spawn_components`]. Channels capture their shared
//! [`Arc<CommsState>`] at construction time — no state is passed through the
//! generic `Component::run` signature.
//!
//! # Backends
//!
//! [`ChannelStates`] decides which backend each channel talks to. The HTTP
//! channel always answers with the in-process agent; only Telegram is
//! forwarded to an external `/chat` API when a relay URL is configured.
//!
//! # Starting
//!
//! [`start`] is synchronous — it returns a [`SubsystemHandle`] as soon as
//! the tasks are spawned. The caller decides when (or whether) to await it.

mod state;
pub mod relay;
#[cfg(feature = "channel-telegram")]
pub mod telegram;
#[cfg(feature = "channel-axum")]
pub mod axum_channel;

pub use state::{Backend, CommsState};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::AppError;
use crate::subsystems::agents::Agent;
use crate::subsystems::runtime::{Component, SubsystemHandle, spawn_components};

use relay::RelayClient;

// ── ChannelStates ───────────────────────────────────────────────────────────

/// Per-channel [`CommsState`]s.
pub struct ChannelStates {
    /// Backend of the HTTP channel; always the local agent.
    pub http: Arc<CommsState>,
    /// Backend of the Telegram channel; the relay when one is configured.
    pub telegram: Arc<CommsState>,
}

impl ChannelStates {
    /// Build the states for `config`. `comms.relay_url` only affects Telegram,
    /// so `/chat` can never be forwarded back into this process.
    pub fn from_config(config: &Config, agent: Arc<Agent>) -> Result<Self, AppError> {
        let http = Arc::new(CommsState::local(agent));
        let telegram = match &config.comms.relay_url {
            Some(url) => {
                let relay = RelayClient::new(url)?;
                info!(url = %relay.chat_url(), "relaying telegram messages to external API");
                Arc::new(CommsState::new(Backend::Relay(relay)))
            }
            None => http.clone(),
        };
        Ok(Self { http, telegram })
    }
}

// ── start ───────────────────────────────────────────────────────────────────

/// Spawn all configured comms channels and return a [`SubsystemHandle`].
///
/// Fails before spawning anything when an enabled channel is missing its
/// credentials. If any channel later exits with an error the shared
/// `shutdown` token is cancelled so siblings stop cooperatively.
#[cfg_attr(
    not(any(feature = "channel-axum", feature = "channel-telegram")),
    allow(unused_variables, unused_mut)
)]
pub fn start(
    config: &Config,
    states: &ChannelStates,
    shutdown: CancellationToken,
) -> Result<SubsystemHandle, AppError> {
    let mut components: Vec<Box<dyn Component>> = Vec::new();

    #[cfg(feature = "channel-axum")]
    {
        if config.comms_http_should_load() {
            info!(bind = %config.comms.http.bind, "loading http channel");
            components.push(Box::new(axum_channel::AxumChannel::new(
                "http0",
                config.comms.http.bind.clone(),
                states.http.clone(),
            )));
        }
    }

    #[cfg(feature = "channel-telegram")]
    {
        if config.comms_telegram_should_load() {
            let token = config
                .comms
                .telegram
                .token
                .clone()
                .ok_or_else(|| AppError::Config("TELEGRAM_BOT_TOKEN is not set".into()))?;
            info!("loading telegram channel");
            components.push(Box::new(telegram::TelegramChannel::new(
                "telegram0",
                token,
                states.telegram.clone(),
            )));
        }
    }

    if components.is_empty() {
        info!("no comms channels configured — nothing to serve");
    }

    Ok(spawn_components(components, shutdown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::memory::InMemoryConversationStore;

    fn agent() -> Arc<Agent> {
        Arc::new(Agent::new(Arc::new(InMemoryConversationStore::default()), None))
    }

    fn states(config: &Config) -> ChannelStates {
        ChannelStates::from_config(config, agent()).unwrap()
    }

    fn relay_config() -> Config {
        let mut config = Config::test_default();
        config.comms.relay_url = Some("http://127.0.0.1:1".into());
        config
    }

    #[test]
    fn without_relay_channels_share_local_backend() {
        let states = states(&Config::test_default());
        assert!(matches!(states.http.backend(), Backend::Local(_)));
        assert!(Arc::ptr_eq(&states.http, &states.telegram));
    }

    #[test]
    fn relay_applies_to_telegram_only() {
        let states = states(&relay_config());
        assert!(matches!(states.http.backend(), Backend::Local(_)));
        match states.telegram.backend() {
            Backend::Relay(relay) => assert_eq!(relay.chat_url(), "http://127.0.0.1:1/chat"),
            Backend::Local(_) => panic!("telegram should use the relay"),
        }
    }

    #[cfg(feature = "channel-axum")]
    #[tokio::test]
    async fn http_chat_is_answered_locally_when_relay_is_configured() {
        use axum::body::{Body, to_bytes};
        use axum::http::{Request, StatusCode, header};
        use tower::ServiceExt;

        use crate::subsystems::agents::tools::WEATHER_REPLY;

        let states = states(&relay_config());
        let router = axum_channel::build_router("http0", states.http.clone());
        let request = Request::builder()
            .method("POST")
            .uri("/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"message":"погода","user_id":3}"#))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "success");
        assert_eq!(body["answer"], WEATHER_REPLY);
    }

    #[tokio::test]
    async fn no_channels_exits_cleanly() {
        let config = Config::test_default();
        let handle = start(&config, &states(&config), CancellationToken::new()).unwrap();
        handle.join().await.unwrap();
    }

    #[cfg(feature = "channel-telegram")]
    #[tokio::test]
    async fn telegram_without_token_is_fatal() {
        let mut config = Config::test_default();
        config.comms.telegram.enabled = true;
        let err = start(&config, &states(&config), CancellationToken::new()).err().unwrap();
        assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN"));
    }
}
