//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities — clone them freely.
//! The `complete` method is `async fn` on the enum so callers need no
//! trait-object machinery.

pub mod providers;

use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

/// Failure of a single completion call.
///
/// None of these reach a chat user: the agent maps every variant to a local
/// fallback reply.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider misconfigured: {0}")]
    Config(String),
    /// The request could not complete (connect failure, timeout, body read).
    #[error("transport error: {0}")]
    Transport(String),
    /// The API answered with a non-success status.
    #[error("upstream returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
    /// No alternatives, or the first alternative carried no text.
    #[error("empty response from provider")]
    EmptyResponse,
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
/// Adding a backend = new module + new variant + new `complete` arm.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    YandexGpt(providers::yandex_gpt::YandexGptProvider),
}

impl LlmProvider {
    /// Send `content` on behalf of `user_id` and return the model's reply.
    pub async fn complete(&self, content: &str, user_id: i64) -> Result<String, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.complete(content).await,
            LlmProvider::YandexGpt(p) => p.generate(content, user_id).await,
        }
    }

    /// One cheap round-trip to check the backend answers at all.
    pub async fn is_available(&self) -> bool {
        match self {
            LlmProvider::Dummy(_) => true,
            LlmProvider::YandexGpt(p) => p.is_available().await,
        }
    }

    /// Short name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Dummy(_) => "dummy",
            LlmProvider::YandexGpt(_) => "yandex",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_carries_status_and_body() {
        let e = ProviderError::Upstream { status: 500, body: "boom".into() };
        assert_eq!(e.to_string(), "upstream returned HTTP 500: boom");
    }

    #[tokio::test]
    async fn dummy_dispatch_through_enum() {
        let p = LlmProvider::Dummy(providers::dummy::DummyProvider);
        assert_eq!(p.complete("hi", 7).await.unwrap(), "[echo] hi");
        assert!(p.is_available().await);
        assert_eq!(p.name(), "dummy");
    }
}
