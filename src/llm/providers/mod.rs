//! LLM provider implementations.
//!
//! `build(config)` is the factory — called once at startup.
//! Adding a new backend = new module + new match arm.

pub mod dummy;
pub mod yandex_gpt;

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, ProviderError};

/// Construct a `LlmProvider` from config.
///
/// The API key lives in `config.api_key`, sourced from `YANDEX_GPT_API_KEY`
/// (never TOML).
pub fn build(config: &LlmConfig) -> Result<LlmProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider)),
        "yandex" | "yandex-gpt" => {
            let y = &config.yandex;
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| ProviderError::Config("YANDEX_GPT_API_KEY is not set".into()))?;
            let folder_id = y
                .folder_id
                .clone()
                .ok_or_else(|| ProviderError::Config("YANDEX_GPT_FOLDER_ID is not set".into()))?;
            let p = yandex_gpt::YandexGptProvider::new(
                y.api_base_url.clone(),
                api_key,
                folder_id,
                y.model.clone(),
            )?;
            Ok(LlmProvider::YandexGpt(p))
        }
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn builds_dummy() {
        let cfg = Config::test_default();
        assert!(matches!(build(&cfg.llm), Ok(LlmProvider::Dummy(_))));
    }

    #[test]
    fn unknown_provider_rejected() {
        let mut cfg = Config::test_default();
        cfg.llm.provider = "gigachat".into();
        assert!(matches!(build(&cfg.llm), Err(ProviderError::UnknownProvider(p)) if p == "gigachat"));
    }

    #[test]
    fn yandex_requires_key_and_folder() {
        let mut cfg = Config::test_default();
        cfg.llm.provider = "yandex".into();
        assert!(matches!(build(&cfg.llm), Err(ProviderError::Config(_))));

        cfg.llm.api_key = Some("key".into());
        assert!(matches!(build(&cfg.llm), Err(ProviderError::Config(_))));

        cfg.llm.yandex.folder_id = Some("b1gfolder".into());
        assert!(matches!(build(&cfg.llm), Ok(LlmProvider::YandexGpt(_))));
    }
}
