//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies the env overrides collected in [`EnvOverrides`]. Secrets
//! (`YANDEX_GPT_API_KEY`, `TELEGRAM_BOT_TOKEN`) are only ever read from the
//! environment, never from TOML.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::warn;

use crate::error::AppError;

/// Default cap on stored exchanges per user.
pub const DEFAULT_HISTORY_CAP: usize = 10;

/// Telegram channel configuration.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Whether the Telegram channel is enabled.
    pub enabled: bool,
    /// Bot token from `TELEGRAM_BOT_TOKEN`.
    pub token: Option<String>,
}

/// HTTP channel configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Whether the HTTP channel is enabled.
    pub enabled: bool,
    /// Socket address to bind the HTTP channel to.
    pub bind: String,
}

/// Comms subsystem configuration.
#[derive(Debug, Clone)]
pub struct CommsConfig {
    pub telegram: TelegramConfig,
    pub http: HttpConfig,
    /// Base URL of an external chat API. When set, channels forward messages
    /// to `<relay_url>/chat` instead of the in-process agent.
    pub relay_url: Option<String>,
}

/// Yandex GPT provider configuration (`[llm.yandex]`).
#[derive(Debug, Clone)]
pub struct YandexConfig {
    /// Full completion endpoint URL.
    pub api_base_url: String,
    /// Model name appended to the folder in `gpt://<folder>/<model>`.
    pub model: String,
    /// Cloud folder the model is billed against.
    pub folder_id: Option<String>,
    /// Send one probe request at startup and log whether it succeeded.
    pub probe_on_startup: bool,
}

/// LLM subsystem configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Whether the remote model handles `general` messages at all.
    pub enabled: bool,
    /// Which provider is active (`"yandex"` or `"dummy"`).
    pub provider: String,
    pub yandex: YandexConfig,
    /// API key from `YANDEX_GPT_API_KEY`.
    pub api_key: Option<String>,
}

impl LlmConfig {
    /// Returns `true` if the remote model adapter should be built.
    ///
    /// A Yandex provider needs both a key and a folder; when either is
    /// missing the agent runs on built-in tools only.
    pub fn should_load(&self) -> bool {
        if !self.enabled {
            return false;
        }
        if self.provider != "yandex" {
            return true;
        }
        let has_key = self.api_key.as_deref().is_some_and(|k| !k.is_empty());
        let has_folder = self.yandex.folder_id.as_deref().is_some_and(|f| !f.is_empty());
        if !(has_key && has_folder) {
            warn!(
                "Yandex GPT enabled but YANDEX_GPT_API_KEY or YANDEX_GPT_FOLDER_ID is not set; \
                 using built-in agent"
            );
            return false;
        }
        true
    }
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_name: String,
    pub log_level: String,
    /// Append logs to this file instead of stderr (already expanded, no `~`).
    pub log_file: Option<PathBuf>,
    /// Maximum stored exchanges per user.
    pub history_cap: usize,
    pub comms: CommsConfig,
    pub llm: LlmConfig,
}

impl Config {
    /// Returns `true` if the Telegram channel should be loaded.
    pub fn comms_telegram_should_load(&self) -> bool {
        self.comms.telegram.enabled
    }

    /// Returns `true` if the HTTP channel should be loaded.
    pub fn comms_http_should_load(&self) -> bool {
        self.comms.http.enabled
    }
}

/// Values taken from the process environment.
///
/// Tests build this directly instead of mutating env vars.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub log_level: Option<String>,
    pub port: Option<String>,
    pub use_yandex_gpt: Option<String>,
    pub yandex_api_key: Option<String>,
    pub yandex_folder_id: Option<String>,
    pub external_api_url: Option<String>,
    pub telegram_token: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let var = |name: &str| env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            log_level: var("CHAT_AGENT_LOG_LEVEL"),
            port: var("PORT"),
            use_yandex_gpt: var("USE_YANDEX_GPT"),
            yandex_api_key: var("YANDEX_GPT_API_KEY"),
            yandex_folder_id: var("YANDEX_GPT_FOLDER_ID"),
            external_api_url: var("EXTERNAL_API_URL"),
            telegram_token: var("TELEGRAM_BOT_TOKEN"),
        }
    }
}

/// Raw TOML shape — `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    bot: RawBot,
    #[serde(default)]
    agent: RawAgent,
    #[serde(default)]
    comms: RawComms,
    #[serde(default)]
    llm: RawLlm,
}

#[derive(Deserialize)]
struct RawBot {
    name: String,
    log_level: String,
    #[serde(default)]
    log_file: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawAgent {
    history_cap: Option<usize>,
}

#[derive(Deserialize, Default)]
struct RawComms {
    #[serde(default)]
    telegram: RawTelegram,
    #[serde(default)]
    http: RawHttp,
    #[serde(default)]
    relay_url: Option<String>,
}

#[derive(Deserialize)]
struct RawTelegram {
    /// Defaults to `true`: the bot exists to serve Telegram.
    #[serde(default = "default_true")]
    enabled: bool,
}

#[derive(Deserialize)]
struct RawHttp {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_http_bind")]
    bind: String,
}

#[derive(Deserialize)]
struct RawLlm {
    #[serde(default = "default_false")]
    enabled: bool,
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    yandex: RawYandexConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_llm_provider(),
            yandex: RawYandexConfig::default(),
        }
    }
}

#[derive(Deserialize)]
struct RawYandexConfig {
    #[serde(default = "default_yandex_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_yandex_model")]
    model: String,
    #[serde(default)]
    folder_id: Option<String>,
    #[serde(default = "default_false")]
    probe_on_startup: bool,
}

impl Default for RawYandexConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_yandex_api_base_url(),
            model: default_yandex_model(),
            folder_id: None,
            probe_on_startup: false,
        }
    }
}

impl Default for RawTelegram {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for RawHttp {
    fn default() -> Self {
        Self { enabled: true, bind: default_http_bind() }
    }
}

fn default_llm_provider() -> String { "yandex".to_string() }
fn default_yandex_api_base_url() -> String {
    "https://llm.api.cloud.yandex.net/foundationModels/v1/completion".to_string()
}
fn default_yandex_model() -> String { "yandexgpt-lite".to_string() }
fn default_http_bind() -> String { "0.0.0.0:8080".to_string() }
fn default_true() -> bool { true }
fn default_false() -> bool { false }

/// Load config from `config/default.toml`, then apply env-var overrides.
pub fn load() -> Result<Config, AppError> {
    load_from(Path::new("config/default.toml"), &EnvOverrides::from_env())
}

/// Internal loader — accepts an explicit path and pre-collected overrides.
pub fn load_from(path: &Path, overrides: &EnvOverrides) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let history_cap = parsed.agent.history_cap.unwrap_or(DEFAULT_HISTORY_CAP);
    if history_cap == 0 {
        return Err(AppError::Config("agent.history_cap must be at least 1".into()));
    }

    let bind = match overrides.port.as_deref() {
        Some(port) => {
            port.parse::<u16>()
                .map_err(|e| AppError::Config(format!("invalid PORT '{port}': {e}")))?;
            format!("0.0.0.0:{port}")
        }
        None => parsed.comms.http.bind,
    };

    let llm_enabled = match overrides.use_yandex_gpt.as_deref() {
        Some(flag) => flag == "true",
        None => parsed.llm.enabled,
    };

    Ok(Config {
        bot_name: parsed.bot.name,
        log_level: overrides.log_level.clone().unwrap_or(parsed.bot.log_level),
        log_file: parsed.bot.log_file.as_deref().map(expand_home),
        history_cap,
        comms: CommsConfig {
            telegram: TelegramConfig {
                enabled: parsed.comms.telegram.enabled,
                token: overrides.telegram_token.clone(),
            },
            http: HttpConfig { enabled: parsed.comms.http.enabled, bind },
            relay_url: overrides
                .external_api_url
                .clone()
                .or(parsed.comms.relay_url)
                .filter(|u| !u.is_empty()),
        },
        llm: LlmConfig {
            enabled: llm_enabled,
            provider: parsed.llm.provider,
            yandex: YandexConfig {
                api_base_url: parsed.llm.yandex.api_base_url,
                model: parsed.llm.yandex.model,
                folder_id: overrides
                    .yandex_folder_id
                    .clone()
                    .or(parsed.llm.yandex.folder_id),
                probe_on_startup: parsed.llm.yandex.probe_on_startup,
            },
            api_key: overrides.yandex_api_key.clone(),
        },
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

#[cfg(test)]
impl Config {
    /// Safe `Config` for tests — no channels, no remote model, no secrets.
    pub fn test_default() -> Self {
        Self {
            bot_name: "test".into(),
            log_level: "info".into(),
            log_file: None,
            history_cap: DEFAULT_HISTORY_CAP,
            comms: CommsConfig {
                telegram: TelegramConfig { enabled: false, token: None },
                http: HttpConfig { enabled: false, bind: "127.0.0.1:0".into() },
                relay_url: None,
            },
            llm: LlmConfig {
                enabled: false,
                provider: "dummy".into(),
                yandex: YandexConfig {
                    api_base_url: "http://127.0.0.1:1/foundationModels/v1/completion".into(),
                    model: "yandexgpt-lite".into(),
                    folder_id: None,
                    probe_on_startup: false,
                },
                api_key: None,
            },
        }
    }
}
