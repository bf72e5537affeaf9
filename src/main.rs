//! Chat agent — entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Init logger at the configured level
//!   4. Build the remote model adapter (when enabled), the agent and the
//!      per-channel backends
//!   5. Start comms channels and run until Ctrl-C or a channel fails

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use chat_agent::config;
use chat_agent::error::AppError;
use chat_agent::llm::{LlmProvider, providers};
use chat_agent::logger;
use chat_agent::subsystems::agents::Agent;
use chat_agent::subsystems::comms::{self, ChannelStates};
use chat_agent::subsystems::memory::InMemoryConversationStore;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // .env is optional.
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    let config = config::load()?;

    logger::init(&config.log_level, true, config.log_file.as_deref())?;

    if !dotenv_loaded {
        info!(".env not found, using process environment");
    }
    info!(
        bot_name = %config.bot_name,
        log_level = %config.log_level,
        history_cap = config.history_cap,
        llm_enabled = config.llm.enabled,
        "config loaded"
    );

    let llm = build_llm(&config).await?;
    let store = Arc::new(InMemoryConversationStore::new(Some(config.history_cap)));
    let agent = Arc::new(Agent::new(store, llm));
    let states = ChannelStates::from_config(&config, agent)?;

    let shutdown = CancellationToken::new();
    let handle = comms::start(&config, &states, shutdown.clone())?;
    info!(channels = ?handle.components(), "comms started");

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received — shutting down");
            ctrl_c.cancel();
        }
    });

    handle.join().await?;
    info!("shutdown complete");
    Ok(())
}

async fn build_llm(config: &config::Config) -> Result<Option<LlmProvider>, AppError> {
    if !config.llm.should_load() {
        info!("remote model disabled — using built-in agent");
        return Ok(None);
    }

    let provider = providers::build(&config.llm).map_err(|e| AppError::Config(e.to_string()))?;
    info!(provider = provider.name(), "remote model configured");

    if config.llm.yandex.probe_on_startup {
        if provider.is_available().await {
            info!(provider = provider.name(), "remote model reachable");
        } else {
            warn!(provider = provider.name(), "remote model probe failed — replies will fall back until it recovers");
        }
    }

    Ok(Some(provider))
}
