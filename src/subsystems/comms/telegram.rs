//! Telegram comms channel — long-polls the Bot API, answers commands and
//! passes plain text to [`CommsState::send_message`].

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{ChatAction, ChatId, Me, ParseMode};
use teloxide::utils::command::BotCommands;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::subsystems::runtime::{Component, ComponentFuture};
use super::state::CommsState;

// ── Constants ────────────────────────────────────────────────────────────────

/// Telegram has a 4096 character limit per message.
/// We chunk at 4000 to be safe.
const MAX_MESSAGE_LENGTH: usize = 4000;

const START_REPLY: &str = "🤖 Привет! Я ваш персональный агент-помощник.\n\n\
Я могу помочь с:\n\
• Информацией о погоде\n\
• Текущим временем\n\
• Математическими вычислениями\n\
• И многим другим!\n\n\
Просто напишите мне вопрос или используйте /help для списка команд.";

const CALCULATE_REPLY: &str = "🧮 Для вычислений напишите выражение, например:\n\
• 2 + 3\n\
• 10 - 5\n\
• 4 * 6\n\
• 15 / 3";

const UNKNOWN_COMMAND_REPLY: &str =
    "❓ Неизвестная команда. Используйте /help для списка доступных команд.";

const ERROR_REPLY: &str = "❌ Извините, произошла ошибка при обработке вашего запроса.";

// ── Commands ─────────────────────────────────────────────────────────────────

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Доступные команды:")]
enum Command {
    #[command(description = "начать работу с ботом")]
    Start,
    #[command(description = "показать список команд")]
    Help,
    #[command(description = "информация о погоде")]
    Weather,
    #[command(description = "текущее время")]
    Time,
    #[command(description = "математические вычисления")]
    Calculate,
}

/// What a command turns into.
#[derive(Debug, PartialEq)]
enum CommandAction {
    /// Answer with fixed text.
    Reply(&'static str),
    /// Run this text through the agent as if the user had typed it.
    Route(&'static str),
}

fn command_action(cmd: &Command) -> CommandAction {
    match cmd {
        Command::Start => CommandAction::Reply(START_REPLY),
        Command::Help => CommandAction::Route("/help"),
        Command::Weather => CommandAction::Route("погода"),
        Command::Time => CommandAction::Route("время"),
        Command::Calculate => CommandAction::Reply(CALCULATE_REPLY),
    }
}

/// Parse a leading `/command`, ignoring anything after it (`/help please`
/// is `/help`). `None` for plain text and unknown commands.
fn parse_command(text: &str, bot_username: &str) -> Option<Command> {
    let head = text.split_whitespace().next()?;
    if !head.starts_with('/') {
        return None;
    }
    Command::parse(head, bot_username).ok()
}

/// Split `text` into chunks of at most `max` characters.
fn chunk_text(text: &str, max: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(max).map(|c| c.iter().collect()).collect()
}

fn sender_id(msg: &Message) -> i64 {
    msg.from
        .as_ref()
        .map(|u| u.id.0 as i64)
        .unwrap_or(msg.chat.id.0)
}

// ── TelegramChannel ──────────────────────────────────────────────────────────

/// A Telegram channel instance.
pub struct TelegramChannel {
    channel_id: String,
    token: String,
    state: Arc<CommsState>,
}

impl TelegramChannel {
    pub fn new(channel_id: impl Into<String>, token: String, state: Arc<CommsState>) -> Self {
        Self { channel_id: channel_id.into(), token, state }
    }
}

impl Component for TelegramChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_telegram(self.channel_id, self.token, self.state, shutdown))
    }
}

// ── run_telegram ─────────────────────────────────────────────────────────────

async fn run_telegram(
    channel_id: String,
    token: String,
    state: Arc<CommsState>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let bot = Bot::new(token);

    let me = bot
        .get_me()
        .await
        .map_err(|e| AppError::Comms(format!("telegram get_me failed: {e}")))?;
    info!(%channel_id, username = %me.username(), "telegram channel starting");

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!(%channel_id, "failed to publish command list: {e}");
    }

    let channel: Arc<str> = Arc::from(channel_id.as_str());

    let handler = Update::filter_message()
        .branch(
            dptree::filter_map(|msg: Message, me: Me| {
                msg.text().and_then(|text| parse_command(text, me.username()))
            })
            .endpoint(on_command),
        )
        .branch(dptree::endpoint(on_message));

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state, channel])
        .build();

    tokio::select! {
        biased;

        _ = shutdown.cancelled() => {
            info!(%channel_id, "shutdown signal received — closing telegram channel");
        }
        _ = dispatcher.dispatch() => {
            warn!(%channel_id, "telegram dispatcher exited unexpectedly");
        }
    }

    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn on_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<CommsState>,
    channel_id: Arc<str>,
) -> ResponseResult<()> {
    debug!(%channel_id, ?cmd, "telegram command");
    match command_action(&cmd) {
        CommandAction::Reply(text) => send_reply(&bot, msg.chat.id, text).await,
        CommandAction::Route(text) => {
            let reply = match state.send_message(&channel_id, sender_id(&msg), text).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(%channel_id, "send_message error: {e}");
                    ERROR_REPLY.to_string()
                }
            };
            send_reply(&bot, msg.chat.id, &reply).await;
        }
    }
    Ok(())
}

async fn on_message(
    bot: Bot,
    msg: Message,
    state: Arc<CommsState>,
    channel_id: Arc<str>,
) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    debug!(
        %channel_id,
        user_id = sender_id(&msg),
        from = ?msg.from.as_ref().and_then(|u| u.username.as_ref()),
        "telegram received message"
    );

    if text.starts_with('/') {
        send_reply(&bot, msg.chat.id, UNKNOWN_COMMAND_REPLY).await;
        return Ok(());
    }

    if let Err(e) = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await {
        debug!(%channel_id, "typing action failed: {e}");
    }

    let reply = match state.send_message(&channel_id, sender_id(&msg), text).await {
        Ok(reply) if reply.is_empty() => "(empty response)".to_string(),
        Ok(reply) => reply,
        Err(e) => {
            warn!(%channel_id, "send_message error: {e}");
            ERROR_REPLY.to_string()
        }
    };

    send_reply(&bot, msg.chat.id, &reply).await;
    Ok(())
}

/// Send `text` as Markdown in chunks, resending a chunk as plain text when
/// Telegram rejects its markup. Failures are logged, not returned.
async fn send_reply(bot: &Bot, chat_id: ChatId, text: &str) {
    for chunk in chunk_text(text, MAX_MESSAGE_LENGTH) {
        #[allow(deprecated)]
        let markdown = bot.send_message(chat_id, chunk.clone()).parse_mode(ParseMode::Markdown).await;
        if let Err(e) = markdown {
            debug!("markdown send failed, retrying as plain text: {e}");
            if let Err(e) = bot.send_message(chat_id, chunk).await {
                warn!("failed to send telegram reply: {e}");
            }
        }
    }
}
