//! Built-in tools and the canned general replies.
//!
//! The tool set is closed: [`ToolId`] enumerates every routing outcome and
//! [`Tool::invoke`] dispatches with a `match`. [`ToolRegistry`] records which
//! tools a given agent exposes; it is filled once by [`ToolRegistry::builtin`]
//! (or by explicit [`ToolRegistry::register`] calls) and read-only afterwards.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Local;
use thiserror::Error;

/// Routing outcome of the keyword matcher.
///
/// `General` is a dispatch decision, never a registered tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolId {
    Weather,
    Time,
    Calculate,
    Help,
    General,
}

impl ToolId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolId::Weather => "weather",
            ToolId::Time => "time",
            ToolId::Calculate => "calculate",
            ToolId::Help => "help",
            ToolId::General => "general",
        }
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure inside a tool handler. The built-in handlers never produce one.
#[derive(Debug, Error)]
#[error("tool {tool} failed: {reason}")]
pub struct ToolError {
    pub tool: ToolId,
    pub reason: String,
}

// ── Replies ───────────────────────────────────────────────────────────────────

pub const WEATHER_REPLY: &str = "🌤️ К сожалению, я пока не подключен к сервису погоды. \
Но могу сказать, что сегодня отличный день для прогулки!";

pub const HELP_REPLY: &str = "🤖 *Доступные команды:*

/start - Начать работу с ботом
/help - Показать это сообщение
/weather - Информация о погоде
/time - Текущее время
/calculate - Математические вычисления

*Примеры вопросов:*
• \"Какая погода?\"
• \"Сколько времени?\"
• \"Вычисли 2+2\"
• \"Помощь\"

Я готов помочь вам! 😊";

/// Canned replies for unclassified messages, picked by message length.
pub const GENERAL_REPLIES: [&str; 4] = [
    "Интересный вопрос! Можете уточнить, что именно вас интересует?",
    "Я понимаю ваш вопрос. Могу помочь с информацией о погоде, времени, вычислениями или другими задачами.",
    "Хорошо! Для более точного ответа используйте команды: /help - список команд, /weather - погода, /time - время.",
    "Я готов помочь! Попробуйте спросить о погоде, времени или попросите выполнить вычисления.",
];

/// Canned reply for a message nothing else handled.
///
/// Selection is `len(message) mod 4` over UTF-8 bytes, so equal-length
/// messages always get the same reply.
pub fn general_response(message: &str) -> &'static str {
    GENERAL_REPLIES[message.len() % GENERAL_REPLIES.len()]
}

fn weather(_message: &str) -> String {
    WEATHER_REPLY.to_string()
}

fn time(_message: &str) -> String {
    let now = Local::now();
    format!(
        "🕐 Текущее время: {}\n📅 Дата: {}",
        now.format("%H:%M:%S"),
        now.format("%d.%m.%Y")
    )
}

// Format hints only; expressions are not evaluated.
fn calculate(message: &str) -> String {
    let reply = if message.contains('+') {
        "➕ Для сложения используйте формат: '2 + 3'. Я пока учусь математике! 😊"
    } else if message.contains('-') {
        "➖ Для вычитания используйте формат: '5 - 2'. Я пока учусь математике! 😊"
    } else if message.contains('*') || message.contains('×') {
        "✖️ Для умножения используйте формат: '3 * 4'. Я пока учусь математике! 😊"
    } else if message.contains('/') || message.contains('÷') {
        "➗ Для деления используйте формат: '8 / 2'. Я пока учусь математике! 😊"
    } else {
        "🧮 Для вычислений используйте команду /calculate или напишите 'вычисли 2+2'"
    };
    reply.to_string()
}

fn help(_message: &str) -> String {
    HELP_REPLY.to_string()
}

// ── Tool ──────────────────────────────────────────────────────────────────────

/// A registered tool: metadata plus the handler selected by `id`.
#[derive(Debug, Clone)]
pub struct Tool {
    pub id: ToolId,
    pub name: &'static str,
    pub description: &'static str,
}

impl Tool {
    pub fn new(id: ToolId, description: &'static str) -> Self {
        Self { id, name: id.as_str(), description }
    }

    /// Run the handler for this tool.
    pub fn invoke(&self, message: &str, _user_id: i64) -> Result<String, ToolError> {
        match self.id {
            ToolId::Weather => Ok(weather(message)),
            ToolId::Time => Ok(time(message)),
            ToolId::Calculate => Ok(calculate(message)),
            ToolId::Help => Ok(help(message)),
            ToolId::General => Err(ToolError {
                tool: ToolId::General,
                reason: "general is a routing outcome, not a tool".into(),
            }),
        }
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Tools exposed by an agent, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<ToolId, Tool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Weather, time, calculate and help.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Tool::new(ToolId::Weather, "Получить информацию о погоде"));
        registry.register(Tool::new(ToolId::Time, "Получить текущее время"));
        registry.register(Tool::new(ToolId::Calculate, "Выполнить математические вычисления"));
        registry.register(Tool::new(ToolId::Help, "Показать доступные команды"));
        registry
    }

    /// Add `tool`, replacing any earlier registration with the same id.
    /// `General` is ignored.
    pub fn register(&mut self, tool: Tool) {
        if tool.id != ToolId::General {
            self.tools.insert(tool.id, tool);
        }
    }

    pub fn get(&self, id: ToolId) -> Option<&Tool> {
        self.tools.get(&id)
    }

    /// Registered tools in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Tool> {
        self.tools.values()
    }

    /// Invoke the tool registered under `id`; `None` if there is none.
    pub fn dispatch(
        &self,
        id: ToolId,
        message: &str,
        user_id: i64,
    ) -> Option<Result<String, ToolError>> {
        self.get(id).map(|tool| tool.invoke(message, user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registers_four_tools() {
        let registry = ToolRegistry::builtin();
        let names: Vec<&str> = registry.iter().map(|t| t.name).collect();
        assert_eq!(names, ["weather", "time", "calculate", "help"]);
        assert!(registry.get(ToolId::General).is_none());
    }

    #[test]
    fn general_is_never_registered() {
        let mut registry = ToolRegistry::new();
        registry.register(Tool::new(ToolId::General, "nope"));
        assert!(registry.iter().next().is_none());
        assert!(registry.dispatch(ToolId::General, "hi", 1).is_none());
    }

    #[test]
    fn weather_returns_stub() {
        let registry = ToolRegistry::builtin();
        let reply = registry.dispatch(ToolId::Weather, "какая погода?", 1).unwrap().unwrap();
        assert_eq!(
            reply,
            "🌤️ К сожалению, я пока не подключен к сервису погоды. Но могу сказать, что сегодня отличный день для прогулки!"
        );
    }

    #[test]
    fn time_reply_has_clock_and_date() {
        let reply = ToolRegistry::builtin().dispatch(ToolId::Time, "время", 1).unwrap().unwrap();
        let (time_line, date_line) = reply.split_once('\n').unwrap();
        let clock = time_line.strip_prefix("🕐 Текущее время: ").unwrap();
        assert_eq!(clock.len(), 8);
        assert_eq!(clock.matches(':').count(), 2);
        let date = date_line.strip_prefix("📅 Дата: ").unwrap();
        assert_eq!(date.len(), 10);
        assert_eq!(date.matches('.').count(), 2);
    }

    #[test]
    fn calculate_hints_follow_operator_order() {
        let registry = ToolRegistry::builtin();
        let reply = |m: &str| registry.dispatch(ToolId::Calculate, m, 1).unwrap().unwrap();
        assert!(reply("вычисли 2+2").starts_with("➕"));
        assert!(reply("вычисли 5-2").starts_with("➖"));
        assert!(reply("вычисли 3*4").starts_with("✖️"));
        assert!(reply("вычисли 3×4").starts_with("✖️"));
        assert!(reply("вычисли 8/2").starts_with("➗"));
        assert!(reply("вычисли 8÷2").starts_with("➗"));
        // '+' wins over '-'
        assert!(reply("calculate 1-2+3").starts_with("➕"));
        assert!(reply("вычисли").starts_with("🧮"));
    }

    #[test]
    fn help_lists_commands() {
        let reply = ToolRegistry::builtin().dispatch(ToolId::Help, "/help", 1).unwrap().unwrap();
        for cmd in ["/start", "/help", "/weather", "/time", "/calculate"] {
            assert!(reply.contains(cmd), "help text missing {cmd}");
        }
    }

    #[test]
    fn general_response_indexed_by_byte_length() {
        assert_eq!(general_response(""), GENERAL_REPLIES[0]);
        assert_eq!(general_response("2+2"), GENERAL_REPLIES[3]);
        assert_eq!(general_response("abcd"), GENERAL_REPLIES[0]);
        // two Cyrillic letters = four bytes
        assert_eq!(general_response("да"), GENERAL_REPLIES[0]);
    }

    #[test]
    fn invoking_general_is_an_error() {
        let tool = Tool::new(ToolId::General, "");
        let err = tool.invoke("hi", 1).unwrap_err();
        assert_eq!(err.tool, ToolId::General);
        assert!(err.to_string().contains("general"));
    }
}
