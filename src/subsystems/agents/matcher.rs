//! Keyword classifier: free text → [`ToolId`].
//!
//! Matching is case-insensitive substring containment, checked category by
//! category in [`RULES`] order. The first category with any hit wins.

use super::tools::ToolId;

/// Keyword sets in priority order.
const RULES: &[(ToolId, &[&str])] = &[
    (ToolId::Weather, &["погода", "weather"]),
    (ToolId::Time, &["время", "time", "сколько времени"]),
    (ToolId::Calculate, &["вычисли", "calculate", "сложи", "умножь"]),
    (ToolId::Help, &["помощь", "help", "команды", "/help"]),
];

/// Pick the tool for `text`, or [`ToolId::General`] when no keyword matches.
pub fn classify(text: &str) -> ToolId {
    let lowered = text.to_lowercase();
    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(id, _)| *id)
        .unwrap_or(ToolId::General)
}
