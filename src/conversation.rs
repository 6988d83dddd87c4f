//! Conversation Memory
//!
//! Per-user bounded ring of recent exchanges. Supplies auxiliary context to
//! remote-model calls; never used for exact matching.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Maximum exchanges kept per user (rolling window)
pub const MAX_HISTORY: usize = 5;

/// Character cap applied to both sides of a stored exchange
pub const EXCHANGE_TEXT_CAP: usize = 100;

/// Exchanges rendered into model context
const CONTEXT_EXCHANGES: usize = 3;

/// A single user/bot exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    #[serde(rename = "user")]
    pub user_text: String,
    #[serde(rename = "bot")]
    pub bot_text: String,
    #[serde(deserialize_with = "deserialize_millis")]
    pub timestamp: i64, // Unix millis
}

/// Integer millis, or float seconds as written by older data files
fn deserialize_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Stamp {
        Millis(i64),
        Seconds(f64),
    }

    Ok(match Stamp::deserialize(deserializer)? {
        Stamp::Millis(ms) => ms,
        Stamp::Seconds(secs) => (secs * 1000.0).round() as i64,
    })
}

impl Exchange {
    fn new(user_text: &str, bot_text: &str) -> Self {
        Self {
            user_text: truncate_chars(user_text, EXCHANGE_TEXT_CAP),
            bot_text: truncate_chars(bot_text, EXCHANGE_TEXT_CAP),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// History for every user, keyed by user id
///
/// Serializes as a plain JSON object `{ "<user id>": [exchange, ...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    entries: HashMap<String, Vec<Exchange>>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an exchange, trimming the oldest beyond `MAX_HISTORY`
    pub fn append(&mut self, user_id: &str, user_text: &str, bot_text: &str) {
        let exchanges = self.entries.entry(user_id.to_string()).or_default();
        exchanges.push(Exchange::new(user_text, bot_text));

        if exchanges.len() > MAX_HISTORY {
            let excess = exchanges.len() - MAX_HISTORY;
            exchanges.drain(..excess);
        }
    }

    /// Render the last few exchanges as alternating `User:` / `<persona>:` lines
    pub fn context_for(&self, user_id: &str, persona_name: &str) -> String {
        let Some(exchanges) = self.entries.get(user_id) else {
            return String::new();
        };

        let start = exchanges.len().saturating_sub(CONTEXT_EXCHANGES);
        exchanges[start..]
            .iter()
            .flat_map(|e| {
                [
                    format!("User: {}", e.user_text),
                    format!("{}: {}", persona_name, e.bot_text),
                ]
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Empty a user's history. The key stays with an empty sequence.
    ///
    /// Returns false when the user never had any history.
    pub fn clear(&mut self, user_id: &str) -> bool {
        match self.entries.get_mut(user_id) {
            Some(exchanges) => {
                exchanges.clear();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, user_id: &str) -> &[Exchange] {
        self.entries.get(user_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_user(&self, user_id: &str) -> bool {
        self.entries.contains_key(user_id)
    }

    /// Number of users with a history entry
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Truncate to at most `max` chars (UTF-8 safe)
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
