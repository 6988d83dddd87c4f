//! Trigger Classifier
//!
//! Decides whether an inbound text is addressed to the bot and extracts the
//! payload with the address token stripped. First match wins:
//!
//! 1. private chat
//! 2. `@handle` mention (case-insensitive, removed)
//! 3. reply to one of the bot's messages (text kept as-is)
//! 4. persona name trigger (case-insensitive substring, every matched token removed)
//!
//! Commands (`/...`) never reach the classifier's positive branches.

use regex::{Regex, RegexBuilder};

use crate::platform::{ChatKind, InboundMessage};

/// Command prefix excluded from free-text triggering
pub const COMMAND_PREFIX: char = '/';

/// Why the bot considers itself addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    PrivateChat,
    Mention,
    ReplyToBot,
    NameTrigger,
}

/// Classification result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub should_respond: bool,
    pub is_direct_address: bool,
    pub clean_text: String,
    pub reason: Option<TriggerReason>,
}

impl Trigger {
    fn respond(reason: TriggerReason, clean_text: String) -> Self {
        Self {
            should_respond: true,
            is_direct_address: true,
            clean_text,
            reason: Some(reason),
        }
    }

    fn ignore(text: &str) -> Self {
        Self {
            should_respond: false,
            is_direct_address: false,
            clean_text: text.to_string(),
            reason: None,
        }
    }
}

struct NamePattern {
    token: String,
    pattern: Regex,
}

/// Classifier bound to the bot's identity and persona names
pub struct TriggerClassifier {
    bot_user_id: i64,
    handle: String,
    handle_pattern: Regex,
    /// Longest first so "miss tristin" is stripped before "tristin"
    names: Vec<NamePattern>,
}

impl TriggerClassifier {
    pub fn new(bot_user_id: i64, bot_username: &str, name_triggers: &[String]) -> Result<Self, regex::Error> {
        let handle = format!("@{}", bot_username.trim_start_matches('@'));
        let handle_pattern = case_insensitive(&handle)?;

        let mut names = name_triggers
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .map(|token| {
                Ok::<_, regex::Error>(NamePattern {
                    pattern: case_insensitive(&token)?,
                    token,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        names.sort_by(|a, b| {
            b.token
                .chars()
                .count()
                .cmp(&a.token.chars().count())
                .then_with(|| a.token.cmp(&b.token))
        });
        names.dedup_by(|a, b| a.token == b.token);

        Ok(Self {
            bot_user_id,
            handle,
            handle_pattern,
            names,
        })
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Classify an inbound text message
    pub fn classify(&self, message: &InboundMessage, text: &str) -> Trigger {
        if text.starts_with(COMMAND_PREFIX) {
            return Trigger::ignore(text);
        }

        if message.chat_kind == ChatKind::Private {
            return Trigger::respond(TriggerReason::PrivateChat, text.to_string());
        }

        if self.handle_pattern.is_match(text) {
            let clean = self.handle_pattern.replace_all(text, "");
            return Trigger::respond(TriggerReason::Mention, clean.trim().to_string());
        }

        if message.replied_to_sender == Some(self.bot_user_id) {
            return Trigger::respond(TriggerReason::ReplyToBot, text.to_string());
        }

        if self.names.iter().any(|n| n.pattern.is_match(text)) {
            let mut clean = text.to_string();
            for name in &self.names {
                clean = name.pattern.replace_all(&clean, "").into_owned();
            }
            return Trigger::respond(TriggerReason::NameTrigger, clean.trim().to_string());
        }

        Trigger::ignore(text)
    }
}

fn case_insensitive(literal: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&regex::escape(literal))
        .case_insensitive(true)
        .build()
}
