//! Inline Keyboards
//!
//! Platform-neutral keyboard layouts and the callback actions they carry.
//! The Telegram adapter converts `Keyboard` into `InlineKeyboardMarkup`.

use serde::{Deserialize, Serialize};

/// Button action types for callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Verify,
    Help,
    About,
    Rps,
    Stats,
    Uptime,
    BackToMenu,
}

impl CallbackAction {
    /// Encode action as callback data string
    pub fn encode(&self) -> &'static str {
        match self {
            Self::Verify => "verify",
            Self::Help => "help",
            Self::About => "about",
            Self::Rps => "rps",
            Self::Stats => "stats",
            Self::Uptime => "uptime",
            Self::BackToMenu => "back_to_menu",
        }
    }

    /// Decode callback data string to action
    pub fn decode(data: &str) -> Option<Self> {
        match data {
            "verify" => Some(Self::Verify),
            "help" => Some(Self::Help),
            "about" => Some(Self::About),
            "rps" => Some(Self::Rps),
            "stats" => Some(Self::Stats),
            "uptime" => Some(Self::Uptime),
            "back_to_menu" => Some(Self::BackToMenu),
            _ => None,
        }
    }
}

/// A single inline button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Button {
    Callback { label: String, data: String },
    Url { label: String, url: String },
}

impl Button {
    pub fn callback(label: impl Into<String>, action: CallbackAction) -> Self {
        Self::Callback {
            label: label.into(),
            data: action.encode().to_string(),
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self::Url {
            label: label.into(),
            url: url.into(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Callback { label, .. } | Self::Url { label, .. } => label,
        }
    }
}

/// Rows of inline buttons
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new(rows: Vec<Vec<Button>>) -> Self {
        Self { rows }
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }
}

/// One join button per channel plus the verify button
pub fn verification_keyboard(channels: &[String]) -> Keyboard {
    let mut rows: Vec<Vec<Button>> = channels
        .iter()
        .map(|ch| {
            vec![Button::url(
                format!("🔗 Join @{}", ch),
                format!("https://t.me/{}", ch),
            )]
        })
        .collect();

    rows.push(vec![Button::callback("✅ I Joined All!", CallbackAction::Verify)]);
    Keyboard::new(rows)
}

/// Main menu, two buttons per row
pub fn main_menu_keyboard() -> Keyboard {
    Keyboard::new(vec![
        vec![
            Button::callback("🔥 Help", CallbackAction::Help),
            Button::callback("😎 About", CallbackAction::About),
        ],
        vec![
            Button::callback("✂️ RPS", CallbackAction::Rps),
            Button::callback("📊 Stats", CallbackAction::Stats),
        ],
        vec![Button::callback("⏱ Uptime", CallbackAction::Uptime)],
    ])
}

pub fn back_keyboard() -> Keyboard {
    Keyboard::new(vec![vec![Button::callback("👈 Back", CallbackAction::BackToMenu)]])
}
