//! Persona Bot
//!
//! Sassy Telegram chat persona with channel-gated access.
//!
//! # Features
//!
//! - **Verification Gate**: users join the required channels before chatting
//! - **Anti-Spam**: per-user / per-chat cooldowns, burst window, dedup
//! - **Trigger Classifier**: private chat, @mention, reply-to-bot, name triggers
//! - **Response Composer**: cache → canned → budget → remote model → fallback
//! - **Conversation Memory**: last 5 exchanges per user, persisted as JSON
//! - **Side features**: define, translate, rock paper scissors
//!
//! # Architecture
//!
//! ```text
//! Telegram ──► telegram.rs ──► BotEngine ──► Platform (send/edit/typing)
//!                                 │
//!                                 ├── VerificationGate (membership lookups)
//!                                 ├── AdmissionController (anti-spam)
//!                                 ├── TriggerClassifier
//!                                 ├── Composer ──► Groq / cache / canned
//!                                 └── BotStore (users, verified, history)
//! ```

pub mod admission;
pub mod cache;
pub mod composer;
pub mod config;
pub mod conversation;
pub mod engine;
pub mod game;
pub mod health;
pub mod keyboards;
pub mod maintenance;
pub mod persona;
pub mod platform;
pub mod services;
pub mod store;
pub mod telegram;
pub mod trigger;
pub mod verification;

pub use admission::{AdmissionConfig, AdmissionController};
pub use cache::ResponseCache;
pub use composer::{Composed, Composer, ComposerConfig, ReplyPicker, ReplySource};
pub use config::Config;
pub use conversation::{ConversationHistory, Exchange, MAX_HISTORY};
pub use engine::{BotEngine, BotIdentity, Collaborators};
pub use platform::{CallbackEvent, ChatKind, InboundMessage, MemberStatus, MessageContent, OutgoingMessage, Platform, PlatformError};
pub use services::{CompletionModel, CompletionRequest, ServiceError, Translator, WordLookup};
pub use store::{BotStore, StoreError, StorePaths, StoreStats, UserRecord};
pub use trigger::{Trigger, TriggerClassifier, TriggerReason};
pub use verification::VerificationGate;
