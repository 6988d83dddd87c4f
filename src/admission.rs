//! Admission Controller (Anti-Spam)
//!
//! Decides whether an inbound event may get a response. Two policies:
//!
//! - **Private chats**: lenient, only a rolling-window burst cap
//!   (threshold + allowance) and the duplicate-message guard apply
//! - **Group chats**: per-user cooldown, rolling-window burst cap and a
//!   per-chat response cooldown shared by everyone in the room
//!
//! `can_respond` is a pure predicate; `mark_sent` records the response.
//! `admit` does both under one lock for handlers running concurrently.
//! Expired dedup ids and conversation markers are filtered on read and
//! evicted by `sweep` (called periodically from the maintenance task).

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::platform::ChatKind;

/// Anti-spam configuration
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Minimum gap between responses to the same user (groups)
    pub user_cooldown: Duration,
    /// Minimum gap between responses in the same chat (groups)
    pub chat_cooldown: Duration,
    /// Rolling window for burst detection
    pub spam_window: Duration,
    /// Responses allowed per window (groups)
    pub spam_threshold: usize,
    /// Extra responses allowed per window in private chats
    pub private_allowance: usize,
    /// How long a processed message id is remembered
    pub processed_expiry: Duration,
    /// Lifetime of the active-conversation marker
    pub conversation_timeout: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            user_cooldown: Duration::from_millis(800),
            chat_cooldown: Duration::from_millis(500),
            spam_window: Duration::from_secs(8),
            spam_threshold: 6,
            private_allowance: 2,
            processed_expiry: Duration::from_secs(60),
            conversation_timeout: Duration::from_secs(10),
        }
    }
}

/// Message ids are only unique within a chat
type MessageKey = (i64, i32);

#[derive(Debug, Default)]
struct UserEntry {
    last_response: Option<Instant>,
    /// Response timestamps inside the rolling window
    recent: VecDeque<Instant>,
}

impl UserEntry {
    fn count_within(&self, window: Duration, now: Instant) -> usize {
        self.recent
            .iter()
            .filter(|&&t| now.saturating_duration_since(t) < window)
            .count()
    }

    fn cleanup(&mut self, window: Duration, now: Instant) {
        while let Some(&oldest) = self.recent.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }
}

#[derive(Debug, Default)]
struct AdmissionState {
    users: HashMap<i64, UserEntry>,
    /// chat_id -> last response
    chats: HashMap<i64, Instant>,
    /// (chat_id, message_id) -> expires at
    processed: HashMap<MessageKey, Instant>,
    /// (user_id, chat_id) -> marker expires at
    active: HashMap<(i64, i64), Instant>,
}

/// Admission statistics
#[derive(Debug, Clone)]
pub struct AdmissionStats {
    pub tracked_users: usize,
    pub tracked_chats: usize,
    pub processed_ids: usize,
    pub active_conversations: usize,
}

/// Per-user / per-chat admission controller
pub struct AdmissionController {
    config: AdmissionConfig,
    state: Mutex<AdmissionState>,
}

impl AdmissionController {
    pub fn new(config: AdmissionConfig) -> Self {
        Self {
            config,
            state: Mutex::new(AdmissionState::default()),
        }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Check whether a response is allowed right now
    pub fn can_respond(&self, user_id: i64, chat_id: i64, kind: ChatKind, message_id: i32) -> bool {
        self.can_respond_at(user_id, chat_id, kind, message_id, Instant::now())
    }

    /// Check whether a response is allowed at `now`. No side effects.
    pub fn can_respond_at(
        &self,
        user_id: i64,
        chat_id: i64,
        kind: ChatKind,
        message_id: i32,
        now: Instant,
    ) -> bool {
        let state = self.state.lock();
        self.allowed(&state, user_id, chat_id, kind, message_id, now)
    }

    /// Record a response to `message_id`
    pub fn mark_sent(&self, user_id: i64, chat_id: i64, message_id: i32) {
        self.mark_sent_at(user_id, chat_id, message_id, Instant::now());
    }

    pub fn mark_sent_at(&self, user_id: i64, chat_id: i64, message_id: i32, now: Instant) {
        let mut state = self.state.lock();
        self.record(&mut state, user_id, chat_id, message_id, now);
    }

    /// Check and mark under one lock, so concurrent handlers for the same
    /// user cannot both get through
    pub fn admit(&self, user_id: i64, chat_id: i64, kind: ChatKind, message_id: i32) -> bool {
        self.admit_at(user_id, chat_id, kind, message_id, Instant::now())
    }

    pub fn admit_at(&self, user_id: i64, chat_id: i64, kind: ChatKind, message_id: i32, now: Instant) -> bool {
        let mut state = self.state.lock();
        if !self.allowed(&state, user_id, chat_id, kind, message_id, now) {
            return false;
        }
        self.record(&mut state, user_id, chat_id, message_id, now);
        true
    }

    fn allowed(
        &self,
        state: &AdmissionState,
        user_id: i64,
        chat_id: i64,
        kind: ChatKind,
        message_id: i32,
        now: Instant,
    ) -> bool {
        if is_processed(state, (chat_id, message_id), now) {
            debug!("Duplicate message {} in chat {}", message_id, chat_id);
            return false;
        }

        let entry = state.users.get(&user_id);
        let recent = entry
            .map(|e| e.count_within(self.config.spam_window, now))
            .unwrap_or(0);

        match kind {
            ChatKind::Private => {
                let cap = self.config.spam_threshold + self.config.private_allowance;
                if recent >= cap {
                    debug!("User {} over private burst cap ({} in window)", user_id, recent);
                    return false;
                }
            }
            ChatKind::Group => {
                if let Some(last) = entry.and_then(|e| e.last_response) {
                    if now.saturating_duration_since(last) < self.config.user_cooldown {
                        debug!("User {} in cooldown", user_id);
                        return false;
                    }
                }

                if recent >= self.config.spam_threshold {
                    debug!("User {} over group burst cap ({} in window)", user_id, recent);
                    return false;
                }

                if let Some(&last) = state.chats.get(&chat_id) {
                    if now.saturating_duration_since(last) < self.config.chat_cooldown {
                        debug!("Chat {} in cooldown", chat_id);
                        return false;
                    }
                }
            }
        }

        true
    }

    fn record(&self, state: &mut AdmissionState, user_id: i64, chat_id: i64, message_id: i32, now: Instant) {
        let entry = state.users.entry(user_id).or_default();
        entry.cleanup(self.config.spam_window, now);
        entry.recent.push_back(now);
        entry.last_response = Some(now);

        state.chats.insert(chat_id, now);
        state
            .processed
            .insert((chat_id, message_id), now + self.config.processed_expiry);
        state
            .active
            .insert((user_id, chat_id), now + self.config.conversation_timeout);
    }

    /// Whether a message id was already answered
    pub fn is_processed(&self, chat_id: i64, message_id: i32) -> bool {
        let state = self.state.lock();
        is_processed(&state, (chat_id, message_id), Instant::now())
    }

    /// Whether the user/chat pair got a response within the conversation timeout
    pub fn is_active(&self, user_id: i64, chat_id: i64) -> bool {
        self.is_active_at(user_id, chat_id, Instant::now())
    }

    pub fn is_active_at(&self, user_id: i64, chat_id: i64, now: Instant) -> bool {
        self.state
            .lock()
            .active
            .get(&(user_id, chat_id))
            .map(|&expires| now < expires)
            .unwrap_or(false)
    }

    /// Evict expired entries. Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let window = self.config.spam_window;
        let idle = window.max(self.config.user_cooldown);
        let chat_cooldown = self.config.chat_cooldown;
        let mut state = self.state.lock();

        let before = state.processed.len() + state.active.len() + state.users.len() + state.chats.len();

        state.processed.retain(|_, expires| now < *expires);
        state.active.retain(|_, expires| now < *expires);
        state.users.retain(|_, entry| {
            entry.cleanup(window, now);
            !entry.recent.is_empty()
                || entry
                    .last_response
                    .map(|t| now.saturating_duration_since(t) < idle)
                    .unwrap_or(false)
        });
        state
            .chats
            .retain(|_, last| now.saturating_duration_since(*last) < chat_cooldown);

        let after = state.processed.len() + state.active.len() + state.users.len() + state.chats.len();
        let removed = before - after;
        if removed > 0 {
            debug!("Admission sweep evicted {} entries", removed);
        }
        removed
    }

    pub fn stats(&self) -> AdmissionStats {
        let state = self.state.lock();
        AdmissionStats {
            tracked_users: state.users.len(),
            tracked_chats: state.chats.len(),
            processed_ids: state.processed.len(),
            active_conversations: state.active.len(),
        }
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new(AdmissionConfig::default())
    }
}

fn is_processed(state: &AdmissionState, key: MessageKey, now: Instant) -> bool {
    state
        .processed
        .get(&key)
        .map(|&expires| now < expires)
        .unwrap_or(false)
}
