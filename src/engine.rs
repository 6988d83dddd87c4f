//! Bot Engine
//!
//! Routes inbound events through the verification gate, admission control,
//! trigger classification and reply composition, and drives the platform with
//! the result. Platform-agnostic: the Telegram adapter converts updates into
//! `InboundMessage` / `CallbackEvent` and calls in here.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::admission::AdmissionController;
use crate::composer::{Composer, ComposerConfig, ReplyPicker};
use crate::config::Config;
use crate::conversation::truncate_chars;
use crate::game::{self, Move};
use crate::keyboards::{back_keyboard, main_menu_keyboard, verification_keyboard, CallbackAction, Keyboard};
use crate::persona;
use crate::platform::{CallbackEvent, InboundMessage, MessageContent, OutgoingMessage, Platform};
use crate::services::{CompletionModel, Translator, WordLookup};
use crate::store::BotStore;
use crate::trigger::{TriggerClassifier, COMMAND_PREFIX};
use crate::verification::VerificationGate;

/// Characters of translated text kept in memory
const TRANSLATE_MEMORY_CHARS: usize = 30;

/// The bot's own account
#[derive(Debug, Clone)]
pub struct BotIdentity {
    pub user_id: i64,
    pub username: String,
}

/// External collaborators the engine calls out to
#[derive(Clone)]
pub struct Collaborators {
    pub platform: Arc<dyn Platform>,
    pub model: Arc<dyn CompletionModel>,
    pub dictionary: Arc<dyn WordLookup>,
    pub translator: Arc<dyn Translator>,
}

/// Parsed slash command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Clear,
    Stats,
    Uptime,
    About,
}

pub struct BotEngine {
    identity: BotIdentity,
    store: Arc<BotStore>,
    admission: AdmissionController,
    gate: VerificationGate,
    trigger: TriggerClassifier,
    composer: Composer,
    picker: Arc<ReplyPicker>,
    platform: Arc<dyn Platform>,
    dictionary: Arc<dyn WordLookup>,
    translator: Arc<dyn Translator>,
    started: Instant,
}

impl BotEngine {
    pub fn new(
        config: &Config,
        identity: BotIdentity,
        store: Arc<BotStore>,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let trigger = TriggerClassifier::new(identity.user_id, &identity.username, &config.name_triggers)
            .context("Invalid name trigger")?;

        let picker = Arc::new(ReplyPicker::new(config.rng_seed));
        let composer = Composer::new(
            ComposerConfig::from_config(config),
            Arc::clone(&store),
            collaborators.model,
            Arc::clone(&picker),
        );
        let gate = VerificationGate::new(
            Arc::clone(&store),
            Arc::clone(&collaborators.platform),
            config.required_channels.clone(),
        );

        Ok(Self {
            identity,
            store,
            admission: AdmissionController::new(config.admission.clone()),
            gate,
            trigger,
            composer,
            picker,
            platform: collaborators.platform,
            dictionary: collaborators.dictionary,
            translator: collaborators.translator,
            started: Instant::now(),
        })
    }

    pub fn identity(&self) -> &BotIdentity {
        &self.identity
    }

    pub fn store(&self) -> &Arc<BotStore> {
        &self.store
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn gate(&self) -> &VerificationGate {
        &self.gate
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Evict expired ephemeral state; returns evicted entry count
    pub fn sweep(&self) -> usize {
        self.admission.sweep() + self.composer.sweep()
    }

    // ============ Messages ============

    pub async fn handle_message(&self, msg: InboundMessage) -> Result<()> {
        self.store.touch_user(&msg.sender_key());

        let text = match &msg.content {
            MessageContent::Text(t) => t.trim().to_string(),
            MessageContent::Unsupported => return self.handle_unsupported(&msg).await,
        };

        if text.starts_with(COMMAND_PREFIX) {
            return match self.parse_command(&text) {
                Some(cmd) => self.handle_command(&msg, cmd).await,
                None => Ok(()),
            };
        }

        if !self.gate.is_verified(msg.sender_id) {
            debug!("Ignoring unverified user {}", msg.sender_id);
            return Ok(());
        }

        if let Ok(user_move) = text.parse::<Move>() {
            return self.handle_rps(&msg, user_move).await;
        }

        let lower = text.to_lowercase();
        if lower == "define" || lower.starts_with("define ") {
            return self.handle_define(&msg, &text).await;
        }
        if lower.starts_with("translate ") {
            return self.handle_translate(&msg, &text).await;
        }

        self.handle_chat(&msg, &text).await
    }

    /// `/cmd` or `/cmd@ThisBot`; commands aimed at other bots are dropped
    fn parse_command(&self, text: &str) -> Option<Command> {
        let head = text.split_whitespace().next()?;
        let head = head.strip_prefix(COMMAND_PREFIX)?;
        let name = match head.split_once('@') {
            Some((name, target)) if target.eq_ignore_ascii_case(&self.identity.username) => name,
            Some(_) => return None,
            None => head,
        };

        match name.to_lowercase().as_str() {
            "start" | "help" | "menu" => Some(Command::Start),
            "clear" => Some(Command::Clear),
            "stats" => Some(Command::Stats),
            "uptime" => Some(Command::Uptime),
            "about" => Some(Command::About),
            _ => None,
        }
    }

    async fn handle_command(&self, msg: &InboundMessage, cmd: Command) -> Result<()> {
        let verified = self.gate.is_verified(msg.sender_id);

        if cmd == Command::Start {
            let reply = if verified {
                OutgoingMessage::new(msg.chat_id, persona::VERIFIED_GREETING).keyboard(main_menu_keyboard())
            } else {
                OutgoingMessage::new(
                    msg.chat_id,
                    persona::join_prompt(&msg.sender_first_name, self.gate.channels()),
                )
                .keyboard(verification_keyboard(self.gate.channels()))
            };
            self.platform.send_message(reply.html()).await?;
            return Ok(());
        }

        if !verified {
            return Ok(());
        }

        let reply = match cmd {
            Command::Clear => {
                let text = if self.store.clear_history(&msg.sender_key()) {
                    persona::CLEARED
                } else {
                    persona::NOTHING_TO_CLEAR
                };
                OutgoingMessage::new(msg.chat_id, text).reply_to(msg.message_id)
            }
            Command::Stats => OutgoingMessage::new(msg.chat_id, self.stats_text()).html(),
            Command::Uptime => OutgoingMessage::new(msg.chat_id, persona::uptime_text(self.uptime_secs())).html(),
            Command::About => OutgoingMessage::new(msg.chat_id, persona::about_text()).html(),
            Command::Start => return Ok(()),
        };
        self.platform.send_message(reply).await?;
        Ok(())
    }

    fn stats_text(&self) -> String {
        let stats = self.store.stats();
        persona::stats_text(stats.users, stats.messages, stats.verified, stats.conversations)
    }

    /// Admission check; on success the response is marked sent
    fn admit(&self, msg: &InboundMessage) -> bool {
        let admitted = self
            .admission
            .admit(msg.sender_id, msg.chat_id, msg.chat_kind, msg.message_id);
        if !admitted {
            debug!(
                "Admission denied: user={} chat={} msg={}",
                msg.sender_id, msg.chat_id, msg.message_id
            );
        }
        admitted
    }

    /// Admission check for corrective replies, which are not marked sent
    fn may_correct(&self, msg: &InboundMessage) -> bool {
        self.admission
            .can_respond(msg.sender_id, msg.chat_id, msg.chat_kind, msg.message_id)
    }

    async fn typing(&self, chat_id: i64) {
        if let Err(e) = self.platform.send_typing(chat_id).await {
            debug!("Typing indicator failed: {}", e);
        }
    }

    async fn reply(&self, msg: &InboundMessage, text: impl Into<String>, html: bool) -> Result<()> {
        let mut out = OutgoingMessage::new(msg.chat_id, text).reply_to(msg.message_id);
        if html {
            out = out.html();
        }
        self.platform.send_message(out).await?;
        Ok(())
    }

    async fn handle_rps(&self, msg: &InboundMessage, user_move: Move) -> Result<()> {
        if !self.admit(msg) {
            return Ok(());
        }
        self.typing(msg.chat_id).await;

        let bot_move = self.picker.pick(&Move::ALL).unwrap_or(Move::Rock);
        let reply = game::render_round(user_move, bot_move);
        self.reply(msg, reply.clone(), true).await?;
        self.store
            .append_exchange(&msg.sender_key(), &format!("played {}", user_move), &reply);
        Ok(())
    }

    async fn handle_define(&self, msg: &InboundMessage, text: &str) -> Result<()> {
        let word = text
            .split_once(char::is_whitespace)
            .map(|(_, rest)| rest.trim())
            .unwrap_or("");
        if word.is_empty() {
            if self.may_correct(msg) {
                return self.reply(msg, persona::DEFINE_WHAT, false).await;
            }
            return Ok(());
        }

        if !self.admit(msg) {
            return Ok(());
        }
        self.typing(msg.chat_id).await;

        let (reply, html) = match self.dictionary.define(word).await {
            Ok(Some(definition)) => (persona::definition_text(word, &definition), true),
            Ok(None) => (persona::unknown_word_text(word), false),
            Err(e) => {
                warn!("Word lookup for {:?} failed: {}", word, e);
                return self.reply(msg, persona::DEFINE_FAILED, false).await;
            }
        };

        self.reply(msg, reply.clone(), html).await?;
        self.store
            .append_exchange(&msg.sender_key(), &format!("define {}", word), &reply);
        Ok(())
    }

    async fn handle_translate(&self, msg: &InboundMessage, text: &str) -> Result<()> {
        let parts: Vec<&str> = text.splitn(4, ' ').collect();
        let [_, source, target, body] = parts.as_slice() else {
            if self.may_correct(msg) {
                return self.reply(msg, persona::TRANSLATE_USAGE, false).await;
            }
            return Ok(());
        };
        if body.trim().is_empty() {
            return Ok(());
        }
        let source = lang_code(source);
        let target = lang_code(target);

        if !self.admit(msg) {
            return Ok(());
        }
        self.typing(msg.chat_id).await;

        match self.translator.translate(&source, &target, body).await {
            Ok(translated) => {
                let reply = persona::translation_text(&translated);
                self.reply(msg, reply.clone(), true).await?;
                let memo = format!("translate {}...", truncate_chars(body, TRANSLATE_MEMORY_CHARS));
                self.store.append_exchange(&msg.sender_key(), &memo, &reply);
                Ok(())
            }
            Err(e) => {
                warn!("Translation {} -> {} failed: {}", source, target, e);
                self.reply(msg, persona::TRANSLATE_FAILED, false).await
            }
        }
    }

    async fn handle_chat(&self, msg: &InboundMessage, text: &str) -> Result<()> {
        let trigger = self.trigger.classify(msg, text);
        if !trigger.should_respond {
            return Ok(());
        }
        if !self.admit(msg) {
            return Ok(());
        }

        debug!(
            "Triggered by {:?}: user={} clean={:?}",
            trigger.reason, msg.sender_id, trigger.clean_text
        );

        if !self.composer.answers_locally(&trigger.clean_text) {
            self.typing(msg.chat_id).await;
        }

        let composed = self
            .composer
            .compose(&trigger.clean_text, &msg.sender_key(), trigger.is_direct_address)
            .await;

        if let Some(composed) = composed {
            self.reply(msg, composed.reply, false).await?;
        }
        Ok(())
    }

    async fn handle_unsupported(&self, msg: &InboundMessage) -> Result<()> {
        if !self.gate.is_verified(msg.sender_id) || !self.admit(msg) {
            return Ok(());
        }
        self.typing(msg.chat_id).await;

        let roast = self
            .picker
            .choose(&persona::unsupported_roasts(&msg.sender_first_name));
        self.reply(msg, roast.clone(), false).await?;
        self.store.append_exchange(&msg.sender_key(), "[non-text]", &roast);
        Ok(())
    }

    // ============ Callbacks ============

    pub async fn handle_callback(&self, event: CallbackEvent) -> Result<()> {
        let Some(action) = CallbackAction::decode(&event.data) else {
            debug!("Unknown callback data: {:?}", event.data);
            self.platform.answer_callback(&event.query_id, None).await?;
            return Ok(());
        };

        if action == CallbackAction::Verify {
            return self.handle_verify(&event).await;
        }

        if !self.gate.is_verified(event.user_id) {
            self.platform
                .answer_callback(&event.query_id, Some("Verify first! 😒"))
                .await?;
            return Ok(());
        }

        let (toast, text, keyboard) = match action {
            CallbackAction::BackToMenu => (Some("Back to menu"), persona::BACK_TO_MENU.to_string(), main_menu_keyboard()),
            CallbackAction::Help => (None, persona::HELP_TEXT.to_string(), back_keyboard()),
            CallbackAction::About => (None, persona::about_text(), back_keyboard()),
            CallbackAction::Rps => (None, persona::RPS_TEXT.to_string(), back_keyboard()),
            CallbackAction::Stats => (None, self.stats_text(), back_keyboard()),
            CallbackAction::Uptime => (None, persona::uptime_text(self.uptime_secs()), back_keyboard()),
            CallbackAction::Verify => return Ok(()),
        };

        self.platform.answer_callback(&event.query_id, toast).await?;
        self.edit(&event, &text, keyboard).await;
        Ok(())
    }

    async fn handle_verify(&self, event: &CallbackEvent) -> Result<()> {
        if self.gate.is_verified(event.user_id) {
            self.platform
                .answer_callback(&event.query_id, Some("Already verified! 😒"))
                .await?;
            self.edit(event, persona::ALREADY_VERIFIED, main_menu_keyboard()).await;
            return Ok(());
        }

        let missing = self.gate.missing_channels(event.user_id).await;
        if !missing.is_empty() {
            info!(
                "Verification failed for {}: missing {}",
                event.user_id,
                missing.join(", ")
            );
            let toast = format!("Missing {} channel(s)!", missing.len());
            self.platform
                .answer_callback(&event.query_id, Some(toast.as_str()))
                .await?;
            self.edit(
                event,
                &persona::missing_channels_text(&missing),
                verification_keyboard(self.gate.channels()),
            )
            .await;
            return Ok(());
        }

        self.gate.record_verified(event.user_id);
        self.platform
            .answer_callback(&event.query_id, Some("✅ Verified!"))
            .await?;
        self.edit(event, persona::VERIFICATION_SUCCESS, main_menu_keyboard()).await;
        Ok(())
    }

    async fn edit(&self, event: &CallbackEvent, text: &str, keyboard: Keyboard) {
        let Some((chat_id, message_id)) = event.message else {
            return;
        };
        if !self
            .platform
            .edit_message(chat_id, message_id, text, Some(keyboard))
            .await
        {
            debug!("Edit of message {} in chat {} skipped", message_id, chat_id);
        }
    }
}

/// Lower-cased, at most two characters
fn lang_code(code: &str) -> String {
    code.chars().take(2).flat_map(char::to_lowercase).collect()
}
