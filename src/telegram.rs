//! Telegram integration
//!
//! Adapts teloxide to the engine: updates become `InboundMessage` /
//! `CallbackEvent`, and `TelegramPlatform` implements the outbound `Platform`
//! operations with the Bot API.
//!
//! Uses explicit Dispatcher pattern for reliable message polling.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::{
    dispatching::{Dispatcher, UpdateFilterExt},
    dptree,
    error_handlers::LoggingErrorHandler,
    prelude::*,
    types::{
        ChatAction, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode, Recipient,
        ReplyParameters, Update,
    },
};
use tokio::signal;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::engine::{BotEngine, BotIdentity, Collaborators};
use crate::health;
use crate::keyboards::{Button, Keyboard};
use crate::maintenance;
use crate::platform::{
    CallbackEvent, ChatKind, InboundMessage, MemberStatus, MessageContent, OutgoingMessage, Platform,
    PlatformError,
};
use crate::services::{CompletionModel, DictionaryClient, GoogleTranslateClient, GroqClient};
use crate::store::BotStore;

/// Bot API implementation of `Platform`
#[derive(Clone)]
pub struct TelegramPlatform {
    bot: Bot,
}

impl TelegramPlatform {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

/// Convert a keyboard to inline markup; buttons with unparseable URLs are dropped
fn to_markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    let rows = keyboard.rows.iter().map(|row| {
        row.iter()
            .filter_map(|button| match button {
                Button::Callback { label, data } => {
                    Some(InlineKeyboardButton::callback(label.clone(), data.clone()))
                }
                Button::Url { label, url } => match reqwest::Url::parse(url) {
                    Ok(url) => Some(InlineKeyboardButton::url(label.clone(), url)),
                    Err(e) => {
                        warn!("Skipping button {:?} with bad url {:?}: {}", label, url, e);
                        None
                    }
                },
            })
            .collect::<Vec<_>>()
    });
    InlineKeyboardMarkup::new(rows)
}

#[async_trait]
impl Platform for TelegramPlatform {
    async fn send_message(&self, message: OutgoingMessage) -> Result<(), PlatformError> {
        let mut request = self.bot.send_message(ChatId(message.chat_id), message.text);
        if message.html {
            request = request.parse_mode(ParseMode::Html);
        }
        if let Some(reply_to) = message.reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(reply_to)));
        }
        if let Some(keyboard) = &message.keyboard {
            request = request.reply_markup(to_markup(keyboard));
        }

        request
            .await
            .map(|_| ())
            .map_err(|e| PlatformError::SendFailed(e.to_string()))
    }

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> bool {
        let mut request = self
            .bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id), text)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = &keyboard {
            request = request.reply_markup(to_markup(keyboard));
        }

        match request.await {
            Ok(_) => true,
            Err(e) => {
                // "message is not modified" lands here too
                debug!("Edit failed: {}", e);
                false
            }
        }
    }

    async fn answer_callback(&self, query_id: &str, text: Option<&str>) -> Result<(), PlatformError> {
        let mut request = self.bot.answer_callback_query(query_id.to_string());
        if let Some(text) = text {
            request = request.text(text.to_string());
        }
        request
            .await
            .map(|_| ())
            .map_err(|e| PlatformError::Request(e.to_string()))
    }

    async fn chat_member_status(&self, channel: &str, user_id: i64) -> Result<MemberStatus, PlatformError> {
        let recipient = Recipient::ChannelUsername(format!("@{}", channel.trim_start_matches('@')));
        let member = self
            .bot
            .get_chat_member(recipient, UserId(user_id as u64))
            .await
            .map_err(|e| PlatformError::LookupFailed(e.to_string()))?;

        let kind = &member.kind;
        let status = if kind.is_owner() {
            MemberStatus::Owner
        } else if kind.is_administrator() {
            MemberStatus::Administrator
        } else if kind.is_left() {
            MemberStatus::Left
        } else if kind.is_banned() {
            MemberStatus::Banned
        } else if kind.is_restricted() {
            MemberStatus::Restricted
        } else {
            MemberStatus::Member
        };
        Ok(status)
    }

    async fn send_typing(&self, chat_id: i64) -> Result<(), PlatformError> {
        self.bot
            .send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await
            .map(|_| ())
            .map_err(|e| PlatformError::Request(e.to_string()))
    }
}

/// Convert a Telegram message; messages without a sender are skipped
fn inbound_from(msg: &Message) -> Option<InboundMessage> {
    let from = msg.from.as_ref()?;

    let content = match msg.text() {
        Some(text) => MessageContent::Text(text.to_string()),
        None if is_unsupported_media(msg) => MessageContent::Unsupported,
        None => return None,
    };

    Some(InboundMessage {
        message_id: msg.id.0,
        chat_id: msg.chat.id.0,
        chat_kind: if msg.chat.is_private() {
            ChatKind::Private
        } else {
            ChatKind::Group
        },
        sender_id: from.id.0 as i64,
        sender_first_name: from.first_name.clone(),
        content,
        replied_to_sender: msg
            .reply_to_message()
            .and_then(|r| r.from.as_ref())
            .map(|u| u.id.0 as i64),
    })
}

/// Media kinds that get the "text only" roast
fn is_unsupported_media(msg: &Message) -> bool {
    msg.audio().is_some()
        || msg.document().is_some()
        || msg.photo().is_some()
        || msg.sticker().is_some()
        || msg.video().is_some()
        || msg.voice().is_some()
        || msg.location().is_some()
        || msg.contact().is_some()
}

fn callback_from(query: &CallbackQuery) -> Option<CallbackEvent> {
    Some(CallbackEvent {
        query_id: query.id.clone(),
        user_id: query.from.id.0 as i64,
        user_first_name: query.from.first_name.clone(),
        message: query.message.as_ref().map(|m| (m.chat().id.0, m.id().0)),
        data: query.data.clone()?,
    })
}

/// Run Telegram bot with explicit Dispatcher for reliable polling
pub async fn run_telegram_bot(config: Config) -> Result<()> {
    info!("Starting persona bot...");

    let bot = Bot::new(&config.telegram_token);
    let me = bot.get_me().await.context("Failed to fetch bot info")?;
    let identity = BotIdentity {
        user_id: me.user.id.0 as i64,
        username: me.user.username.clone().unwrap_or_default(),
    };
    info!("Bot: @{} ({})", identity.username, identity.user_id);

    let store = Arc::new(BotStore::open_dir(&config.data_dir));

    let groq = GroqClient::from_config(&config).context("Failed to build Groq client")?;
    if groq.is_available() {
        info!("Remote model enabled: {}", config.groq_model);
    } else {
        warn!("GROQ_API_KEY not set - remote model disabled, using canned replies");
    }

    let collaborators = Collaborators {
        platform: Arc::new(TelegramPlatform::new(bot.clone())),
        model: Arc::new(groq),
        dictionary: Arc::new(DictionaryClient::new().context("Failed to build dictionary client")?),
        translator: Arc::new(GoogleTranslateClient::new().context("Failed to build translate client")?),
    };

    let engine = Arc::new(BotEngine::new(&config, identity, Arc::clone(&store), collaborators)?);
    info!(
        "Required channels: {}",
        config
            .required_channels
            .iter()
            .map(|c| format!("@{}", c))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let maintenance_task = maintenance::spawn(Arc::clone(&engine), config.flush_interval);

    let health_engine = Arc::clone(&engine);
    let port = config.port;
    let health_task = tokio::spawn(async move {
        if let Err(e) = health::serve(health_engine, port).await {
            error!("Health server stopped: {}", e);
        }
    });

    // Build explicit handler tree with callback query support
    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(message_handler))
        .branch(Update::filter_callback_query().endpoint(callback_handler));

    info!("Starting dispatcher with long polling...");

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![Arc::clone(&engine)])
        .default_handler(|upd| async move {
            debug!("Unhandled update: {:?}", upd.kind);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("Error in update handler"))
        .build();

    // SIGINT and SIGTERM both stop the dispatcher so the final flush runs
    let token = dispatcher.shutdown_token();
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        match token.shutdown() {
            Ok(stopping) => stopping.await,
            Err(e) => warn!("Dispatcher not running at shutdown: {:?}", e),
        }
    });

    dispatcher.dispatch().await;

    warn!("Dispatcher stopped");

    signal_task.abort();
    maintenance_task.abort();
    health_task.abort();

    if store.flush() {
        info!("Data saved on shutdown");
    } else {
        error!("Failed to save data on shutdown");
    }
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}

/// Message handler endpoint for the dispatcher
async fn message_handler(msg: Message, engine: Arc<BotEngine>) -> ResponseResult<()> {
    let Some(inbound) = inbound_from(&msg) else {
        return Ok(());
    };

    debug!(
        "Message received: user={}, chat={}, msg={}",
        inbound.sender_id, inbound.chat_id, inbound.message_id
    );

    if let Err(e) = engine.handle_message(inbound).await {
        error!("Error handling message: {:#}", e);
    }
    Ok(())
}

/// Callback query handler for inline keyboard buttons
async fn callback_handler(bot: Bot, query: CallbackQuery, engine: Arc<BotEngine>) -> ResponseResult<()> {
    let Some(event) = callback_from(&query) else {
        bot.answer_callback_query(query.id.clone()).await?;
        return Ok(());
    };

    info!("Callback query: user={}, data={}", event.user_id, event.data);

    if let Err(e) = engine.handle_callback(event).await {
        error!("Error handling callback: {:#}", e);
    }
    Ok(())
}
