//! Shared fakes for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use persona_bot::keyboards::Keyboard;
use persona_bot::{
    BotEngine, BotIdentity, BotStore, CallbackEvent, ChatKind, Collaborators, CompletionModel,
    CompletionRequest, Config, InboundMessage, MemberStatus, MessageContent, OutgoingMessage,
    Platform, PlatformError, ServiceError, Translator, WordLookup,
};

pub const BOT_ID: i64 = 999;
pub const BOT_USERNAME: &str = "BotHandle";
pub const GROUP_CHAT: i64 = -100_200;

#[derive(Debug, Clone)]
pub struct Edit {
    pub chat_id: i64,
    pub message_id: i32,
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

/// Records every outbound call; membership answers come from a table
#[derive(Default)]
pub struct FakePlatform {
    pub sent: Mutex<Vec<OutgoingMessage>>,
    pub edits: Mutex<Vec<Edit>>,
    pub answers: Mutex<Vec<(String, Option<String>)>>,
    pub typing: AtomicUsize,
    members: Mutex<HashMap<(String, i64), MemberStatus>>,
}

impl FakePlatform {
    pub fn join(&self, channel: &str, user_id: i64) {
        self.members
            .lock()
            .insert((channel.to_string(), user_id), MemberStatus::Member);
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().clone()
    }

    pub fn last_sent(&self) -> Option<OutgoingMessage> {
        self.sent.lock().last().cloned()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn last_edit(&self) -> Option<Edit> {
        self.edits.lock().last().cloned()
    }

    pub fn last_answer(&self) -> Option<(String, Option<String>)> {
        self.answers.lock().last().cloned()
    }

    pub fn typing_count(&self) -> usize {
        self.typing.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn send_message(&self, message: OutgoingMessage) -> Result<(), PlatformError> {
        self.sent.lock().push(message);
        Ok(())
    }

    async fn edit_message(&self, chat_id: i64, message_id: i32, text: &str, keyboard: Option<Keyboard>) -> bool {
        self.edits.lock().push(Edit {
            chat_id,
            message_id,
            text: text.to_string(),
            keyboard,
        });
        true
    }

    async fn answer_callback(&self, query_id: &str, text: Option<&str>) -> Result<(), PlatformError> {
        self.answers
            .lock()
            .push((query_id.to_string(), text.map(str::to_string)));
        Ok(())
    }

    async fn chat_member_status(&self, channel: &str, user_id: i64) -> Result<MemberStatus, PlatformError> {
        self.members
            .lock()
            .get(&(channel.to_string(), user_id))
            .copied()
            .ok_or_else(|| PlatformError::LookupFailed("user not found".to_string()))
    }

    async fn send_typing(&self, _chat_id: i64) -> Result<(), PlatformError> {
        self.typing.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Counts calls and remembers the last request
#[derive(Default)]
pub struct FakeModel {
    pub calls: AtomicUsize,
    pub last_request: Mutex<Option<CompletionRequest>>,
    pub reply: Mutex<Option<String>>,
}

impl FakeModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Mutex::new(Some(reply.to_string())),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionModel for FakeModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request.clone());
        self.reply.lock().clone().ok_or(ServiceError::Status(503))
    }
}

/// Knows a fixed set of words; `error` makes every lookup fail
#[derive(Default)]
pub struct FakeDictionary {
    pub words: HashMap<String, String>,
    pub error: bool,
}

#[async_trait]
impl WordLookup for FakeDictionary {
    async fn define(&self, word: &str) -> Result<Option<String>, ServiceError> {
        if self.error {
            return Err(ServiceError::Status(500));
        }
        Ok(self.words.get(&word.to_lowercase()).cloned())
    }
}

/// Echoes `src:dst text`
#[derive(Default)]
pub struct FakeTranslator {
    pub error: bool,
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(&self, source: &str, target: &str, text: &str) -> Result<String, ServiceError> {
        if self.error {
            return Err(ServiceError::Malformed("boom".to_string()));
        }
        Ok(format!("{}:{} {}", source, target, text))
    }
}

pub struct Harness {
    pub engine: BotEngine,
    pub platform: Arc<FakePlatform>,
    pub model: Arc<FakeModel>,
    pub dir: TempDir,
}

impl Harness {
    pub fn store(&self) -> &Arc<BotStore> {
        self.engine.store()
    }

    /// Mark a user verified directly in the store
    pub fn verify(&self, user_id: i64) {
        self.store().insert_verified(&user_id.to_string());
    }
}

pub fn test_config(dir: &TempDir) -> Config {
    Config {
        telegram_token: "test-token".to_string(),
        data_dir: dir.path().to_path_buf(),
        required_channels: vec!["alpha".to_string(), "beta".to_string()],
        rng_seed: Some(7),
        ..Config::default()
    }
}

pub fn harness() -> Harness {
    harness_with(FakeModel::default(), FakeDictionary::default(), FakeTranslator::default())
}

pub fn harness_with(model: FakeModel, dictionary: FakeDictionary, translator: FakeTranslator) -> Harness {
    let dir = TempDir::new().expect("temp dir");
    let config = test_config(&dir);

    let platform = Arc::new(FakePlatform::default());
    let model = Arc::new(model);
    let store = Arc::new(BotStore::open_dir(dir.path()));

    let collaborators = Collaborators {
        platform: platform.clone(),
        model: model.clone(),
        dictionary: Arc::new(dictionary),
        translator: Arc::new(translator),
    };
    let identity = BotIdentity {
        user_id: BOT_ID,
        username: BOT_USERNAME.to_string(),
    };

    let engine = BotEngine::new(&config, identity, store, collaborators).expect("engine");
    Harness {
        engine,
        platform,
        model,
        dir,
    }
}

pub fn private_text(user_id: i64, message_id: i32, text: &str) -> InboundMessage {
    InboundMessage {
        message_id,
        chat_id: user_id,
        chat_kind: ChatKind::Private,
        sender_id: user_id,
        sender_first_name: "Sam".to_string(),
        content: MessageContent::Text(text.to_string()),
        replied_to_sender: None,
    }
}

pub fn group_text(user_id: i64, message_id: i32, text: &str) -> InboundMessage {
    InboundMessage {
        chat_id: GROUP_CHAT,
        chat_kind: ChatKind::Group,
        ..private_text(user_id, message_id, text)
    }
}

pub fn callback(user_id: i64, data: &str) -> CallbackEvent {
    CallbackEvent {
        query_id: format!("q-{}-{}", user_id, data),
        user_id,
        user_first_name: "Sam".to_string(),
        message: Some((user_id, 77)),
        data: data.to_string(),
    }
}
