//! Response Composer
//!
//! Produces a reply for an addressed message through an ordered chain of
//! strategies. Each strategy either handles the turn or passes it on:
//!
//! cache -> canned -> model budget -> remote model -> fallback
//!
//! Every produced reply is recorded in the user's conversation memory.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::cache::ResponseCache;
use crate::persona::{self, EMPTY_MENTION_MARKER, EMPTY_MENTION_REPLY};
use crate::services::{CompletionModel, CompletionRequest};
use crate::store::BotStore;

// ============ Random picks ============

/// Uniform random choice over fixed reply lists, seedable for tests
pub struct ReplyPicker {
    rng: Mutex<StdRng>,
}

impl ReplyPicker {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng: Mutex::new(rng) }
    }

    pub fn choose<T: AsRef<str>>(&self, options: &[T]) -> String {
        let mut rng = self.rng.lock();
        options
            .choose(&mut *rng)
            .map(|s| s.as_ref().to_string())
            .unwrap_or_default()
    }

    /// Pick one item by value
    pub fn pick<T: Copy>(&self, options: &[T]) -> Option<T> {
        let mut rng = self.rng.lock();
        options.choose(&mut *rng).copied()
    }
}

// ============ Model budget ============

struct BudgetWindow {
    window_start: Instant,
    count: u32,
}

/// Per-user fixed-window limit on remote model requests
pub struct ModelBudget {
    max_requests: u32,
    window: Duration,
    entries: Mutex<HashMap<String, BudgetWindow>>,
}

impl ModelBudget {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Count a request; returns true if it fits in the user's window
    pub fn check(&self, user_id: &str) -> bool {
        self.check_at(user_id, Instant::now())
    }

    pub fn check_at(&self, user_id: &str, now: Instant) -> bool {
        let mut entries = self.entries.lock();
        let entry = entries.entry(user_id.to_string()).or_insert(BudgetWindow {
            window_start: now,
            count: 0,
        });

        if now.saturating_duration_since(entry.window_start) >= self.window {
            entry.window_start = now;
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }

    /// Drop windows that have already elapsed
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| now.saturating_duration_since(e.window_start) < self.window);
        before - entries.len()
    }
}

// ============ Strategy chain ============

/// Which layer produced a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    EmptyMention,
    Cache,
    Canned,
    SlowDown,
    Model,
    Fallback,
}

/// Result of one strategy
pub enum Outcome {
    Handled(String),
    Pass,
}

/// One turn flowing through the chain
pub struct Turn<'a> {
    /// Shorthand-expanded text
    pub text: &'a str,
    pub user_id: &'a str,
    pub is_direct: bool,
}

#[async_trait]
pub trait ReplyStrategy: Send + Sync {
    fn source(&self) -> ReplySource;

    async fn attempt(&self, turn: &Turn<'_>) -> Outcome;
}

struct CacheLayer {
    cache: ResponseCache,
}

#[async_trait]
impl ReplyStrategy for CacheLayer {
    fn source(&self) -> ReplySource {
        ReplySource::Cache
    }

    async fn attempt(&self, turn: &Turn<'_>) -> Outcome {
        match self.cache.get(turn.text).await {
            Some(reply) => Outcome::Handled(reply),
            None => Outcome::Pass,
        }
    }
}

struct CannedLayer {
    cache: ResponseCache,
    picker: Arc<ReplyPicker>,
}

#[async_trait]
impl ReplyStrategy for CannedLayer {
    fn source(&self) -> ReplySource {
        ReplySource::Canned
    }

    async fn attempt(&self, turn: &Turn<'_>) -> Outcome {
        let Some(replies) = persona::canned_replies(turn.text) else {
            return Outcome::Pass;
        };
        let reply = self.picker.choose(replies);
        self.cache.set(turn.text, &reply).await;
        Outcome::Handled(reply)
    }
}

struct BudgetLayer {
    budget: Arc<ModelBudget>,
    model: Arc<dyn CompletionModel>,
    picker: Arc<ReplyPicker>,
}

#[async_trait]
impl ReplyStrategy for BudgetLayer {
    fn source(&self) -> ReplySource {
        ReplySource::SlowDown
    }

    async fn attempt(&self, turn: &Turn<'_>) -> Outcome {
        // Nothing to ration without a remote model
        if !self.model.is_available() || self.budget.check(turn.user_id) {
            return Outcome::Pass;
        }
        debug!("Model budget exhausted for user {}", turn.user_id);
        Outcome::Handled(self.picker.choose(persona::SLOW_DOWN_REPLIES))
    }
}

struct ModelLayer {
    model: Arc<dyn CompletionModel>,
    cache: ResponseCache,
    store: Arc<BotStore>,
    persona_name: String,
}

#[async_trait]
impl ReplyStrategy for ModelLayer {
    fn source(&self) -> ReplySource {
        ReplySource::Model
    }

    async fn attempt(&self, turn: &Turn<'_>) -> Outcome {
        if !self.model.is_available() {
            return Outcome::Pass;
        }

        let context = self.store.context_for(turn.user_id, &self.persona_name);
        let request = CompletionRequest::new(persona::SYSTEM_PROMPT, turn.text).with_context(context);

        match self.model.complete(&request).await {
            Ok(reply) if reply.trim().is_empty() => {
                warn!("Model returned an empty reply, falling back");
                Outcome::Pass
            }
            Ok(reply) => {
                let reply = reply.trim().to_string();
                self.cache.set(turn.text, &reply).await;
                Outcome::Handled(reply)
            }
            Err(e) => {
                warn!("Model call failed, falling back: {}", e);
                Outcome::Pass
            }
        }
    }
}

struct FallbackLayer {
    picker: Arc<ReplyPicker>,
}

#[async_trait]
impl ReplyStrategy for FallbackLayer {
    fn source(&self) -> ReplySource {
        ReplySource::Fallback
    }

    async fn attempt(&self, turn: &Turn<'_>) -> Outcome {
        let list = if turn.is_direct {
            persona::DIRECT_FALLBACKS
        } else {
            persona::AMBIENT_FALLBACKS
        };
        Outcome::Handled(self.picker.choose(list))
    }
}

// ============ Composer ============

/// Composer settings
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    pub persona_name: String,
    pub cache_ttl: Duration,
    pub model_budget: u32,
    pub model_budget_window: Duration,
}

impl ComposerConfig {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            persona_name: config.persona_name.clone(),
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
            model_budget: config.model_budget,
            model_budget_window: Duration::from_secs(config.model_budget_window_secs),
        }
    }
}

/// A composed reply and the layer that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composed {
    pub reply: String,
    pub source: ReplySource,
}

pub struct Composer {
    store: Arc<BotStore>,
    cache: ResponseCache,
    budget: Arc<ModelBudget>,
    strategies: Vec<Box<dyn ReplyStrategy>>,
}

impl Composer {
    pub fn new(
        config: ComposerConfig,
        store: Arc<BotStore>,
        model: Arc<dyn CompletionModel>,
        picker: Arc<ReplyPicker>,
    ) -> Self {
        let cache = ResponseCache::new(config.cache_ttl);
        let budget = Arc::new(ModelBudget::new(config.model_budget, config.model_budget_window));

        let strategies: Vec<Box<dyn ReplyStrategy>> = vec![
            Box::new(CacheLayer { cache: cache.clone() }),
            Box::new(CannedLayer {
                cache: cache.clone(),
                picker: Arc::clone(&picker),
            }),
            Box::new(BudgetLayer {
                budget: Arc::clone(&budget),
                model: Arc::clone(&model),
                picker: Arc::clone(&picker),
            }),
            Box::new(ModelLayer {
                model,
                cache: cache.clone(),
                store: Arc::clone(&store),
                persona_name: config.persona_name,
            }),
            Box::new(FallbackLayer { picker }),
        ];

        Self {
            store,
            cache,
            budget,
            strategies,
        }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Drop elapsed model-budget windows
    pub fn sweep(&self) -> usize {
        self.budget.sweep_at(Instant::now())
    }

    /// Whether `raw` is answered without any remote call
    pub fn answers_locally(&self, raw: &str) -> bool {
        if raw.trim().is_empty() {
            return true;
        }
        let expanded = persona::expand_acronyms(raw);
        self.cache.contains(&expanded) || persona::canned_replies(&expanded).is_some()
    }

    /// Compose and record a reply
    ///
    /// Returns `None` only for empty input that was not a direct address.
    pub async fn compose(&self, raw: &str, user_id: &str, is_direct: bool) -> Option<Composed> {
        if raw.trim().is_empty() {
            if !is_direct {
                return None;
            }
            self.store
                .append_exchange(user_id, EMPTY_MENTION_MARKER, EMPTY_MENTION_REPLY);
            return Some(Composed {
                reply: EMPTY_MENTION_REPLY.to_string(),
                source: ReplySource::EmptyMention,
            });
        }

        let expanded = persona::expand_acronyms(raw);
        let turn = Turn {
            text: &expanded,
            user_id,
            is_direct,
        };

        for strategy in &self.strategies {
            if let Outcome::Handled(reply) = strategy.attempt(&turn).await {
                let source = strategy.source();
                debug!("Reply for user {} from {:?}", user_id, source);
                self.store.append_exchange(user_id, raw, &reply);
                return Some(Composed { reply, source });
            }
        }

        // Unreachable with the fallback layer in place
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ServiceError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingModel {
        calls: AtomicUsize,
        reply: Option<String>,
        available: bool,
    }

    impl CountingModel {
        fn new(reply: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reply: reply.map(str::to_string),
                available: true,
            })
        }

        fn unavailable() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reply: None,
                available: false,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionModel for CountingModel {
        fn is_available(&self) -> bool {
            self.available
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone().ok_or(ServiceError::Status(500))
        }
    }

    fn composer(model: Arc<CountingModel>, budget: u32) -> (Composer, Arc<BotStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(BotStore::open_dir(dir.path()));
        let config = ComposerConfig {
            persona_name: "Miss Tristin".to_string(),
            cache_ttl: Duration::from_secs(300),
            model_budget: budget,
            model_budget_window: Duration::from_secs(60),
        };
        let composer = Composer::new(config, Arc::clone(&store), model, Arc::new(ReplyPicker::new(Some(7))));
        (composer, store, dir)
    }

    #[tokio::test]
    async fn test_greeting_never_calls_model() {
        let model = CountingModel::new(Some("hey you"));
        let (composer, store, _dir) = composer(Arc::clone(&model), 10);

        let composed = composer.compose("hi", "1", true).await.unwrap();
        assert_eq!(composed.source, ReplySource::Canned);
        assert_eq!(model.calls(), 0);
        assert_eq!(store.history_for("1").len(), 1);
    }

    #[tokio::test]
    async fn test_canned_reply_then_cached() {
        let model = CountingModel::new(None);
        let (composer, _store, _dir) = composer(Arc::clone(&model), 10);

        let first = composer.compose("hello", "1", true).await.unwrap();
        let second = composer.compose("HELLO", "1", true).await.unwrap();
        assert_eq!(second.source, ReplySource::Cache);
        assert_eq!(first.reply, second.reply);
    }

    #[tokio::test]
    async fn test_model_reply_uses_expanded_text_and_records_raw() {
        let model = CountingModel::new(Some("  not much, you?  "));
        let (composer, store, _dir) = composer(Arc::clone(&model), 10);

        let composed = composer.compose("wyd", "1", true).await.unwrap();
        assert_eq!(composed.source, ReplySource::Model);
        assert_eq!(composed.reply, "not much, you?");
        assert_eq!(model.calls(), 1);

        let history = store.history_for("1");
        assert_eq!(history[0].user_text, "wyd");

        // Same expanded text is now served from cache
        let again = composer.compose("what you doing", "1", true).await.unwrap();
        assert_eq!(again.source, ReplySource::Cache);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_model_failure_falls_back() {
        let model = CountingModel::new(None);
        let (composer, _store, _dir) = composer(Arc::clone(&model), 10);

        let direct = composer.compose("tell me a secret", "1", true).await.unwrap();
        assert_eq!(direct.source, ReplySource::Fallback);
        assert!(persona::DIRECT_FALLBACKS.contains(&direct.reply.as_str()));

        let ambient = composer.compose("another secret", "1", false).await.unwrap();
        assert!(persona::AMBIENT_FALLBACKS.contains(&ambient.reply.as_str()));
    }

    #[tokio::test]
    async fn test_budget_exhaustion_skips_model() {
        let model = CountingModel::new(Some("ok"));
        let (composer, store, _dir) = composer(Arc::clone(&model), 2);

        composer.compose("question one", "1", true).await.unwrap();
        composer.compose("question two", "1", true).await.unwrap();
        let third = composer.compose("question three", "1", true).await.unwrap();

        assert_eq!(third.source, ReplySource::SlowDown);
        assert!(persona::SLOW_DOWN_REPLIES.contains(&third.reply.as_str()));
        assert_eq!(model.calls(), 2);
        assert_eq!(store.history_for("1").len(), 3);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let model = CountingModel::new(Some("ok"));
        let (composer, store, _dir) = composer(Arc::clone(&model), 10);

        assert!(composer.compose("   ", "1", false).await.is_none());
        assert!(store.history_for("1").is_empty());

        let composed = composer.compose("", "1", true).await.unwrap();
        assert_eq!(composed.reply, EMPTY_MENTION_REPLY);
        assert_eq!(store.history_for("1")[0].user_text, EMPTY_MENTION_MARKER);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_budget_not_spent_without_model() {
        let model = CountingModel::unavailable();
        let (composer, _store, _dir) = composer(Arc::clone(&model), 1);

        for n in 0..4 {
            let composed = composer.compose(&format!("question {}", n), "1", true).await.unwrap();
            assert_eq!(composed.source, ReplySource::Fallback);
        }
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_answers_locally_sees_cache() {
        let model = CountingModel::new(Some("vibing"));
        let (composer, _store, _dir) = composer(Arc::clone(&model), 10);

        assert!(!composer.answers_locally("wyd"));
        composer.compose("wyd", "1", true).await.unwrap();

        // Both the shorthand and its expansion hit the cached entry
        assert!(composer.answers_locally("wyd"));
        assert!(composer.answers_locally("What you doing"));
        assert!(composer.answers_locally("hi"));
        assert!(composer.answers_locally("  "));
    }

    #[test]
    fn test_budget_window_resets() {
        let budget = ModelBudget::new(1, Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(budget.check_at("u", t0));
        assert!(!budget.check_at("u", t0 + Duration::from_secs(30)));
        assert!(budget.check_at("u", t0 + Duration::from_secs(61)));
        assert_eq!(budget.sweep_at(t0 + Duration::from_secs(200)), 1);
    }

    #[test]
    fn test_seeded_picker_is_deterministic() {
        let a = ReplyPicker::new(Some(42));
        let b = ReplyPicker::new(Some(42));
        let options = ["a", "b", "c", "d", "e"];
        let picks_a: Vec<_> = (0..8).map(|_| a.choose(&options)).collect();
        let picks_b: Vec<_> = (0..8).map(|_| b.choose(&options)).collect();
        assert_eq!(picks_a, picks_b);
    }
}
