//! Persistence Store
//!
//! Owns the three persisted tables (users, verified ids, conversation history)
//! and their JSON images on disk. The in-memory copies held here are the single
//! writable instance shared by every component.
//!
//! Durability is best-effort: a failed write is logged and reported, the
//! in-memory state stays authoritative and keeps serving requests.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::conversation::{ConversationHistory, Exchange};

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error on {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Per-user activity record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "messages")]
    pub message_count: u64,
    #[serde(deserialize_with = "deserialize_datetime")]
    pub first_seen: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_datetime")]
    pub last_interaction: DateTime<Utc>,
}

/// RFC 3339, or a naive ISO 8601 stamp (older data files) read as UTC
fn deserialize_datetime<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>()
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(serde::de::Error::custom)
}

impl UserRecord {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            message_count: 0,
            first_seen: now,
            last_interaction: now,
        }
    }
}

/// Locations of the three JSON documents
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub users: PathBuf,
    pub verified: PathBuf,
    pub conversations: PathBuf,
}

impl StorePaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            users: dir.join("users.json"),
            verified: dir.join("verified.json"),
            conversations: dir.join("conversations.json"),
        }
    }
}

/// Aggregate counters for stats displays
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub users: usize,
    pub messages: u64,
    pub verified: usize,
    pub conversations: usize,
}

/// Shared store for users, verified ids and conversation history
pub struct BotStore {
    paths: StorePaths,
    users: RwLock<HashMap<String, UserRecord>>,
    verified: RwLock<BTreeSet<String>>,
    history: RwLock<ConversationHistory>,
    dirty: AtomicBool,
}

impl BotStore {
    /// Load all tables. Missing files yield empty tables; malformed files are
    /// logged and replaced by empty tables.
    pub fn load(paths: StorePaths) -> Self {
        let users: HashMap<String, UserRecord> = load_json(&paths.users);
        let verified: BTreeSet<String> = load_json(&paths.verified);
        let history: ConversationHistory = load_json(&paths.conversations);

        info!(
            "Store loaded: {} users, {} verified, {} conversations",
            users.len(),
            verified.len(),
            history.len()
        );

        Self {
            paths,
            users: RwLock::new(users),
            verified: RwLock::new(verified),
            history: RwLock::new(history),
            dirty: AtomicBool::new(false),
        }
    }

    /// Load from the standard file names inside `dir`
    pub fn open_dir(dir: &Path) -> Self {
        Self::load(StorePaths::in_dir(dir))
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    // ============ Users ============

    /// Create the record on first sight, bump counter and last interaction
    pub fn touch_user(&self, user_id: &str) -> UserRecord {
        let now = Utc::now();
        let mut users = self.users.write();
        let record = users
            .entry(user_id.to_string())
            .or_insert_with(|| UserRecord::new(now));
        record.message_count += 1;
        record.last_interaction = now;
        let snapshot = record.clone();
        drop(users);

        self.mark_dirty();
        snapshot
    }

    pub fn user(&self, user_id: &str) -> Option<UserRecord> {
        self.users.read().get(user_id).cloned()
    }

    // ============ Verified set ============

    pub fn is_verified(&self, user_id: &str) -> bool {
        self.verified.read().contains(user_id)
    }

    /// Idempotent insert. Returns true only when newly added; new entries are
    /// flushed to disk right away.
    pub fn insert_verified(&self, user_id: &str) -> bool {
        let added = self.verified.write().insert(user_id.to_string());
        if added {
            if let Err(e) = self.save_verified() {
                warn!("Verified set not persisted: {}", e);
            }
        }
        added
    }

    // ============ Conversation history ============

    pub fn append_exchange(&self, user_id: &str, user_text: &str, bot_text: &str) {
        self.history.write().append(user_id, user_text, bot_text);
        self.mark_dirty();
    }

    pub fn context_for(&self, user_id: &str, persona_name: &str) -> String {
        self.history.read().context_for(user_id, persona_name)
    }

    /// Reset a user's history. Returns false when there was nothing to clear.
    pub fn clear_history(&self, user_id: &str) -> bool {
        let cleared = self.history.write().clear(user_id);
        if cleared {
            if let Err(e) = self.save_history() {
                warn!("History reset not persisted: {}", e);
            }
        }
        cleared
    }

    pub fn history_for(&self, user_id: &str) -> Vec<Exchange> {
        self.history.read().get(user_id).to_vec()
    }

    /// Clone of the whole history map
    pub fn history_snapshot(&self) -> ConversationHistory {
        self.history.read().clone()
    }

    // ============ Stats ============

    pub fn stats(&self) -> StoreStats {
        let users = self.users.read();
        StoreStats {
            users: users.len(),
            messages: users.values().map(|u| u.message_count).sum(),
            verified: self.verified.read().len(),
            conversations: self.history.read().len(),
        }
    }

    // ============ Persistence ============

    pub fn save_users(&self) -> Result<(), StoreError> {
        let users = self.users.read().clone();
        save_json(&self.paths.users, &users)
    }

    pub fn save_verified(&self) -> Result<(), StoreError> {
        let verified = self.verified.read().clone();
        save_json(&self.paths.verified, &verified)
    }

    pub fn save_history(&self) -> Result<(), StoreError> {
        let history = self.history_snapshot();
        save_json(&self.paths.conversations, &history)
    }

    /// Write every table. Returns false if any write failed.
    pub fn flush(&self) -> bool {
        self.dirty.store(false, Ordering::Relaxed);

        let mut ok = true;
        for (name, result) in [
            ("users", self.save_users()),
            ("verified", self.save_verified()),
            ("conversations", self.save_history()),
        ] {
            if let Err(e) = result {
                warn!("Failed to save {}: {}", name, e);
                ok = false;
            }
        }

        if ok {
            debug!("All data saved");
        } else {
            // Retry on the next tick
            self.mark_dirty();
        }
        ok
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Relaxed)
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Relaxed);
    }
}

/// Read a JSON document, falling back to `T::default()` when the file is
/// missing or unreadable
pub fn load_json<T: DeserializeOwned + Default>(path: &Path) -> T {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            warn!("Error loading {}: {}", path.display(), e);
            return T::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!("Malformed {}: {} (starting empty)", path.display(), e);
            quarantine(path);
            T::default()
        }
    }
}

/// Move an unparseable file aside so the next save cannot overwrite it
fn quarantine(path: &Path) {
    let mut target = path.as_os_str().to_owned();
    target.push(".corrupt");
    let target = PathBuf::from(target);

    match std::fs::rename(path, &target) {
        Ok(()) => warn!("Kept unreadable data as {}", target.display()),
        Err(e) => warn!("Could not move aside {}: {}", path.display(), e),
    }
}

/// Write a JSON document via a temp file + rename
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    let body = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, body).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}
