//! Conversation Store Integration Tests
//!
//! Tests for conversation persistence and retrieval through `BotStore`.

use persona_bot::conversation::{EXCHANGE_TEXT_CAP, MAX_HISTORY};
use persona_bot::BotStore;
use tempfile::TempDir;

fn create_test_store() -> (BotStore, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = BotStore::open_dir(temp_dir.path());
    (store, temp_dir)
}

#[test]
fn test_store_and_retrieve_exchanges() {
    let (store, _temp) = create_test_store();

    store.append_exchange("12345", "my name is Max", "cute name ig 💅");
    store.append_exchange("12345", "what's my name", "Max, obviously");

    let history = store.history_for("12345");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].user_text, "my name is Max");
    assert_eq!(history[1].bot_text, "Max, obviously");
    assert!(history[0].timestamp <= history[1].timestamp);
}

#[test]
fn test_history_is_bounded_oldest_first_out() {
    let (store, _temp) = create_test_store();

    for n in 0..MAX_HISTORY + 4 {
        store.append_exchange("7", &format!("q{}", n), &format!("a{}", n));
    }

    let history = store.history_for("7");
    assert_eq!(history.len(), MAX_HISTORY);
    assert_eq!(history[0].user_text, "q4");
    assert_eq!(history.last().unwrap().user_text, format!("q{}", MAX_HISTORY + 3));
}

#[test]
fn test_long_text_is_capped() {
    let (store, _temp) = create_test_store();
    let long = "é".repeat(EXCHANGE_TEXT_CAP * 2);

    store.append_exchange("7", &long, &long);

    let history = store.history_for("7");
    assert_eq!(history[0].user_text.chars().count(), EXCHANGE_TEXT_CAP);
    assert_eq!(history[0].bot_text.chars().count(), EXCHANGE_TEXT_CAP);
}

#[test]
fn test_users_are_isolated() {
    let (store, _temp) = create_test_store();

    store.append_exchange("1", "hello from one", "hi one");
    store.append_exchange("2", "hello from two", "hi two");

    let context = store.context_for("1", "Tristin");
    assert!(context.contains("hello from one"));
    assert!(!context.contains("two"));
}

#[test]
fn test_context_uses_last_three_exchanges() {
    let (store, _temp) = create_test_store();

    for n in 1..=4 {
        store.append_exchange("9", &format!("u{}", n), &format!("b{}", n));
    }

    let context = store.context_for("9", "Tristin");
    let lines: Vec<&str> = context.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], "User: u2");
    assert_eq!(lines[1], "Tristin: b2");
    assert_eq!(lines[5], "Tristin: b4");
}

#[test]
fn test_clear_then_context_is_empty() {
    let (store, _temp) = create_test_store();

    assert!(!store.clear_history("5"));

    store.append_exchange("5", "remember this", "ok");
    assert!(store.clear_history("5"));
    assert_eq!(store.context_for("5", "Tristin"), "");
    assert!(store.history_for("5").is_empty());
}

#[test]
fn test_history_survives_reload() {
    let (store, temp) = create_test_store();

    store.append_exchange("100", "first", "one");
    store.append_exchange("100", "second", "two");
    store.append_exchange("200", "other", "three");
    store.touch_user("100");
    assert!(store.is_dirty());
    assert!(store.flush());
    assert!(!store.is_dirty());

    let reloaded = BotStore::open_dir(temp.path());
    assert_eq!(reloaded.history_snapshot(), store.history_snapshot());
    assert_eq!(reloaded.history_for("100"), store.history_for("100"));
    assert_eq!(reloaded.user("100").unwrap().message_count, 1);
}

#[test]
fn test_cleared_history_survives_reload() {
    let (store, temp) = create_test_store();

    store.append_exchange("100", "secret", "shh");
    assert!(store.flush());
    assert!(store.clear_history("100"));

    // Clearing persists immediately
    let reloaded = BotStore::open_dir(temp.path());
    assert!(reloaded.history_for("100").is_empty());
}

#[test]
fn test_legacy_data_files_load_and_survive_flush() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    std::fs::write(
        temp.path().join("users.json"),
        r#"{
  "42": {
    "messages": 17,
    "first_seen": "2024-05-01T09:30:12.345678",
    "last_interaction": "2024-05-03T22:01:00.000001"
  }
}"#,
    )
    .unwrap();
    std::fs::write(
        temp.path().join("conversations.json"),
        r#"{
  "42": [
    {"user": "wyd", "bot": "judging you 💅", "timestamp": 1714815660.5},
    {"user": "rude", "bot": "accurate", "timestamp": 1714815670.25}
  ]
}"#,
    )
    .unwrap();
    std::fs::write(temp.path().join("verified.json"), r#"["42"]"#).unwrap();

    let store = BotStore::open_dir(temp.path());
    let user = store.user("42").expect("legacy user loaded");
    assert_eq!(user.message_count, 17);
    assert_eq!(user.first_seen.to_rfc3339(), "2024-05-01T09:30:12.345678+00:00");

    let history = store.history_for("42");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].bot_text, "judging you 💅");
    assert_eq!(history[0].timestamp, 1_714_815_660_500);

    store.touch_user("1");
    assert!(store.flush());

    let reloaded = BotStore::open_dir(temp.path());
    assert_eq!(reloaded.user("42").unwrap().message_count, 17);
    assert!(reloaded.user("1").is_some());
    assert_eq!(reloaded.history_for("42"), history);
    assert!(reloaded.is_verified("42"));
}
