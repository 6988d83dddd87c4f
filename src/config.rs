//! Configuration management

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::admission::AdmissionConfig;

/// Placeholder shipped in sample `.env` files; treated as "no key"
const GROQ_KEY_PLACEHOLDER: &str = "your_groq_api_key_here";

/// Bot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token
    pub telegram_token: String,

    /// Groq API key (optional - remote model layer disabled without it)
    pub groq_api_key: Option<String>,

    /// Groq model id
    pub groq_model: String,

    /// Health server port
    pub port: u16,

    /// Directory holding users.json / verified.json / conversations.json
    pub data_dir: PathBuf,

    /// Channels a user must join before talking to the bot (no `@`)
    pub required_channels: Vec<String>,

    /// Persona display name
    pub persona_name: String,

    /// Name tokens that count as addressing the bot in groups
    pub name_triggers: Vec<String>,

    /// Response cache TTL in seconds
    pub cache_ttl_secs: u64,

    /// Remote-model requests allowed per user per budget window
    pub model_budget: u32,

    /// Budget window in seconds
    pub model_budget_window_secs: u64,

    /// Maintenance tick (dedup sweep + store flush)
    pub flush_interval: Duration,

    /// Seed for canned-reply selection (deterministic runs)
    pub rng_seed: Option<u64>,

    /// Anti-spam thresholds
    pub admission: AdmissionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram_token: String::new(),
            groq_api_key: None,
            groq_model: "llama-3.1-8b-instant".to_string(),
            port: 10000,
            data_dir: PathBuf::from("."),
            required_channels: vec![
                "heiscoded".to_string(),
                "evilpriest01".to_string(),
                "Dev_Collins_Python_Lab".to_string(),
            ],
            persona_name: "Miss Tristin".to_string(),
            name_triggers: vec![
                "tristin".to_string(),
                "derieri".to_string(),
                "miss tristin".to_string(),
            ],
            cache_ttl_secs: 300,
            model_budget: 10,
            model_budget_window_secs: 60,
            flush_interval: Duration::from_secs(30),
            rng_seed: None,
            admission: AdmissionConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let telegram_token = std::env::var("TELEGRAM_TOKEN")
            .context("TELEGRAM_TOKEN must be set")?;

        let groq_api_key = std::env::var("GROQ_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty() && k != GROQ_KEY_PLACEHOLDER);

        let groq_model = std::env::var("GROQ_MODEL").unwrap_or(defaults.groq_model);

        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        // Render only guarantees /tmp to be writable
        let data_dir = std::env::var("BOT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                if std::env::var_os("RENDER").is_some() {
                    PathBuf::from("/tmp")
                } else {
                    defaults.data_dir.clone()
                }
            });

        let required_channels = std::env::var("REQUIRED_CHANNELS")
            .map(|v| {
                parse_list(&v)
                    .into_iter()
                    .map(|c| c.trim_start_matches('@').to_string())
                    .collect::<Vec<_>>()
            })
            .unwrap_or(defaults.required_channels);

        let persona_name = std::env::var("PERSONA_NAME").unwrap_or(defaults.persona_name);

        let name_triggers = std::env::var("PERSONA_TRIGGERS")
            .map(|v| parse_list(&v))
            .unwrap_or(defaults.name_triggers);

        let cache_ttl_secs = env_parse("BOT_CACHE_TTL").unwrap_or(defaults.cache_ttl_secs);
        let model_budget = env_parse("BOT_MODEL_BUDGET").unwrap_or(defaults.model_budget);
        let model_budget_window_secs =
            env_parse("BOT_MODEL_BUDGET_WINDOW").unwrap_or(defaults.model_budget_window_secs);

        let flush_interval = env_parse("BOT_FLUSH_INTERVAL")
            .map(Duration::from_secs)
            .unwrap_or(defaults.flush_interval);

        let rng_seed = env_parse("BOT_RNG_SEED");

        Ok(Self {
            telegram_token,
            groq_api_key,
            groq_model,
            port,
            data_dir,
            required_channels,
            persona_name,
            name_triggers,
            cache_ttl_secs,
            model_budget,
            model_budget_window_secs,
            flush_interval,
            rng_seed,
            admission: defaults.admission,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Split a comma-separated list, dropping blanks
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
