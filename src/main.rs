//! Persona Bot - Entry Point
//!
//! Runs the Telegram bot with the health server alongside it.
//! Pass `--json` for JSON log lines.

use persona_bot::Config;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Parse args
    let args: Vec<String> = std::env::args().collect();
    let json_logs = args.iter().any(|a| a == "--json");
    let help_mode = args.iter().any(|a| a == "--help" || a == "-h");

    if help_mode {
        println!("Persona Bot v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: persona-bot [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --json       Log as JSON lines");
        println!("  --help, -h   Show this help");
        println!();
        println!("Environment variables:");
        println!("  TELEGRAM_TOKEN           Telegram bot token (required)");
        println!("  GROQ_API_KEY             Groq API key (remote replies)");
        println!("  GROQ_MODEL               Groq model id (default: llama-3.1-8b-instant)");
        println!("  PORT                     Health server port (default: 10000)");
        println!("  BOT_DATA_DIR             Data directory (default: ., /tmp on Render)");
        println!("  REQUIRED_CHANNELS        Comma-separated channel usernames");
        println!("  PERSONA_NAME             Persona display name");
        println!("  PERSONA_TRIGGERS         Comma-separated name triggers");
        println!("  BOT_CACHE_TTL            Reply cache TTL seconds (default: 300)");
        println!("  BOT_MODEL_BUDGET         Model requests per user per window (default: 10)");
        println!("  BOT_MODEL_BUDGET_WINDOW  Budget window seconds (default: 60)");
        println!("  BOT_FLUSH_INTERVAL       Maintenance interval seconds (default: 30)");
        println!("  BOT_RNG_SEED             Fixed seed for canned reply picks");
        return Ok(());
    }

    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    if json_logs {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("Persona Bot v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    persona_bot::telegram::run_telegram_bot(config).await?;

    Ok(())
}
