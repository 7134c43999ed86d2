use courier_core::logging::{init_logging, RedactionPatterns};
use courier_core::menu::MenuConfig;
use courier_transport_telegram::config::{BotSettings, TelegramSettings};
use courier_transport_telegram::runner::run_bot;
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::{error, info};

const DEFAULT_LOG_FILTER: &str = "courier_core=info,courier_runtime=info,courier_transport_telegram=info,teloxide=warn,hyper=warn,reqwest=warn";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Redaction must be ready before the first log line
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);
    init_logging(patterns, DEFAULT_LOG_FILTER);

    info!("Starting Channel Courier bot...");

    let settings = init_settings();

    run_bot(settings).await;

    Ok(())
}

fn init_settings() -> Arc<BotSettings> {
    let telegram_settings = match TelegramSettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load telegram configuration: {}", e);
            std::process::exit(1);
        }
    };
    let menu = match MenuConfig::load(&telegram_settings.menu_config_path) {
        Ok(menu) => menu,
        Err(e) => {
            error!(
                "Failed to load menu configuration from {}: {}",
                telegram_settings.menu_config_path, e
            );
            std::process::exit(1);
        }
    };

    info!(
        menus = menu.menus.len(),
        actions = menu.actions.len(),
        "Configuration loaded successfully."
    );
    Arc::new(BotSettings::new(telegram_settings, menu))
}
