use std::sync::Arc;

use tracing::{error, info};

use gamblr_chat::{Config, WebServer};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = gamblr_chat::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        gamblr_chat::logging::init_console_only(&config.logging.level);
    }

    info!("Gamblr Nation - Degen Chat");

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    if !config.web.enabled {
        info!("Web gateway disabled, nothing to do");
        return;
    }

    if let Err(e) = run(config).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "sqlite")]
async fn run(config: Config) -> gamblr_chat::Result<()> {
    let store = Arc::new(gamblr_chat::SqliteStore::open(&config.database.path).await?);
    info!("Message store ready at {}", config.database.path);
    WebServer::new(&config.web, &config.chat, store)?.run().await
}

#[cfg(not(feature = "sqlite"))]
async fn run(config: Config) -> gamblr_chat::Result<()> {
    let store = Arc::new(gamblr_chat::MemoryStore::new());
    info!("Using in-memory message store");
    WebServer::new(&config.web, &config.chat, store)?.run().await
}
