//! # Task Keeper Bot Main Entry Point
//!
//! Initializes logging, loads configuration, opens the moderation engine,
//! starts the stats rollover and health services, and runs the Telegram bot.

use anyhow::Result;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskkeeper_bot::bot::handlers::BotHandler;
use taskkeeper_bot::config::Config;
use taskkeeper_bot::engine::Engine;
use taskkeeper_bot::services::health::HealthService;
use taskkeeper_bot::services::rollover::StatsRolloverService;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskkeeper_bot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    info!("Starting Task Keeper Bot v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration loaded - Creator: {}, Data dir: {}, HTTP Port: {}",
        config.creator_id,
        config.data_dir.display(),
        config.http_port
    );

    // Open the engine; missing or damaged files fall back to empty state
    let engine = Engine::open(config.engine_settings()).into_shared();
    info!("Engine opened from {}", config.data_dir.display());

    // Initialize bot
    info!("Initializing Telegram bot...");
    let bot = Bot::new(&config.telegram_bot_token);
    let handler = BotHandler::new(engine.clone());
    info!("Telegram bot initialized successfully");

    // Initialize and start the daily stats rollover
    let mut rollover_service = match StatsRolloverService::new(engine.clone()).await {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Failed to create stats rollover service: {}", e);
            return Err(anyhow::anyhow!("Failed to create stats rollover service: {}", e));
        }
    };

    if let Err(e) = rollover_service.start().await {
        tracing::error!("Failed to start stats rollover service: {}", e);
    }

    // Initialize health service
    let health_service = HealthService::new(engine.clone());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to port {}: {}", config.http_port, e))?;

    info!("Health check server starting on port {}", config.http_port);

    // Run both the bot and health server concurrently
    let bot_task = tokio::spawn(async move {
        Dispatcher::builder(bot, handler.schema())
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    });

    let health_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, health_service.router).await {
            tracing::error!("Health server error: {}", e);
        }
    });

    // Wait for either task to complete (which would indicate shutdown)
    tokio::select! {
        result1 = bot_task => {
            if let Err(e) = result1 {
                tracing::error!("Bot task error: {}", e);
            }
        }
        result2 = health_task => {
            if let Err(e) = result2 {
                tracing::error!("Health task error: {}", e);
            }
        }
    }

    if let Err(e) = rollover_service.stop().await {
        tracing::warn!("Error stopping stats rollover service: {}", e);
    }

    // Final flush
    if let Err(e) = engine.lock().await.save() {
        tracing::error!("Final save failed: {}", e);
    }

    info!("Application stopped");
    Ok(())
}
