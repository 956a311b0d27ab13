mod bot;
mod commands;
mod config;
mod context;
mod directory;
mod error;
mod replies;
mod server;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::update_listeners::webhooks;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, UpdateMode};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Logging comes up before config validation so startup errors are logged
    let raw_level = std::env::var("LOG_LEVEL").unwrap_or_default();
    let log_level = config::parse_log_level(&raw_level).unwrap_or("info");
    let production = std::env::var("APP_ENV")
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "prod" | "production"))
        .unwrap_or(false);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_ansi(!production))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            return Err(e);
        }
    };

    info!("Configuration loaded successfully");
    info!("  Environment: {}", config.app_env);
    info!("  Bot id: {}", config.bot_token.bot_id());
    info!("  Update mode: {}", config.update_mode.label());
    info!("  Port: {}", config.port);
    info!("  Log level: {}", config.log_level);
    info!("  Request timeout: {:?}", config.request_timeout);

    let bot = bot::build_bot(&config)?;
    let listener = server::bind(config.port).await?;
    let state = Arc::new(AppState::new(config));

    match state.config.update_mode.clone() {
        UpdateMode::Polling => {
            // Health endpoints answer while the bot is still connecting
            let app = server::router(state.clone());
            let server_task = tokio::spawn(server::serve(listener, app, shutdown_signal()));

            start_bot(&bot, &state).await?;
            let updates = bot::polling_listener(&bot, &state.config).await;
            info!("Bot started in polling mode");
            bot::dispatch(bot, state, updates).await;

            server_task.await.context("HTTP server task panicked")??;
        }
        UpdateMode::Webhook(url) => {
            start_bot(&bot, &state).await?;

            let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
            let options = webhooks::Options::new(addr, url.clone());
            let (updates, stop_flag, webhook_routes) = webhooks::axum_to_router(bot.clone(), options)
                .await
                .with_context(|| format!("Failed to register webhook {url}"))?;

            let app = server::router(state.clone()).merge(webhook_routes);
            let server_task = tokio::spawn(server::serve(listener, app, async move {
                tokio::select! {
                    _ = stop_flag => {}
                    _ = shutdown_signal() => {}
                }
            }));

            info!("Bot started in webhook mode at {}", url);
            bot::dispatch(bot, state, updates).await;

            server_task.await.context("HTTP server task panicked")??;
        }
    }

    info!("Bot stopped");
    Ok(())
}

async fn start_bot(bot: &teloxide::Bot, state: &AppState) -> Result<()> {
    let me = bot::probe(bot, state.config.max_retries).await?;
    let username = me.username().to_string();
    info!("Authorized as @{}", username);
    state.set_bot_username(username);
    bot::register_commands(bot).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
