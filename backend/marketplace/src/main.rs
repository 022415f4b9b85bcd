//! Marketplace service entry point.
//!
//! Runs the Discord bot (post wizard and moderator review) next to a small
//! Axum REST API that the web front-end reads approved posts, reviews and
//! the team roster from. Both share one SQLite database.

mod api;
mod bot;
mod composition;
mod config;
mod db;
mod drafts;
mod errors;
mod models;
mod notify;
mod review;
mod shutdown;

use std::sync::Arc;

use serenity::http::Http;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bot::sink::DiscordNotifier;
use composition::CompositionWorkflow;
use config::Config;
use drafts::DraftRegistry;
use review::ReviewWorkflow;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;
    db::seed_team_members(&pool).await?;
    if config.seed_sample_reviews {
        db::seed_sample_reviews(&pool).await?;
    }

    let shutdown = shutdown::install_signal_handler();

    // ─── Draft sweeper ────────────────────────────────────
    let drafts = Arc::new(DraftRegistry::new());
    tokio::spawn(drafts::run_sweeper(
        drafts.clone(),
        config.draft_ttl(),
        config.draft_sweep_interval(),
        shutdown.clone(),
    ));

    // ─── Discord bot ──────────────────────────────────────
    match config.discord_token.clone() {
        Some(token) => {
            let notifier = Arc::new(DiscordNotifier::new(Arc::new(Http::new(&token))));
            let review = ReviewWorkflow::new(pool.clone(), notifier, config.channels);
            let composition = CompositionWorkflow::new(drafts, pool.clone(), review.clone());
            let handler = bot::Handler::new(composition, review, config.discord_guild_id);

            let bot_shutdown = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = bot::run(token, handler, bot_shutdown).await {
                    error!("Discord bot stopped: {e}");
                }
            });
        }
        None => info!("DISCORD_TOKEN not set. Skipping Discord bot startup"),
    }

    // ─── REST API ─────────────────────────────────────────
    let app = api::router(Arc::new(api::ApiState { pool }));

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("Marketplace stopped");
    Ok(())
}
