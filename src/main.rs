use std::sync::Arc;

use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use morning_feed::config::Config;
use morning_feed::routes::{self, AppState};
use morning_feed::view::{start_auto_refresh, ViewController};

const CONFIG_ENV: &str = "MORNING_FEED_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "feeds.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "morning_feed=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)?;
    info!(
        "Loaded {} feeds and {} subreddits from {}",
        config.feeds.len(),
        config.reddit.subreddits.len(),
        config_path
    );

    let controller = Arc::new(ViewController::from_config(&config)?);

    // First load, then the optional timer
    let initial = controller.clone();
    tokio::spawn(async move {
        initial.refresh().await;
    });

    if config.auto_refresh_minutes > 0 {
        let scheduled = controller.clone();
        let interval = config.auto_refresh_minutes;
        tokio::spawn(async move {
            start_auto_refresh(scheduled, interval).await;
        });
    }

    let state = Arc::new(AppState { controller });

    // Build router
    let app = routes::router(state)
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    info!("Server starting on http://{}", config.listen);

    axum::serve(listener, app).await?;

    Ok(())
}
