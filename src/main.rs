use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mapboard::backend::{fixtures, BackendClient};
use mapboard::config::{Cli, Config};
use mapboard::routes;
use mapboard::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let config = Config::load(&cli)?;

    let backend = BackendClient::new(&config.backend.base_url, config.backend_timeout())?;
    tracing::info!("Backend: {}", backend.base_url());

    // Posts shown when the backend's list is unavailable
    let fallback_posts = match &config.fixtures.posts_path {
        Some(path) => {
            let posts = fixtures::load_posts(path)?;
            tracing::info!("Loaded {} fallback posts from {}", posts.len(), path.display());
            posts
        }
        None => Vec::new(),
    };

    let state = AppState::new(config.clone(), Arc::new(backend), fallback_posts);
    let app = routes::app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
