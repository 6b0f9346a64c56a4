//! Shelf Server binary.

use shelf_server::config::Config;
use shelf_server::todos::TodoService;
use shelf_server::websocket::ClientManager;
use shelf_server::{app, snapshot, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "shelf_server=debug,shelf_engine=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Shelf Server on {}:{}", config.host, config.port);

    let backend = snapshot::load_backend(&config).await?;

    // Build application state
    let clients = Arc::new(ClientManager::new());
    let todos = Arc::new(TodoService::start(backend, config.identity(), Arc::clone(&clients)).await);
    let state = AppState {
        todos: Arc::clone(&todos),
        clients,
        config: Arc::new(config.clone()),
    };

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    todos.shutdown().await;
    if let Some(path) = config.snapshot_path.as_deref() {
        snapshot::save_backend(todos.backend(), path).await?;
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
