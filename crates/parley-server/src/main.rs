//! # parley-server
//!
//! Server for the Parley consent-gated direct-messaging system.
//!
//! This binary provides:
//! - **Session gateway** (WebSocket) that registers live connections and
//!   delivers relayed events
//! - **Presence registry** mapping each user to at most one live connection
//! - **Chat-request state machine** gating who may message whom
//! - **Event relay** pushing request/message/online-set events to the right
//!   connection
//! - **REST API** (axum) for the request lifecycle, user directory, message
//!   history, and attachment retrieval

mod api;
mod auth;
mod config;
mod error;
mod gateway;
mod media;
mod presence;
mod relay;
mod service;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use parley_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::media::LocalMediaHost;
use crate::service::ChatService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,parley_server=debug")),
        )
        .init();

    info!("Starting Parley server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // Persistent store (runs migrations on open)
    let store = Database::open_at(&config.database_path)?;

    // Media host for attachments (creates directory if missing)
    let media = Arc::new(
        LocalMediaHost::new(
            config.media_storage_path.clone(),
            config.max_attachment_size,
        )
        .await?,
    );

    // Presence registry, state machine, and event relay live inside the
    // chat service; the registry starts empty on every boot, so all users
    // appear offline until they reconnect.
    let service = Arc::new(ChatService::new(store, media.clone()));

    let app_state = AppState {
        service,
        media,
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP + gateway server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
