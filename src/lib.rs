//! imgd - content-addressed image server daemon
//!
//! Stores uploads under their MD5 hash and serves them back, optionally
//! resized and re-encoded.

pub mod api;
pub mod config;
pub mod images;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

pub use config::Config;

use api::AppState;

/// The imgd server instance
pub struct Server {
    config: Arc<Config>,
    state: AppState,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server instance, creating the storage root if needed
    pub async fn new(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let state = AppState::new(config.clone());

        state.store.ensure_root().await.with_context(|| {
            format!(
                "failed to create image root {}",
                state.store.root().display()
            )
        })?;
        info!("imgd storing images in {}", state.store.root().display());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            state,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Storage root in use
    pub fn image_root(&self) -> &Path {
        self.state.store.root()
    }

    /// Build the router
    fn router(&self) -> Router {
        api::router(self.state.clone())
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("imgd listening on {}", local_addr);

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        info!("imgd shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
