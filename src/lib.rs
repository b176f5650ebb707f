//! bgremd - background removal HTTP service
//!
//! Accepts an uploaded image, has an external model cut out the foreground,
//! flattens the cutout onto white and stores the JPEG locally or in an
//! object store, returning its URL.

pub mod api;
pub mod config;
pub mod error;
pub mod flatten;
pub mod pipeline;
pub mod segment;
pub mod storage;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

pub use config::Config;

use api::AppState;
use segment::{RembgClient, Segmenter};
use storage::StorageBackend;

/// The bgremd server instance
pub struct Server {
    config: Config,
    state: AppState,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server instance talking to the configured rembg server
    pub async fn new(config: Config) -> Result<Self> {
        let segmenter = RembgClient::new(
            &config.rembg_url,
            &config.rembg_model,
            config.rembg_timeout(),
        )?;
        info!(
            "Using segmentation model {} at {}",
            config.rembg_model, config.rembg_url
        );
        Self::with_segmenter(config, Arc::new(segmenter)).await
    }

    /// Create a server with an explicit segmenter
    pub async fn with_segmenter(config: Config, segmenter: Arc<dyn Segmenter>) -> Result<Self> {
        let storage = StorageBackend::from_config(&config).await?;
        Ok(Self::with_components(config, segmenter, storage))
    }

    /// Create a server from already-built components
    pub fn with_components(
        config: Config,
        segmenter: Arc<dyn Segmenter>,
        storage: StorageBackend,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            state: AppState {
                segmenter,
                storage: Arc::new(storage),
            },
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Build the router
    pub fn router(&self) -> Router {
        api::router(self.state.clone(), self.config.max_upload_bytes())
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let local_addr = listener.local_addr()?;
        info!(
            "bgremd listening on {} ({} storage)",
            local_addr,
            self.state.storage.kind()
        );

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        info!("bgremd shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr()
    }
}
