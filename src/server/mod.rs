//! HTTP surface: a static description page and the metadata endpoint.
//!
//! Pipeline work is blocking (mapping and parsing), so each request runs it
//! on tokio's blocking pool. A semaphore bounds how many run at once; a
//! request whose client went away still finishes and releases its mapping.

mod config;
mod error;
mod handlers;

pub use config::ServerConfig;
pub use error::{INTERNAL_MESSAGE, error_response};

use anyhow::anyhow;
use axum::Router;
use axum::routing::get;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::error::{Result, ZipMetaError};
use crate::pipeline::MetadataPipeline;
use crate::zip::{MetadataParser, ZipParser};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ServerState {
    pipeline: MetadataPipeline,
    permits: Arc<Semaphore>,
    config: Arc<ServerConfig>,
}

impl ServerState {
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the pipeline for `id` on the blocking pool.
    pub async fn extract(&self, id: String) -> Result<Value> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| anyhow!("worker pool closed: {}", e))?;

        let pipeline = self.pipeline.clone();
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            pipeline.process(&id)
        })
        .await
        .map_err(|e| ZipMetaError::Internal(anyhow!("pipeline task failed: {}", e)))?
    }
}

pub struct Server {
    state: ServerState,
}

impl Server {
    /// Server using the bundled [`ZipParser`].
    pub fn new(config: ServerConfig) -> Self {
        Self::with_parser(config, Arc::new(ZipParser::new()))
    }

    pub fn with_parser(config: ServerConfig, parser: Arc<dyn MetadataParser>) -> Self {
        let pipeline = MetadataPipeline::new(config.staging_dir.clone(), parser);
        let permits = Arc::new(Semaphore::new(config.workers.max(1)));
        Self {
            state: ServerState {
                pipeline,
                permits,
                config: Arc::new(config),
            },
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(handlers::handle_root))
            .route("/zipmeta/", get(handlers::handle_zipmeta_empty))
            .route("/zipmeta/{id}", get(handlers::handle_zipmeta))
            .with_state(self.state.clone())
    }
}
