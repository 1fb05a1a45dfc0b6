pub mod config;
pub mod models;
pub mod geometry;
pub mod storage;
pub mod stores;
pub mod services;
pub mod session;
pub mod view;
pub mod middleware;
pub mod controllers;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::{Config, StorageBackend};
use crate::services::api::{ApiClient, ApiError};
use crate::session::SessionRegistry;
use crate::storage::{FileStorage, MemoryStorage, Storage, StorageError};
use crate::view::html::Views;

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Template(#[from] handlebars::TemplateError),
}

// Shared state для всего приложения
pub struct AppState {
    pub config: Config,
    pub api: ApiClient,
    pub sessions: SessionRegistry,
    pub views: Views,
}

impl AppState {
    pub fn new(config: Config) -> Result<Arc<Self>, InitError> {
        let storage: Arc<dyn Storage> = match config.storage.backend {
            StorageBackend::File => {
                info!("Using file storage at {}", config.storage.dir);
                Arc::new(FileStorage::open(&config.storage.dir)?)
            }
            StorageBackend::Memory => {
                info!("Using in-memory storage, sessions will not survive restart");
                Arc::new(MemoryStorage::new())
            }
        };
        Self::with_storage(config, storage)
    }

    pub fn with_storage(config: Config, storage: Arc<dyn Storage>) -> Result<Arc<Self>, InitError> {
        let api = ApiClient::from_config(&config.api)?;
        let sessions = SessionRegistry::new(storage, config.clone());
        let views = Views::new()?;
        Ok(Arc::new(Self { config, api, sessions, views }))
    }
}

/// Полный роутер фронта: страницы, слой сессий, трассировка.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(controllers::routes(&state.config))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::session_layer))
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
