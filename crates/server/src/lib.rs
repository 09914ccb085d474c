pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use db::{DocumentStore, models::resource::ResourceKind};
use services::services::resource::ResourceService;

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: ServerConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    pub fn service(&self, kind: ResourceKind) -> ResourceService {
        ResourceService::new(self.store.clone(), kind)
    }
}
