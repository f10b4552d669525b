use std::sync::Arc;

use chrono::Duration;

use crate::auth::TokenVerifier;
use crate::config::Config;
use crate::engine::lifecycle::{EngineConfig, OrderEngine};
use crate::observability::metrics::Metrics;
use crate::store::{Directory, OrderStore};

pub struct AppState {
    pub engine: OrderEngine,
    pub tokens: TokenVerifier,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        store: Arc<dyn OrderStore>,
        directory: Arc<dyn Directory>,
        engine_config: EngineConfig,
        tokens: TokenVerifier,
    ) -> Self {
        let metrics = Metrics::new();

        Self {
            engine: OrderEngine::new(store, directory, engine_config, metrics.clone()),
            tokens,
            metrics,
        }
    }

    pub fn from_config(
        config: &Config,
        store: Arc<dyn OrderStore>,
        directory: Arc<dyn Directory>,
    ) -> Self {
        let tokens = TokenVerifier::new(&config.jwt_secret, Duration::hours(config.token_ttl_hours));
        Self::new(store, directory, config.engine(), tokens)
    }
}
