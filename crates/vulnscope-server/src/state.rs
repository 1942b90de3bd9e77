//! Application state shared across handlers.

use std::sync::Arc;

use vulnscope_agent::Orchestrator;
use vulnscope_reports::LinkIssuer;

use crate::config::ServerConfig;
use crate::ratelimit::{SharedRateLimiter, create_rate_limiter};

/// State handed to every handler. Built once at startup and never mutated.
#[derive(Clone)]
pub struct AppState {
    /// The orchestrator driving chat requests.
    pub orchestrator: Arc<Orchestrator>,

    /// Download links minted by the report tools.
    pub links: Arc<LinkIssuer>,

    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Global request limiter sized from `config.api_rpm`.
    pub limiter: SharedRateLimiter,
}

impl AppState {
    /// Create a new application state.
    pub fn new(orchestrator: Orchestrator, links: Arc<LinkIssuer>, config: ServerConfig) -> Self {
        Self::from_shared(Arc::new(orchestrator), links, config)
    }

    pub fn from_shared(
        orchestrator: Arc<Orchestrator>,
        links: Arc<LinkIssuer>,
        config: ServerConfig,
    ) -> Self {
        let limiter = create_rate_limiter(config.api_rpm);
        Self {
            orchestrator,
            links,
            config: Arc::new(config),
            limiter,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Model identifier advertised when the client does not name one.
    pub fn model(&self) -> &str {
        self.orchestrator.model()
    }
}
