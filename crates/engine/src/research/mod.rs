//! Research gateway abstraction
//!
//! The gateway turns one query into ranked candidate sources. Calls are
//! independent and hold no cross-call state, so any number may run at once;
//! the engine bounds how many do.

mod brave;

pub use brave::BraveSearch;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use factcheck_common::{errors::Result, AppError, ResearchError};
use factcheck_common::config::ResearchConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Instant;

/// Unfiltered search hit as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub url: String,
    pub title: String,

    /// Snippet or quote from the page
    pub excerpt: String,

    pub published: Option<DateTime<Utc>>,
}

/// Trait for web search backends
#[async_trait]
pub trait ResearchGateway: Send + Sync {
    /// Run one query, finishing by `deadline`.
    ///
    /// An empty result set is an error (`ResearchError::Empty`).
    async fn search(
        &self,
        query: &str,
        deadline: Instant,
    ) -> std::result::Result<Vec<RawCandidate>, ResearchError>;

    /// Provider name used in logs and metrics
    fn provider(&self) -> &str;
}

/// Create a research gateway based on configuration
pub fn create_research_gateway(config: &ResearchConfig) -> Result<Arc<dyn ResearchGateway>> {
    match config.provider.as_str() {
        "brave" => Ok(Arc::new(BraveSearch::new(config)?)),
        "mock" => {
            tracing::warn!("Using mock research gateway; reports will not reflect real sources");
            Ok(Arc::new(crate::mock::ScriptedResearch::echo()))
        }
        other => Err(AppError::Configuration {
            message: format!("unknown research provider: {other}"),
        }),
    }
}
