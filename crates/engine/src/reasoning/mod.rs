//! Reasoning capability abstraction
//!
//! Two narrow contracts stand in for the language model:
//! - `Decomposer` splits free text into claim strings
//! - `ClaimScorer` judges one claim against its evidence
//!
//! Backends:
//! - OpenAI-compatible chat completions (`ChatModel`, implements both)
//! - Heuristic sentence splitting and term overlap (offline use)

mod heuristic;
mod openai;

pub use heuristic::{OverlapScorer, SentenceDecomposer};
pub use openai::ChatModel;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use factcheck_common::config::ReasoningConfig;
use factcheck_common::errors::{AppError, ReasoningError, Result};
use factcheck_common::Claim;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Trait for claim decomposition
#[async_trait]
pub trait Decomposer: Send + Sync {
    /// Split `text` into atomic factual claims, in reading order
    async fn decompose(&self, text: &str) -> std::result::Result<Vec<String>, ReasoningError>;
}

/// One accepted source as presented to the scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub url: String,
    pub title: String,
    pub excerpt: String,
    pub published: Option<DateTime<Utc>>,

    /// Host is on the configured allow list
    pub trusted: bool,
}

/// Per-source judgement returned by the scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceJudgement {
    pub url: String,
    pub judgement: f64,
}

/// Unvalidated scorer output; the evaluator clamps and repairs it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub score: Option<f64>,
    pub reasoning: Option<String>,
    #[serde(default)]
    pub judgements: Vec<SourceJudgement>,
}

/// Trait for claim scoring
#[async_trait]
pub trait ClaimScorer: Send + Sync {
    async fn score(
        &self,
        claim: &Claim,
        evidence: &[Evidence],
    ) -> std::result::Result<Verdict, ReasoningError>;
}

/// Decomposition and scoring backends selected by configuration
#[derive(Clone)]
pub struct ReasoningBackends {
    pub decomposer: Arc<dyn Decomposer>,
    pub scorer: Arc<dyn ClaimScorer>,
}

/// Create reasoning backends based on configuration
pub fn create_reasoning(config: &ReasoningConfig) -> Result<ReasoningBackends> {
    match config.provider.as_str() {
        "openai" => {
            let model = Arc::new(ChatModel::new(config)?);
            Ok(ReasoningBackends {
                decomposer: model.clone(),
                scorer: model,
            })
        }
        "heuristic" => {
            tracing::warn!("Using heuristic reasoning; scores reflect term overlap only");
            Ok(ReasoningBackends {
                decomposer: Arc::new(SentenceDecomposer::default()),
                scorer: Arc::new(OverlapScorer::default()),
            })
        }
        other => Err(AppError::Configuration {
            message: format!("unknown reasoning provider: {other}"),
        }),
    }
}
