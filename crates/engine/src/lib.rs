//! Fact-check engine
//!
//! Pipeline: extract claims, research each claim concurrently under a
//! deadline, filter sources by domain, score, then aggregate into a report.
//!
//! External capabilities sit behind traits so backends can be swapped:
//! - `ResearchGateway` for web search (Brave, or the offline mock)
//! - `Decomposer` and `ClaimScorer` for reasoning (OpenAI-compatible chat,
//!   or heuristics)

pub mod aggregator;
pub mod evaluator;
pub mod extractor;
pub mod filter;
pub mod mock;
pub mod orchestrator;
pub mod reasoning;
pub mod research;

pub use aggregator::{aggregate, aggregate_with_notes};
pub use evaluator::ClaimEvaluator;
pub use extractor::ClaimExtractor;
pub use filter::{normalize_url, SourceClass, SourceFilter};
pub use orchestrator::{EngineSettings, Orchestrator, RunOptions};
pub use reasoning::{ClaimScorer, Decomposer, Evidence, Verdict};
pub use research::{RawCandidate, ResearchGateway};

use factcheck_common::{AppConfig, Result};

/// Build an orchestrator with the backends named in configuration
pub fn build_orchestrator(config: &AppConfig) -> Result<Orchestrator> {
    let research = research::create_research_gateway(&config.research)?;
    let reasoning = reasoning::create_reasoning(&config.reasoning)?;
    let filter = SourceFilter::from_config(&config.filter);

    tracing::info!(
        research = research.provider(),
        reasoning = %config.reasoning.provider,
        deny_patterns = config.filter.deny.len(),
        allow_patterns = config.filter.allow.len(),
        "Fact-check engine configured"
    );

    Ok(Orchestrator::new(
        reasoning.decomposer,
        research,
        reasoning.scorer,
        filter,
        EngineSettings::from(&config.engine),
    ))
}
