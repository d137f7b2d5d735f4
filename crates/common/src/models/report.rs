//! Run-level report

use super::ClaimResult;
use serde::{Deserialize, Serialize};

/// Summary statistics over all claim results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    /// Arithmetic mean of every claim score, 0 when there are no claims
    pub score: f64,

    pub facts_count: usize,

    /// Index of the claim with the lowest score (ties: fewest sources
    /// checked, then lowest index). `None` only when there are no claims.
    pub most_uncertain_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMeta {
    /// Wall-clock time from run start to aggregation
    pub duration_ms: u64,

    pub engine: String,

    /// Human-readable disclosure of every absorbed failure
    pub notes: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// The complete output of one fact-check run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Per-claim results in original claim order
    pub facts: Vec<ClaimResult>,
    pub aggregate: AggregateResult,
    pub meta: ReportMeta,
}

impl Report {
    /// Claims whose evaluation failed, in claim order
    pub fn failed_facts(&self) -> impl Iterator<Item = &ClaimResult> {
        self.facts.iter().filter(|f| f.failed)
    }

    pub fn most_uncertain(&self) -> Option<&ClaimResult> {
        self.aggregate
            .most_uncertain_index
            .and_then(|i| self.facts.get(i))
    }
}
