//! Claim-level records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single atomic factual statement extracted from the input text
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    /// Zero-based position in the original extraction order
    pub index: usize,

    /// Claim text as produced by the extractor
    pub text: String,
}

impl Claim {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

/// Evidence that survived the source filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub url: String,

    /// How strongly this source bears on the claim (0.0 - 1.0)
    pub judgement: f64,

    /// Quote or snippet taken from the source
    pub excerpt: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<DateTime<Utc>>,
}

/// Outcome of evaluating one claim
///
/// `score` is always defined, including for failed claims, so the
/// aggregate can be computed without special cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResult {
    pub claim: Claim,

    /// Number of distinct candidates examined by the source filter,
    /// accepted and rejected alike
    pub sources_checked: usize,

    /// Accepted sources in discovery order
    pub sources: Vec<Source>,

    /// Confidence that the claim is true (0.0 - 1.0)
    pub score: f64,

    pub reasoning: String,

    /// True when no usable verdict could be produced for the claim
    pub failed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_note: Option<String>,
}

impl ClaimResult {
    /// Degraded result for a claim whose evaluation produced no verdict.
    pub fn failed(claim: Claim, default_score: f64, note: impl Into<String>) -> Self {
        let note = note.into();
        Self {
            claim,
            sources_checked: 0,
            sources: Vec::new(),
            score: default_score.clamp(0.0, 1.0),
            reasoning: format!("Unverified: {note}"),
            failed: true,
            failure_note: Some(note),
        }
    }

    pub fn index(&self) -> usize {
        self.claim.index
    }
}
