//! Claim extraction
//!
//! Wraps a `Decomposer` and enforces the shape of its output: a non-empty
//! input yields an ordered list of non-empty claims with stable indices.

use crate::reasoning::Decomposer;
use factcheck_common::{CheckError, Claim};
use std::sync::Arc;

/// Turns free text into indexed claims
#[derive(Clone)]
pub struct ClaimExtractor {
    decomposer: Arc<dyn Decomposer>,
}

impl ClaimExtractor {
    pub fn new(decomposer: Arc<dyn Decomposer>) -> Self {
        Self { decomposer }
    }

    /// Extract claims from `text` in reading order.
    ///
    /// Fails when the input is blank or the decomposer answers with anything
    /// other than a list of non-empty strings. An empty list is valid and
    /// produces an empty report downstream.
    pub async fn extract(&self, text: &str) -> Result<Vec<Claim>, CheckError> {
        if text.trim().is_empty() {
            return Err(CheckError::Extraction {
                reason: "input text is empty".to_string(),
            });
        }

        let raw = self.decomposer.decompose(text).await?;

        raw.into_iter()
            .enumerate()
            .map(|(index, claim)| {
                let trimmed = claim.trim();
                if trimmed.is_empty() {
                    return Err(CheckError::Extraction {
                        reason: format!("claim {index} returned by the decomposer is empty"),
                    });
                }
                Ok(Claim::new(index, trimmed))
            })
            .collect()
    }
}
