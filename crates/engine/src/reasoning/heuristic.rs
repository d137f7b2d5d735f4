//! Offline reasoning backends
//!
//! Sentence-level decomposition and term-overlap scoring. They cannot
//! detect contradiction, only how much of a claim the sources repeat.

use super::{ClaimScorer, Decomposer, Evidence, SourceJudgement, Verdict};
use async_trait::async_trait;
use factcheck_common::errors::ReasoningError;
use factcheck_common::Claim;
use std::collections::HashSet;

/// Splits text on sentence terminators followed by whitespace
#[derive(Debug, Clone)]
pub struct SentenceDecomposer {
    /// Sentences shorter than this (in characters) are skipped
    pub min_len: usize,
}

impl Default for SentenceDecomposer {
    fn default() -> Self {
        Self { min_len: 8 }
    }
}

impl SentenceDecomposer {
    fn split_sentences(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut current = String::new();
        let mut chars = text.chars().peekable();

        while let Some(ch) = chars.next() {
            current.push(ch);
            let at_boundary = matches!(ch, '.' | '?' | '!')
                && chars.peek().map_or(true, |next| next.is_whitespace());
            if at_boundary || ch == '\n' {
                self.push_sentence(&mut sentences, &current);
                current.clear();
            }
        }
        self.push_sentence(&mut sentences, &current);

        sentences
    }

    fn push_sentence(&self, sentences: &mut Vec<String>, raw: &str) {
        let trimmed = raw.trim();
        if trimmed.chars().count() >= self.min_len && trimmed.chars().any(char::is_alphabetic) {
            sentences.push(trimmed.to_string());
        }
    }
}

#[async_trait]
impl Decomposer for SentenceDecomposer {
    async fn decompose(&self, text: &str) -> Result<Vec<String>, ReasoningError> {
        Ok(self.split_sentences(text))
    }
}

/// Scores a claim by how many of its content words the sources repeat
#[derive(Debug, Clone)]
pub struct OverlapScorer {
    /// Bonus added to the judgement of sources on the allow list
    pub trusted_bonus: f64,
}

impl Default for OverlapScorer {
    fn default() -> Self {
        Self { trusted_bonus: 0.1 }
    }
}

fn content_words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 3 || w.chars().any(|c| c.is_ascii_digit()))
        .map(|w| w.to_lowercase())
        .collect()
}

#[async_trait]
impl ClaimScorer for OverlapScorer {
    async fn score(&self, claim: &Claim, evidence: &[Evidence]) -> Result<Verdict, ReasoningError> {
        let claim_words = content_words(&claim.text);

        if evidence.is_empty() || claim_words.is_empty() {
            return Ok(Verdict {
                score: Some(0.0),
                reasoning: Some("No usable sources to compare against.".to_string()),
                judgements: Vec::new(),
            });
        }

        let judgements: Vec<SourceJudgement> = evidence
            .iter()
            .map(|e| {
                let source_words = content_words(&format!("{} {}", e.title, e.excerpt));
                let shared = claim_words.intersection(&source_words).count();
                let mut judgement = shared as f64 / claim_words.len() as f64;
                if e.trusted {
                    judgement += self.trusted_bonus;
                }
                SourceJudgement {
                    url: e.url.clone(),
                    judgement: judgement.min(1.0),
                }
            })
            .collect();

        let best = judgements.iter().map(|j| j.judgement).fold(0.0, f64::max);
        let mean = judgements.iter().map(|j| j.judgement).sum::<f64>() / judgements.len() as f64;
        let score = (best + mean) / 2.0;
        let strong = judgements.iter().filter(|j| j.judgement >= 0.6).count();

        Ok(Verdict {
            score: Some(score),
            reasoning: Some(format!(
                "{strong} of {} sources repeat most of the claim's terms; overlap scoring cannot detect contradictions.",
                judgements.len()
            )),
            judgements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sentence_splitting() {
        let decomposer = SentenceDecomposer::default();
        let claims = decomposer
            .decompose("The Eiffel Tower is in Paris. The Eiffel Tower is 1000m tall.")
            .await
            .unwrap();

        assert_eq!(
            claims,
            vec!["The Eiffel Tower is in Paris.", "The Eiffel Tower is 1000m tall."]
        );
    }

    #[test]
    fn test_decimal_points_do_not_split() {
        let decomposer = SentenceDecomposer::default();
        let sentences = decomposer.split_sentences("The tower is 330.75 metres tall! Is it? Yes.\nIt opened in 1889");
        assert_eq!(
            sentences,
            vec!["The tower is 330.75 metres tall!", "It opened in 1889"]
        );
    }

    #[tokio::test]
    async fn test_overlap_prefers_matching_sources() {
        let scorer = OverlapScorer::default();
        let claim = Claim::new(0, "The Eiffel Tower is located in Paris");
        let evidence = vec![
            Evidence {
                url: "https://a.org".into(),
                title: "Eiffel Tower".into(),
                excerpt: "The Eiffel Tower is a landmark located in Paris, France.".into(),
                published: None,
                trusted: false,
            },
            Evidence {
                url: "https://b.org".into(),
                title: "Cooking".into(),
                excerpt: "Recipes for dinner".into(),
                published: None,
                trusted: false,
            },
        ];

        let verdict = scorer.score(&claim, &evidence).await.unwrap();
        assert_eq!(verdict.judgements[0].judgement, 1.0);
        assert_eq!(verdict.judgements[1].judgement, 0.0);
        assert_eq!(verdict.score, Some(0.75));
    }

    #[tokio::test]
    async fn test_overlap_without_evidence() {
        let verdict = OverlapScorer::default()
            .score(&Claim::new(0, "Anything at all"), &[])
            .await
            .unwrap();
        assert_eq!(verdict.score, Some(0.0));
    }
}
