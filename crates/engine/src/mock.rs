//! Deterministic collaborators for tests and offline runs
//!
//! Responses are scripted by substring match on the query or claim text,
//! with optional delays so ordering and deadline behaviour can be driven
//! from tests (use `tokio::time::pause` for instant, reproducible timing).

use crate::reasoning::{ClaimScorer, Decomposer, Evidence, Verdict};
use crate::research::{RawCandidate, ResearchGateway};
use async_trait::async_trait;
use factcheck_common::errors::{ReasoningError, ResearchError};
use factcheck_common::Claim;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Decomposer returning a fixed answer
pub struct StaticExtractor {
    answer: Result<Vec<String>, ReasoningError>,
    delay: Duration,
}

impl StaticExtractor {
    pub fn claims<I, S>(claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answer: Ok(claims.into_iter().map(Into::into).collect()),
            delay: Duration::ZERO,
        }
    }

    pub fn failing(err: ReasoningError) -> Self {
        Self {
            answer: Err(err),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Decomposer for StaticExtractor {
    async fn decompose(&self, _text: &str) -> Result<Vec<String>, ReasoningError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.answer.clone()
    }
}

struct ResearchScript {
    key: String,
    delay: Duration,
    response: Result<Vec<RawCandidate>, ResearchError>,
}

/// Search gateway answering from a script
///
/// The first entry whose key is contained in the query wins; queries with
/// no match get the fallback response.
pub struct ScriptedResearch {
    scripts: Vec<ResearchScript>,
    fallback: Result<Vec<RawCandidate>, ResearchError>,
    fallback_delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Default for ScriptedResearch {
    fn default() -> Self {
        Self {
            scripts: Vec::new(),
            fallback: Err(ResearchError::Empty),
            fallback_delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }
}

impl ScriptedResearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every query with one synthetic candidate
    pub fn echo() -> Self {
        Self::new().otherwise(Ok(vec![candidate(
            "https://example.org/reference",
            "Offline reference material",
        )]))
    }

    pub fn on(mut self, key: impl Into<String>, response: Result<Vec<RawCandidate>, ResearchError>) -> Self {
        self.scripts.push(ResearchScript {
            key: key.into(),
            delay: Duration::ZERO,
            response,
        });
        self
    }

    pub fn on_delayed(
        mut self,
        key: impl Into<String>,
        delay: Duration,
        response: Result<Vec<RawCandidate>, ResearchError>,
    ) -> Self {
        self.scripts.push(ResearchScript {
            key: key.into(),
            delay,
            response,
        });
        self
    }

    pub fn otherwise(mut self, response: Result<Vec<RawCandidate>, ResearchError>) -> Self {
        self.fallback = response;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.fallback_delay = delay;
        for script in &mut self.scripts {
            if script.delay.is_zero() {
                script.delay = delay;
            }
        }
        self
    }

    /// Total queries received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of queries that were in flight at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ResearchGateway for ScriptedResearch {
    async fn search(&self, query: &str, _deadline: Instant) -> Result<Vec<RawCandidate>, ResearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let (delay, response) = self
            .scripts
            .iter()
            .find(|s| query.contains(&s.key))
            .map(|s| (s.delay, &s.response))
            .unwrap_or((self.fallback_delay, &self.fallback));

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        response.clone()
    }

    fn provider(&self) -> &str {
        "mock"
    }
}

/// Scorer answering from a script keyed by claim text
pub struct ScriptedScorer {
    scripts: Vec<(String, Result<Verdict, ReasoningError>)>,
    fallback: Result<Verdict, ReasoningError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl Default for ScriptedScorer {
    fn default() -> Self {
        Self {
            scripts: Vec::new(),
            fallback: Ok(Verdict {
                score: Some(0.5),
                reasoning: Some("Evidence is inconclusive.".to_string()),
                judgements: Vec::new(),
            }),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }
}

impl ScriptedScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, key: impl Into<String>, verdict: Result<Verdict, ReasoningError>) -> Self {
        self.scripts.push((key.into(), verdict));
        self
    }

    pub fn otherwise(mut self, verdict: Result<Verdict, ReasoningError>) -> Self {
        self.fallback = verdict;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClaimScorer for ScriptedScorer {
    async fn score(&self, claim: &Claim, _evidence: &[Evidence]) -> Result<Verdict, ReasoningError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.scripts
            .iter()
            .find(|(key, _)| claim.text.contains(key.as_str()))
            .map(|(_, verdict)| verdict.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Convenience constructor for scripted candidates
pub fn candidate(url: &str, excerpt: &str) -> RawCandidate {
    RawCandidate {
        url: url.to_string(),
        title: excerpt.chars().take(40).collect(),
        excerpt: excerpt.to_string(),
        published: None,
    }
}

/// Convenience constructor for scripted verdicts
pub fn verdict(score: f64, reasoning: &str) -> Verdict {
    Verdict {
        score: Some(score),
        reasoning: Some(reasoning.to_string()),
        judgements: Vec::new(),
    }
}
