//! Claim evaluation
//!
//! One evaluation researches a single claim, filters what comes back and
//! asks the scorer for a verdict. Research and scoring failures are
//! absorbed into a degraded `ClaimResult`; only an empty claim is an error.

use crate::filter::{normalize_url, SourceClass, SourceFilter};
use crate::reasoning::{ClaimScorer, Evidence, Verdict};
use crate::research::{RawCandidate, ResearchGateway};
use factcheck_common::errors::{ReasoningError, ResearchError};
use factcheck_common::{metrics, CheckError, Claim, ClaimResult, Source};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, instrument, warn};

/// Judgement given to accepted sources the scorer did not rate
const UNRATED_JUDGEMENT: f64 = 0.5;

const MISSING_REASONING: &str = "The scorer did not provide a rationale.";

/// Evaluates claims against a shared research gateway and scorer
#[derive(Clone)]
pub struct ClaimEvaluator {
    research: Arc<dyn ResearchGateway>,
    scorer: Arc<dyn ClaimScorer>,
    filter: Arc<SourceFilter>,

    /// Bounds simultaneous research calls across every evaluation sharing it
    research_slots: Arc<Semaphore>,

    /// Per-run bound on research calls, when the run sets one
    run_slots: Option<Arc<Semaphore>>,

    queries_per_claim: usize,
}

impl ClaimEvaluator {
    pub fn new(
        research: Arc<dyn ResearchGateway>,
        scorer: Arc<dyn ClaimScorer>,
        filter: Arc<SourceFilter>,
        research_slots: Arc<Semaphore>,
        queries_per_claim: usize,
    ) -> Self {
        Self {
            research,
            scorer,
            filter,
            research_slots,
            run_slots: None,
            queries_per_claim: queries_per_claim.max(1),
        }
    }

    /// Copy of this evaluator whose research calls also take a permit from
    /// `run_slots`
    pub fn with_run_limit(&self, run_slots: Arc<Semaphore>) -> Self {
        Self {
            run_slots: Some(run_slots),
            ..self.clone()
        }
    }

    /// Evaluate `claim`, finishing by `deadline`.
    ///
    /// `default_score` is the score given when no verdict can be produced.
    #[instrument(skip(self, claim), fields(claim = claim.index))]
    pub async fn evaluate(
        &self,
        claim: &Claim,
        deadline: Instant,
        default_score: f64,
    ) -> Result<ClaimResult, CheckError> {
        if claim.text.trim().is_empty() {
            return Err(CheckError::Validation {
                reason: format!("claim {} has no text", claim.index),
            });
        }

        let queries = self.queries_for(claim);
        let outcomes = join_all(queries.iter().map(|q| self.run_query(q, deadline))).await;

        let mut errors = Vec::new();
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(candidates) => {
                    for candidate in candidates {
                        if seen.insert(normalize_url(&candidate.url)) {
                            unique.push(candidate);
                        }
                    }
                }
                Err(e) => errors.push(e),
            }
        }

        if errors.len() == queries.len() {
            let note = research_failure_note(&errors);
            warn!(note = %note, "All research queries failed");
            return Ok(ClaimResult::failed(claim.clone(), default_score, note));
        }

        let sources_checked = unique.len();
        let evidence = self.filter_candidates(unique);
        debug!(
            sources_checked,
            accepted = evidence.len(),
            failed_queries = errors.len(),
            "Research merged"
        );

        let remaining = deadline.saturating_duration_since(Instant::now());
        let verdict = match timeout_at(deadline, self.scorer.score(claim, &evidence)).await {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                return Ok(scoring_failure(claim, default_score, sources_checked, &evidence, &e))
            }
            Err(_) => {
                let e = ReasoningError::Timeout {
                    after_ms: remaining.as_millis() as u64,
                };
                return Ok(scoring_failure(claim, default_score, sources_checked, &evidence, &e));
            }
        };

        Ok(build_result(claim, default_score, sources_checked, &evidence, verdict))
    }

    /// Query rephrasings for a claim, deduplicated, at most `queries_per_claim`
    fn queries_for(&self, claim: &Claim) -> Vec<String> {
        let text = claim.text.trim();
        let mut queries: Vec<String> = Vec::with_capacity(self.queries_per_claim);

        for query in [
            text.to_string(),
            format!("{text} fact check"),
            format!("\"{text}\""),
        ] {
            if queries.len() == self.queries_per_claim {
                break;
            }
            if !queries.contains(&query) {
                queries.push(query);
            }
        }

        queries
    }

    /// Issue one query unless the budget is already spent
    async fn run_query(
        &self,
        query: &str,
        deadline: Instant,
    ) -> Result<Vec<RawCandidate>, ResearchError> {
        let started = Instant::now();
        let remaining = deadline.saturating_duration_since(started);
        if remaining.is_zero() {
            return Err(ResearchError::BudgetExhausted);
        }

        let call = async {
            // Run permit first, then the shared one
            let _run_permit = match &self.run_slots {
                Some(slots) => Some(slots.acquire().await.map_err(slots_closed)?),
                None => None,
            };
            let _permit = self.research_slots.acquire().await.map_err(slots_closed)?;
            self.research.search(query, deadline).await
        };

        let outcome = timeout_at(deadline, call).await.unwrap_or(Err(ResearchError::Timeout {
            after_ms: remaining.as_millis() as u64,
        }));

        metrics::record_research(
            started.elapsed().as_secs_f64(),
            self.research.provider(),
            outcome.is_ok(),
        );
        if let Err(e) = &outcome {
            debug!(query = %query, error = %e, "Research query failed");
        }

        outcome
    }

    fn filter_candidates(&self, candidates: Vec<RawCandidate>) -> Vec<Evidence> {
        candidates
            .into_iter()
            .filter_map(|candidate| {
                let trusted = match self.filter.classify(&candidate.url) {
                    SourceClass::Trusted => true,
                    SourceClass::Neutral => false,
                    class => {
                        debug!(url = %candidate.url, ?class, "Source rejected");
                        return None;
                    }
                };
                Some(Evidence {
                    url: candidate.url,
                    title: candidate.title,
                    excerpt: candidate.excerpt,
                    published: candidate.published,
                    trusted,
                })
            })
            .collect()
    }
}

fn slots_closed(_: tokio::sync::AcquireError) -> ResearchError {
    ResearchError::Transport("research slots closed".to_string())
}

fn research_failure_note(errors: &[ResearchError]) -> String {
    if errors.iter().all(ResearchError::is_timeout) {
        return "timeout".to_string();
    }

    let mut reasons: Vec<String> = Vec::new();
    for e in errors.iter().filter(|e| !e.is_timeout()) {
        let reason = e.to_string();
        if !reasons.contains(&reason) {
            reasons.push(reason);
        }
    }
    format!("no evidence could be gathered: {}", reasons.join("; "))
}

fn to_sources(evidence: &[Evidence], ratings: &HashMap<String, f64>) -> Vec<Source> {
    evidence
        .iter()
        .map(|e| Source {
            url: e.url.clone(),
            judgement: ratings
                .get(&normalize_url(&e.url))
                .copied()
                .unwrap_or(UNRATED_JUDGEMENT),
            excerpt: e.excerpt.clone(),
            publication_date: e.published,
        })
        .collect()
}

fn scoring_failure(
    claim: &Claim,
    default_score: f64,
    sources_checked: usize,
    evidence: &[Evidence],
    err: &ReasoningError,
) -> ClaimResult {
    warn!(error = %err, "Scoring failed");
    let note = match err {
        ReasoningError::Timeout { .. } => "timeout while scoring".to_string(),
        other => format!("scoring failed: {other}"),
    };

    ClaimResult {
        sources_checked,
        sources: to_sources(evidence, &HashMap::new()),
        ..ClaimResult::failed(claim.clone(), default_score, note)
    }
}

/// Clamp and repair the scorer's verdict into a well-formed result
fn build_result(
    claim: &Claim,
    default_score: f64,
    sources_checked: usize,
    evidence: &[Evidence],
    verdict: Verdict,
) -> ClaimResult {
    let mut corrections = Vec::new();

    let score = match verdict.score {
        Some(s) if (0.0..=1.0).contains(&s) => s,
        Some(s) if !s.is_nan() => {
            let clamped = s.clamp(0.0, 1.0);
            corrections.push(format!("score {s} was outside [0, 1] and was clamped to {clamped}"));
            clamped
        }
        _ => {
            let fallback = default_score.clamp(0.0, 1.0);
            corrections.push(format!("no score was returned; defaulted to {fallback}"));
            fallback
        }
    };

    let reasoning = match verdict.reasoning.as_deref().map(str::trim) {
        Some(r) if !r.is_empty() => r.to_string(),
        _ => {
            corrections.push("no rationale was returned".to_string());
            MISSING_REASONING.to_string()
        }
    };

    let reasoning = if corrections.is_empty() {
        reasoning
    } else {
        format!("{reasoning} (Note: {}.)", corrections.join("; "))
    };

    let ratings: HashMap<String, f64> = verdict
        .judgements
        .into_iter()
        .filter(|j| !j.judgement.is_nan())
        .map(|j| (normalize_url(&j.url), j.judgement.clamp(0.0, 1.0)))
        .collect();

    ClaimResult {
        claim: claim.clone(),
        sources_checked,
        sources: to_sources(evidence, &ratings),
        score,
        reasoning,
        failed: false,
        failure_note: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{candidate, verdict, ScriptedResearch, ScriptedScorer};
    use crate::reasoning::SourceJudgement;
    use std::time::Duration;

    const CLAIM: &str = "The Eiffel Tower is in Paris.";

    fn evaluator(research: ScriptedResearch, scorer: ScriptedScorer, queries: usize) -> ClaimEvaluator {
        ClaimEvaluator::new(
            Arc::new(research),
            Arc::new(scorer),
            Arc::new(SourceFilter::new(["pinterest.com"], ["britannica.com"], false)),
            Arc::new(Semaphore::new(8)),
            queries,
        )
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[test]
    fn test_query_plan_is_bounded_and_unique() {
        let eval = evaluator(ScriptedResearch::new(), ScriptedScorer::new(), 2);
        let queries = eval.queries_for(&Claim::new(0, CLAIM));
        assert_eq!(queries, vec![CLAIM.to_string(), format!("{CLAIM} fact check")]);

        let eval = evaluator(ScriptedResearch::new(), ScriptedScorer::new(), 0);
        assert_eq!(eval.queries_for(&Claim::new(0, CLAIM)).len(), 1);
    }

    #[tokio::test]
    async fn test_denied_source_counts_but_is_dropped() {
        let research = ScriptedResearch::new().on(
            CLAIM,
            Ok(vec![
                candidate("https://www.britannica.com/topic/Eiffel-Tower", "In Paris"),
                candidate("https://pinterest.com/pin/123", "Pinned"),
                candidate("https://britannica.com/topic/Eiffel-Tower/", "duplicate"),
                candidate("not a url", "garbage"),
            ]),
        );
        let scorer = ScriptedScorer::new().otherwise(Ok(Verdict {
            score: Some(0.95),
            reasoning: Some("Britannica places it in Paris.".into()),
            judgements: vec![SourceJudgement {
                url: "https://britannica.com/topic/Eiffel-Tower".into(),
                judgement: 0.9,
            }],
        }));

        let result = evaluator(research, scorer, 1)
            .evaluate(&Claim::new(0, CLAIM), deadline(), 0.0)
            .await
            .unwrap();

        assert!(!result.failed);
        assert_eq!(result.sources_checked, 3);
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].url, "https://www.britannica.com/topic/Eiffel-Tower");
        assert_eq!(result.sources[0].judgement, 0.9);
        assert_eq!(result.score, 0.95);
        assert_eq!(result.reasoning, "Britannica places it in Paris.");
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_clamped_with_note() {
        let research = ScriptedResearch::new().otherwise(Ok(vec![candidate("https://a.org/x", "text")]));
        let scorer = ScriptedScorer::new().otherwise(Ok(verdict(1.4, "Very sure.")));

        let result = evaluator(research, scorer, 1)
            .evaluate(&Claim::new(0, CLAIM), deadline(), 0.0)
            .await
            .unwrap();

        assert_eq!(result.score, 1.0);
        assert!(result.reasoning.starts_with("Very sure."));
        assert!(result.reasoning.contains("clamped"));
        assert_eq!(result.sources[0].judgement, UNRATED_JUDGEMENT);
    }

    #[tokio::test]
    async fn test_missing_score_and_reasoning_are_repaired() {
        let research = ScriptedResearch::new().otherwise(Ok(vec![candidate("https://a.org/x", "text")]));
        let scorer = ScriptedScorer::new().otherwise(Ok(Verdict::default()));

        let result = evaluator(research, scorer, 1)
            .evaluate(&Claim::new(0, CLAIM), deadline(), 0.2)
            .await
            .unwrap();

        assert!(!result.failed);
        assert_eq!(result.score, 0.2);
        assert!(result.reasoning.starts_with(MISSING_REASONING));
        assert!(result.reasoning.contains("no score was returned"));
    }

    #[tokio::test]
    async fn test_all_queries_failing_degrades_claim() {
        let research = ScriptedResearch::new()
            .otherwise(Err(ResearchError::Status { status: 503 }));
        let scorer = Arc::new(ScriptedScorer::new());
        let eval = ClaimEvaluator::new(
            Arc::new(research),
            scorer.clone(),
            Arc::new(SourceFilter::default()),
            Arc::new(Semaphore::new(8)),
            2,
        );
        let result = eval
            .evaluate(&Claim::new(4, CLAIM), deadline(), 0.0)
            .await
            .unwrap();

        assert_eq!(scorer.calls(), 0);
        assert!(result.failed);
        assert_eq!(result.sources_checked, 0);
        assert!(result.sources.is_empty());
        assert_eq!(result.score, 0.0);
        assert_eq!(
            result.failure_note.as_deref(),
            Some("no evidence could be gathered: search backend answered with status 503")
        );
    }

    #[tokio::test]
    async fn test_partial_research_failure_is_tolerated() {
        let research = ScriptedResearch::new()
            .on("fact check", Err(ResearchError::Empty))
            .otherwise(Ok(vec![candidate("https://a.org/x", "text")]));

        let result = evaluator(research, ScriptedScorer::new(), 2)
            .evaluate(&Claim::new(0, CLAIM), deadline(), 0.0)
            .await
            .unwrap();

        assert!(!result.failed);
        assert_eq!(result.sources_checked, 1);
    }

    #[tokio::test]
    async fn test_scorer_failure_keeps_sources() {
        let research = ScriptedResearch::new().otherwise(Ok(vec![candidate("https://a.org/x", "text")]));
        let scorer = ScriptedScorer::new()
            .otherwise(Err(ReasoningError::Status { status: 500, body: "boom".into() }));

        let result = evaluator(research, scorer, 1)
            .evaluate(&Claim::new(0, CLAIM), deadline(), 0.1)
            .await
            .unwrap();

        assert!(result.failed);
        assert_eq!(result.score, 0.1);
        assert_eq!(result.sources_checked, 1);
        assert_eq!(result.sources.len(), 1);
        assert!(result.failure_note.unwrap().starts_with("scoring failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_scorer_times_out_keeping_sources() {
        let research = ScriptedResearch::new().otherwise(Ok(vec![
            candidate("https://www.britannica.com/topic/Eiffel-Tower", "In Paris"),
            candidate("https://pinterest.com/pin/1", "Pinned"),
        ]));
        let scorer = ScriptedScorer::new().with_delay(Duration::from_secs(30));

        let result = evaluator(research, scorer, 1)
            .evaluate(&Claim::new(0, CLAIM), deadline(), 0.3)
            .await
            .unwrap();

        assert!(result.failed);
        assert_eq!(result.score, 0.3);
        assert_eq!(result.failure_note.as_deref(), Some("timeout while scoring"));
        assert_eq!(result.sources_checked, 2);
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].judgement, UNRATED_JUDGEMENT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_limit_bounds_queries_of_one_claim() {
        let research = Arc::new(ScriptedResearch::echo().with_delay(Duration::from_millis(100)));
        let eval = ClaimEvaluator::new(
            research.clone(),
            Arc::new(ScriptedScorer::new()),
            Arc::new(SourceFilter::default()),
            Arc::new(Semaphore::new(8)),
            3,
        )
        .with_run_limit(Arc::new(Semaphore::new(1)));

        let result = eval
            .evaluate(&Claim::new(0, CLAIM), deadline(), 0.0)
            .await
            .unwrap();

        assert!(!result.failed);
        assert_eq!(research.calls(), 3);
        assert_eq!(research.peak_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_research_times_out() {
        let research = ScriptedResearch::new()
            .with_delay(Duration::from_secs(30))
            .otherwise(Ok(vec![candidate("https://a.org/x", "text")]));

        let result = evaluator(research, ScriptedScorer::new(), 2)
            .evaluate(&Claim::new(0, CLAIM), deadline(), 0.0)
            .await
            .unwrap();

        assert!(result.failed);
        assert_eq!(result.failure_note.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_spent_budget_issues_no_queries() {
        let research = Arc::new(ScriptedResearch::echo());
        let eval = ClaimEvaluator::new(
            research.clone(),
            Arc::new(ScriptedScorer::new()),
            Arc::new(SourceFilter::default()),
            Arc::new(Semaphore::new(1)),
            2,
        );

        let result = eval
            .evaluate(&Claim::new(0, CLAIM), Instant::now(), 0.0)
            .await
            .unwrap();

        assert!(result.failed);
        assert_eq!(research.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_claim_is_a_validation_error() {
        let err = evaluator(ScriptedResearch::echo(), ScriptedScorer::new(), 1)
            .evaluate(&Claim::new(2, "   "), deadline(), 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::Validation { .. }));
    }
}
