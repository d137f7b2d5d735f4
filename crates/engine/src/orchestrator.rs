//! Fact-check run orchestration
//!
//! A run moves through `Idle -> Extracting -> Dispatching -> Awaiting ->
//! Aggregating -> Done`, or ends in `Failed` when extraction fails or the
//! deadline passes before any claim exists. Individual claim failures
//! never fail the run.
//!
//! Claims are evaluated concurrently, one task per claim. Results are
//! slotted by claim position so the report keeps extraction order no matter
//! which evaluation finishes first.

use crate::aggregator::aggregate_with_notes;
use crate::evaluator::ClaimEvaluator;
use crate::extractor::ClaimExtractor;
use crate::filter::SourceFilter;
use crate::reasoning::{ClaimScorer, Decomposer};
use crate::research::ResearchGateway;
use factcheck_common::config::EngineConfig;
use factcheck_common::{metrics, CheckError, Claim, ClaimResult, Report};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, instrument, warn, Instrument};
use uuid::Uuid;

/// Longest deadline a run accepts; larger requests are capped to it
pub const MAX_RUN_DEADLINE: Duration = Duration::from_secs(24 * 60 * 60);

/// Engine-wide defaults, fixed at startup
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub deadline: Duration,

    /// Simultaneous claim evaluations and research calls per run; `None`
    /// leaves a run bounded only by `max_research_calls`
    pub max_concurrency: Option<usize>,

    /// Simultaneous research calls across all runs
    pub max_research_calls: usize,

    pub score_default_on_failure: f64,
    pub min_claim_budget: Duration,
    pub queries_per_claim: usize,
    pub max_facts: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for EngineSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            deadline: Duration::from_millis(config.deadline_ms),
            max_concurrency: config.max_concurrency,
            max_research_calls: config.max_research_calls,
            score_default_on_failure: config.score_default_on_failure,
            min_claim_budget: Duration::from_millis(config.min_claim_budget_ms),
            queries_per_claim: config.queries_per_claim,
            max_facts: config.max_facts,
        }
    }
}

/// Per-run overrides of the engine settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    pub deadline: Option<Duration>,
    pub max_concurrency: Option<usize>,
    pub score_default_on_failure: Option<f64>,
    pub max_facts: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Extracting,
    Dispatching,
    Awaiting,
    Aggregating,
    Done,
    Failed,
}

struct RunState {
    phase: Phase,
}

impl RunState {
    fn new() -> Self {
        Self { phase: Phase::Idle }
    }

    fn advance(&mut self, next: Phase) {
        debug!(from = ?self.phase, to = ?next, "Run phase changed");
        self.phase = next;
    }
}

/// Runs fact checks end to end
pub struct Orchestrator {
    extractor: ClaimExtractor,
    evaluator: ClaimEvaluator,
    settings: EngineSettings,
}

impl Orchestrator {
    pub fn new(
        decomposer: Arc<dyn Decomposer>,
        research: Arc<dyn ResearchGateway>,
        scorer: Arc<dyn ClaimScorer>,
        filter: SourceFilter,
        settings: EngineSettings,
    ) -> Self {
        let research_slots = Arc::new(Semaphore::new(settings.max_research_calls.max(1)));
        let evaluator = ClaimEvaluator::new(
            research,
            scorer,
            Arc::new(filter),
            research_slots,
            settings.queries_per_claim,
        );

        Self {
            extractor: ClaimExtractor::new(decomposer),
            evaluator,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Check `text`, returning a report no later than `overall_deadline`
    /// from now (plus cancellation overhead).
    pub async fn run(&self, text: &str, overall_deadline: Duration) -> Result<Report, CheckError> {
        self.run_with(
            text,
            RunOptions {
                deadline: Some(overall_deadline),
                ..RunOptions::default()
            },
        )
        .await
    }

    /// Check `text` with per-run overrides
    #[instrument(skip_all, fields(run_id = %Uuid::new_v4()))]
    pub async fn run_with(&self, text: &str, options: RunOptions) -> Result<Report, CheckError> {
        let started = Instant::now();
        let mut state = RunState::new();

        let budget = options
            .deadline
            .unwrap_or(self.settings.deadline)
            .min(MAX_RUN_DEADLINE);
        let deadline = started + budget;
        let default_score = options
            .score_default_on_failure
            .filter(|s| s.is_finite())
            .unwrap_or(self.settings.score_default_on_failure)
            .clamp(0.0, 1.0);
        let max_facts = options.max_facts.unwrap_or(self.settings.max_facts).max(1);

        info!(
            input_chars = text.chars().count(),
            deadline_ms = budget.as_millis() as u64,
            "Starting fact check"
        );

        state.advance(Phase::Extracting);
        let mut claims = match timeout_at(deadline, self.extractor.extract(text)).await {
            Ok(Ok(claims)) => claims,
            Ok(Err(e)) => {
                state.advance(Phase::Failed);
                warn!(error = %e, "Claim extraction failed");
                metrics::record_check_failure("extraction");
                return Err(e);
            }
            Err(_) => {
                state.advance(Phase::Failed);
                warn!("Deadline passed during claim extraction");
                metrics::record_check_failure("timeout");
                return Err(CheckError::Timeout {
                    after_ms: budget.as_millis() as u64,
                });
            }
        };

        let mut run_notes = Vec::new();
        if claims.len() > max_facts {
            run_notes.push(format!(
                "Input produced {} claims; only the first {max_facts} were checked.",
                claims.len()
            ));
            claims.truncate(max_facts);
        }

        state.advance(Phase::Dispatching);
        let claim_count = claims.len();
        let run_limit = options
            .max_concurrency
            .or(self.settings.max_concurrency)
            .map(|n| n.clamp(1, Semaphore::MAX_PERMITS));
        let concurrency = run_limit
            .unwrap_or(claim_count)
            .clamp(1, claim_count.max(1));
        let waves = claim_count.div_ceil(concurrency);
        let per_claim = claim_budget(
            deadline.saturating_duration_since(Instant::now()),
            waves,
            self.settings.min_claim_budget,
        );
        debug!(
            claims = claim_count,
            concurrency,
            per_claim_ms = per_claim.as_millis() as u64,
            "Dispatching claim evaluations"
        );

        // The run limit caps research calls as well as claims in flight
        let evaluator = match run_limit {
            Some(n) => self.evaluator.with_run_limit(Arc::new(Semaphore::new(n))),
            None => self.evaluator.clone(),
        };
        let slots = Arc::new(Semaphore::new(concurrency));
        let mut tasks = JoinSet::new();
        for (position, claim) in claims.iter().cloned().enumerate() {
            let evaluator = evaluator.clone();
            let slots = slots.clone();
            tasks.spawn(
                async move {
                    // The slot is held until the evaluation finishes
                    let _slot = slots.acquire_owned().await.ok();
                    let claim_deadline = (Instant::now() + per_claim).min(deadline);
                    let result = evaluate_claim(&evaluator, claim, claim_deadline, default_score).await;
                    (position, result)
                }
                .in_current_span(),
            );
        }

        state.advance(Phase::Awaiting);
        let mut collected: Vec<Option<ClaimResult>> = vec![None; claim_count];
        let collect = async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((position, result)) => collected[position] = Some(result),
                    Err(e) => error!(error = %e, "Claim evaluation task failed"),
                }
            }
        };
        let timed_out = timeout_at(deadline, collect).await.is_err();

        if timed_out {
            warn!(
                pending = collected.iter().filter(|r| r.is_none()).count(),
                "Deadline passed; cancelling outstanding evaluations"
            );
            tasks.abort_all();
        }

        let missing_note = if timed_out { "timeout" } else { "evaluation aborted" };
        let results: Vec<ClaimResult> = collected
            .into_iter()
            .zip(claims)
            .map(|(slot, claim)| {
                slot.unwrap_or_else(|| ClaimResult::failed(claim, default_score, missing_note))
            })
            .collect();

        state.advance(Phase::Aggregating);
        let elapsed = started.elapsed();
        let report = aggregate_with_notes(results, elapsed, run_notes);

        let failed = report.failed_facts().count();
        metrics::record_check(elapsed.as_secs_f64(), report.aggregate.facts_count, failed);
        info!(
            facts = report.aggregate.facts_count,
            failed,
            score = report.aggregate.score,
            duration_ms = report.meta.duration_ms,
            "Fact check completed"
        );

        state.advance(Phase::Done);
        Ok(report)
    }
}

/// Evaluate one claim; a claim the evaluator rejects outright scores 0.0
async fn evaluate_claim(
    evaluator: &ClaimEvaluator,
    claim: Claim,
    deadline: Instant,
    default_score: f64,
) -> ClaimResult {
    match evaluator.evaluate(&claim, deadline, default_score).await {
        Ok(result) => result,
        Err(e) => {
            warn!(claim = claim.index, error = %e, "Claim rejected");
            ClaimResult::failed(claim, 0.0, e.to_string())
        }
    }
}

/// Time each claim may spend once it starts.
///
/// With `waves` rounds of evaluations the remaining time is split evenly,
/// never below `floor` and never beyond what is left overall.
fn claim_budget(remaining: Duration, waves: usize, floor: Duration) -> Duration {
    if waves <= 1 {
        return remaining;
    }
    let waves = u32::try_from(waves).unwrap_or(u32::MAX);
    (remaining / waves).max(floor).min(remaining)
}
