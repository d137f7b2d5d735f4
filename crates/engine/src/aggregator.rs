//! Report aggregation

use factcheck_common::{AggregateResult, ClaimResult, Report, ReportMeta, ENGINE_NAME, VERSION};
use std::cmp::Ordering;
use std::time::Duration;

const NO_CLAIMS_NOTE: &str = "No claims were extracted; aggregate score defaults to 0.";
const ALL_RESEARCHED_NOTE: &str = "All claims were researched successfully.";

/// Build the final report from claim results already in claim order
pub fn aggregate(results: Vec<ClaimResult>, elapsed: Duration) -> Report {
    aggregate_with_notes(results, elapsed, Vec::new())
}

/// Like [`aggregate`], with run-level notes placed ahead of the per-claim ones
pub fn aggregate_with_notes(
    results: Vec<ClaimResult>,
    elapsed: Duration,
    run_notes: Vec<String>,
) -> Report {
    let facts_count = results.len();
    let score = if facts_count == 0 {
        0.0
    } else {
        results.iter().map(|r| r.score).sum::<f64>() / facts_count as f64
    };

    let most_uncertain = results.iter().min_by(|a, b| uncertainty_order(a, b));

    let mut notes = run_notes;
    match most_uncertain {
        None => notes.push(NO_CLAIMS_NOTE.to_string()),
        Some(r) => notes.push(format!(
            "Most uncertain claim: {} (score {:.2}).",
            r.index(),
            r.score
        )),
    }

    let mut any_failed = false;
    for failed in results.iter().filter(|r| r.failed) {
        any_failed = true;
        notes.push(format!(
            "claim {} unverified: {}",
            failed.index(),
            failed.failure_note.as_deref().unwrap_or("unknown failure")
        ));
    }
    if facts_count > 0 && !any_failed {
        notes.push(ALL_RESEARCHED_NOTE.to_string());
    }

    Report {
        aggregate: AggregateResult {
            score,
            facts_count,
            most_uncertain_index: most_uncertain.map(ClaimResult::index),
        },
        meta: ReportMeta {
            duration_ms: elapsed.as_millis() as u64,
            engine: ENGINE_NAME.to_string(),
            notes: notes.join("\n"),
            version: Some(VERSION.to_string()),
        },
        facts: results,
    }
}

/// Lowest score first, then fewest sources checked, then lowest index
fn uncertainty_order(a: &ClaimResult, b: &ClaimResult) -> Ordering {
    a.score
        .total_cmp(&b.score)
        .then(a.sources_checked.cmp(&b.sources_checked))
        .then(a.index().cmp(&b.index()))
}
