//! Fact-check handler
//!
//! The response body is a fixed wire contract: only the fields below are
//! emitted, whatever the engine's report carries internally.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use factcheck_common::errors::{AppError, Result};
use factcheck_common::{ClaimResult, Report};
use factcheck_engine::RunOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::AppState;

/// Fact-check request
#[derive(Debug, Deserialize, Validate)]
pub struct CheckRequest {
    /// Article or claim text
    #[serde(alias = "text")]
    #[validate(length(min = 1, message = "input must not be empty"))]
    pub input: String,

    #[serde(default)]
    #[validate(nested)]
    pub options: CheckOptions,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckOptions {
    /// Upper bound on claims checked; engine default when absent
    #[validate(range(min = 1, max = 100))]
    pub max_facts: Option<usize>,

    /// Include each fact's sources in the response
    #[serde(default = "default_return_sources")]
    pub return_sources: bool,

    #[validate(range(min = 1, max = 600_000))]
    pub deadline_ms: Option<u64>,

    #[validate(range(min = 1, max = 256))]
    pub max_concurrency: Option<usize>,

    #[validate(range(min = 0.0, max = 1.0))]
    pub score_default_on_failure: Option<f64>,
}

/// Sources are returned unless the caller opts out, so the default
/// response carries the full report. This deliberately differs from the
/// older API, which omitted them by default.
fn default_return_sources() -> bool {
    true
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            max_facts: None,
            return_sources: true,
            deadline_ms: None,
            max_concurrency: None,
            score_default_on_failure: None,
        }
    }
}

impl CheckOptions {
    /// Reject a deadline the HTTP request timeout would cut short, so an
    /// accepted run always gets to answer with its report
    fn check_deadline(&self, max: Duration) -> Result<()> {
        match self.deadline_ms {
            Some(ms) if Duration::from_millis(ms) > max => Err(AppError::Validation {
                message: format!(
                    "deadlineMs must not exceed {}ms on this server",
                    max.as_millis()
                ),
                field: Some("options.deadlineMs".to_string()),
            }),
            _ => Ok(()),
        }
    }

    fn run_options(&self) -> RunOptions {
        RunOptions {
            deadline: self.deadline_ms.map(Duration::from_millis),
            max_concurrency: self.max_concurrency,
            score_default_on_failure: self.score_default_on_failure,
            max_facts: self.max_facts,
        }
    }
}

/// Fact-check response
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub facts: Vec<FactItem>,
    pub aggregate: AggregateItem,
    pub meta: MetaItem,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FactItem {
    pub text: String,
    pub sources_checked: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceItem>>,
    pub score: f64,
    pub reasoning: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceItem {
    pub url: String,
    pub judgement: f64,
    pub excerpt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateItem {
    pub score: f64,
    pub facts_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaItem {
    pub duration_ms: u64,
    pub engine: String,
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl CheckResponse {
    fn from_report(report: Report, return_sources: bool) -> Self {
        Self {
            facts: report
                .facts
                .into_iter()
                .map(|fact| FactItem::from_result(fact, return_sources))
                .collect(),
            aggregate: AggregateItem {
                score: report.aggregate.score,
                facts_count: report.aggregate.facts_count,
            },
            meta: MetaItem {
                duration_ms: report.meta.duration_ms,
                engine: report.meta.engine,
                notes: report.meta.notes,
                version: report.meta.version,
            },
        }
    }
}

impl FactItem {
    fn from_result(result: ClaimResult, return_sources: bool) -> Self {
        let sources = return_sources.then(|| {
            result
                .sources
                .into_iter()
                .map(|s| SourceItem {
                    url: s.url,
                    judgement: s.judgement,
                    excerpt: s.excerpt,
                    publication_date: s.publication_date.map(|d| d.to_rfc3339()),
                })
                .collect()
        });

        Self {
            text: result.claim.text,
            sources_checked: result.sources_checked,
            sources,
            score: result.score,
            reasoning: result.reasoning,
        }
    }
}

/// Run a fact check over the submitted text
#[instrument(skip_all)]
pub async fn check(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CheckRequest>, JsonRejection>,
) -> Result<Json<CheckResponse>> {
    let Json(request) = payload.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge {
                limit: state.config.server.max_body_bytes,
            }
        } else {
            AppError::InvalidFormat {
                message: rejection.body_text(),
            }
        }
    })?;

    request.validate().map_err(validation_error)?;
    request
        .options
        .check_deadline(state.config.max_run_deadline())?;

    let report = state
        .orchestrator
        .run_with(&request.input, request.options.run_options())
        .await?;

    tracing::info!(
        facts = report.aggregate.facts_count,
        score = report.aggregate.score,
        duration_ms = report.meta.duration_ms,
        "Fact check served"
    );

    Ok(Json(CheckResponse::from_report(
        report,
        request.options.return_sources,
    )))
}

fn validation_error(errors: ValidationErrors) -> AppError {
    AppError::Validation {
        field: first_invalid_field(&errors, None),
        message: errors.to_string(),
    }
}

/// Dotted path of the first failing field, descending into nested structs
fn first_invalid_field(errors: &ValidationErrors, prefix: Option<&str>) -> Option<String> {
    let (name, kind) = errors.errors().iter().next()?;
    let path = match prefix {
        Some(prefix) => format!("{prefix}.{name}"),
        None => name.to_string(),
    };

    match kind {
        ValidationErrorsKind::Struct(inner) => {
            first_invalid_field(inner, Some(&path)).or(Some(path))
        }
        _ => Some(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factcheck_common::{AggregateResult, Claim, ReportMeta, Source};

    #[test]
    fn test_request_accepts_text_alias_and_defaults() {
        let request: CheckRequest = serde_json::from_str(r#"{"text": "Paris is in France."}"#).unwrap();
        assert_eq!(request.input, "Paris is in France.");
        assert!(request.options.return_sources);
        assert_eq!(request.options.run_options(), RunOptions::default());
    }

    #[test]
    fn test_options_map_to_run_overrides() {
        let request: CheckRequest = serde_json::from_str(
            r#"{"input": "x", "options": {"maxFacts": 3, "deadlineMs": 1500,
                "maxConcurrency": 4, "scoreDefaultOnFailure": 0.2, "returnSources": false}}"#,
        )
        .unwrap();

        let options = request.options.run_options();
        assert_eq!(options.max_facts, Some(3));
        assert_eq!(options.deadline, Some(Duration::from_millis(1500)));
        assert_eq!(options.max_concurrency, Some(4));
        assert_eq!(options.score_default_on_failure, Some(0.2));
        assert!(!request.options.return_sources);
    }

    #[test]
    fn test_deadline_beyond_request_timeout_is_rejected() {
        let options = CheckOptions {
            deadline_ms: Some(120_000),
            ..CheckOptions::default()
        };
        let max = Duration::from_secs(89);

        match options.check_deadline(max).unwrap_err() {
            AppError::Validation { field, message } => {
                assert_eq!(field.as_deref(), Some("options.deadlineMs"));
                assert!(message.contains("89000ms"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let options = CheckOptions {
            deadline_ms: Some(89_000),
            ..CheckOptions::default()
        };
        assert!(options.check_deadline(max).is_ok());
        assert!(CheckOptions::default().check_deadline(max).is_ok());
    }

    #[test]
    fn test_nested_validation_reports_field_path() {
        let request: CheckRequest =
            serde_json::from_str(r#"{"input": "x", "options": {"maxFacts": 500}}"#).unwrap();
        let err = validation_error(request.validate().unwrap_err());

        match err {
            AppError::Validation { field, .. } => {
                assert!(field.unwrap().starts_with("options."));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_response_keeps_wire_contract() {
        let report = Report {
            facts: vec![ClaimResult {
                claim: Claim::new(0, "The Eiffel Tower is in Paris."),
                sources_checked: 2,
                sources: vec![Source {
                    url: "https://www.britannica.com/topic/Eiffel-Tower".into(),
                    judgement: 0.9,
                    excerpt: "In Paris".into(),
                    publication_date: None,
                }],
                score: 0.95,
                reasoning: "Confirmed.".into(),
                failed: false,
                failure_note: None,
            }],
            aggregate: AggregateResult {
                score: 0.95,
                facts_count: 1,
                most_uncertain_index: Some(0),
            },
            meta: ReportMeta {
                duration_ms: 12,
                engine: "autonomy-fact-checker".into(),
                notes: "All claims were researched successfully.".into(),
                version: None,
            },
        };

        let json = serde_json::to_value(CheckResponse::from_report(report.clone(), true)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "facts": [{
                    "text": "The Eiffel Tower is in Paris.",
                    "sourcesChecked": 2,
                    "sources": [{
                        "url": "https://www.britannica.com/topic/Eiffel-Tower",
                        "judgement": 0.9,
                        "excerpt": "In Paris"
                    }],
                    "score": 0.95,
                    "reasoning": "Confirmed."
                }],
                "aggregate": { "score": 0.95, "factsCount": 1 },
                "meta": {
                    "durationMs": 12,
                    "engine": "autonomy-fact-checker",
                    "notes": "All claims were researched successfully."
                }
            })
        );

        let json = serde_json::to_value(CheckResponse::from_report(report, false)).unwrap();
        assert!(json["facts"][0].get("sources").is_none());
    }
}
