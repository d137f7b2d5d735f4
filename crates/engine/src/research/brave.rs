//! Brave Search web API client
//!
//! Every call is independent: the client keeps no quota or pacing state
//! between searches. Upstream load is bounded by the engine's research
//! call limit.

use super::{RawCandidate, ResearchGateway};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use factcheck_common::config::ResearchConfig;
use factcheck_common::errors::{AppError, ResearchError, Result};
use regex_lite::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::Instant;

const DEFAULT_API_BASE: &str = "https://api.search.brave.com";

#[derive(Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Deserialize)]
struct BraveResult {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    page_age: Option<String>,
}

/// Brave Search client
pub struct BraveSearch {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    count: usize,
}

impl BraveSearch {
    /// Create a new Brave Search client
    pub fn new(config: &ResearchConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "research.api_key is required for the brave provider".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("factcheck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            count: config.results_per_query.clamp(1, 20),
        })
    }

    async fn request(
        &self,
        query: &str,
        remaining: Duration,
    ) -> std::result::Result<BraveResponse, ResearchError> {
        let url = format!("{}/res/v1/web/search", self.base_url.trim_end_matches('/'));
        let count = self.count.to_string();

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", query), ("count", count.as_str())])
            .timeout(remaining)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ResearchError::Timeout {
                        after_ms: remaining.as_millis() as u64,
                    }
                } else {
                    ResearchError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(ResearchError::Status {
                status: response.status().as_u16(),
            });
        }

        response
            .json::<BraveResponse>()
            .await
            .map_err(|e| ResearchError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ResearchGateway for BraveSearch {
    async fn search(
        &self,
        query: &str,
        deadline: Instant,
    ) -> std::result::Result<Vec<RawCandidate>, ResearchError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ResearchError::BudgetExhausted);
        }

        let body = self.request(query, remaining).await?;
        let candidates = into_candidates(body);

        if candidates.is_empty() {
            return Err(ResearchError::Empty);
        }

        tracing::debug!(query = %query, results = candidates.len(), "Brave search completed");
        Ok(candidates)
    }

    fn provider(&self) -> &str {
        "brave"
    }
}

fn into_candidates(body: BraveResponse) -> Vec<RawCandidate> {
    body.web
        .map(|w| w.results)
        .unwrap_or_default()
        .into_iter()
        .filter(|r| !r.url.trim().is_empty())
        .map(|r| RawCandidate {
            excerpt: strip_markup(&r.description),
            title: strip_markup(&r.title),
            published: r.page_age.as_deref().and_then(parse_page_age),
            url: r.url,
        })
        .collect()
}

/// Brave highlights query terms with inline tags
fn strip_markup(text: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"</?[a-zA-Z][^>]*>").expect("valid tag pattern"));
    tags.replace_all(text, "").trim().to_string()
}

fn parse_page_age(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|n| n.and_utc())
        })
}
