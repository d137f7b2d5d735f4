//! Configuration management for the fact checker
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values
//!
//! Configuration is loaded once at startup and never mutated afterwards.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard ceiling on claims processed per run
pub const MAX_FACTS_LIMIT: usize = 100;

/// Time kept between a run's deadline and the HTTP request timeout, enough
/// to cancel outstanding work and serialize the report
pub const RESPONSE_HEADROOM: Duration = Duration::from_secs(1);

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Orchestration settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Web search backend
    #[serde(default)]
    pub research: ResearchConfig,

    /// Reasoning backend used for decomposition and scoring
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// Domain deny/allow lists
    #[serde(default)]
    pub filter: FilterConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds; must exceed `engine.deadline_ms` by at
    /// least `RESPONSE_HEADROOM`
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Overall deadline for one run in milliseconds
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,

    /// Maximum claims evaluated at once within a run (unbounded when unset)
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// System-wide cap on simultaneous research calls
    #[serde(default = "default_max_research_calls")]
    pub max_research_calls: usize,

    /// Score substituted for claims that could not be evaluated
    #[serde(default)]
    pub score_default_on_failure: f64,

    /// Floor for the per-claim time budget in milliseconds
    #[serde(default = "default_min_claim_budget_ms")]
    pub min_claim_budget_ms: u64,

    /// Search queries issued per claim (original text plus rephrasings)
    #[serde(default = "default_queries_per_claim")]
    pub queries_per_claim: usize,

    /// Maximum claims kept from extraction
    #[serde(default = "default_max_facts")]
    pub max_facts: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResearchConfig {
    /// Search provider: brave, mock
    #[serde(default = "default_research_provider")]
    pub provider: String,

    /// API key for the search provider
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Candidates requested per query
    #[serde(default = "default_results_per_query")]
    pub results_per_query: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_research_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReasoningConfig {
    /// Reasoning provider: openai, heuristic
    #[serde(default = "default_reasoning_provider")]
    pub provider: String,

    /// API key for the reasoning provider
    pub api_key: Option<String>,

    /// API base URL (any OpenAI-compatible endpoint)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_reasoning_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_reasoning_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilterConfig {
    /// Domains whose sources are always rejected
    #[serde(default = "default_deny_list")]
    pub deny: Vec<String>,

    /// Domains treated as trusted
    #[serde(default)]
    pub allow: Vec<String>,

    /// Reject every domain not on the allow list
    #[serde(default)]
    pub allow_only: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_request_timeout() -> u64 { 90 }
fn default_max_concurrent() -> usize { 64 }
fn default_max_body_bytes() -> usize { 1024 * 1024 }
fn default_deadline_ms() -> u64 { 60_000 }
fn default_max_research_calls() -> usize { 32 }
fn default_min_claim_budget_ms() -> u64 { 2_000 }
fn default_queries_per_claim() -> usize { 2 }
fn default_max_facts() -> usize { 50 }
fn default_research_provider() -> String { "brave".to_string() }
fn default_results_per_query() -> usize { 5 }
fn default_research_timeout() -> u64 { 15 }
fn default_reasoning_provider() -> String { "openai".to_string() }
fn default_reasoning_model() -> String { "gpt-4o-mini".to_string() }
fn default_reasoning_timeout() -> u64 { 30 }
fn default_deny_list() -> Vec<String> {
    ["*.blogspot.com", "*.pinterest.com", "*.quora.com", "*.tiktok.com"]
        .iter()
        .map(|d| d.to_string())
        .collect()
}
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "factcheck".to_string() }
fn default_rate_limit() -> u32 { 10 }
fn default_burst() -> u32 { 20 }
fn default_enabled() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_concurrent_requests: default_max_concurrent(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline_ms(),
            max_concurrency: None,
            max_research_calls: default_max_research_calls(),
            score_default_on_failure: 0.0,
            min_claim_budget_ms: default_min_claim_budget_ms(),
            queries_per_claim: default_queries_per_claim(),
            max_facts: default_max_facts(),
        }
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            provider: default_research_provider(),
            api_key: None,
            api_base: None,
            results_per_query: default_results_per_query(),
            timeout_secs: default_research_timeout(),
        }
    }
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            provider: default_reasoning_provider(),
            api_key: None,
            api_base: None,
            model: default_reasoning_model(),
            timeout_secs: default_reasoning_timeout(),
            temperature: 0.0,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            deny: default_deny_list(),
            allow: Vec::new(),
            allow_only: false,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            engine: EngineConfig::default(),
            research: ResearchConfig::default(),
            reasoning: ReasoningConfig::default(),
            filter: FilterConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__ENGINE__DEADLINE_MS=20000
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("filter.deny")
                    .with_list_parse_key("filter.allow")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot honour
    pub fn validate(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;

        if !(0.0..=1.0).contains(&engine.score_default_on_failure) {
            return Err(ConfigError::Message(format!(
                "engine.score_default_on_failure must be within [0, 1], got {}",
                engine.score_default_on_failure
            )));
        }
        if engine.max_facts == 0 || engine.max_facts > MAX_FACTS_LIMIT {
            return Err(ConfigError::Message(format!(
                "engine.max_facts must be within 1..={MAX_FACTS_LIMIT}, got {}",
                engine.max_facts
            )));
        }
        if engine.max_concurrency == Some(0) || engine.max_research_calls == 0 {
            return Err(ConfigError::Message(
                "engine concurrency limits must be positive".to_string(),
            ));
        }
        if engine.queries_per_claim == 0 {
            return Err(ConfigError::Message(
                "engine.queries_per_claim must be at least 1".to_string(),
            ));
        }
        if engine.deadline_ms == 0 || self.deadline() > self.max_run_deadline() {
            return Err(ConfigError::Message(format!(
                "engine.deadline_ms ({}) must be positive and at least {}ms below server.request_timeout_secs ({}s)",
                engine.deadline_ms,
                RESPONSE_HEADROOM.as_millis(),
                self.server.request_timeout_secs
            )));
        }

        Ok(())
    }

    /// Get the run deadline as Duration
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.engine.deadline_ms)
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Longest run deadline that still answers before the request timeout
    pub fn max_run_deadline(&self) -> Duration {
        self.request_timeout().saturating_sub(RESPONSE_HEADROOM)
    }
}
