//! Fact Checker Common Library
//!
//! Shared code for the fact-check engine and its HTTP gateway:
//! - Report data model (claims, sources, per-claim results, aggregate)
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, CheckError, ReasoningError, ResearchError, Result};
pub use models::{AggregateResult, Claim, ClaimResult, Report, ReportMeta, Source};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine identity reported in every report
pub const ENGINE_NAME: &str = "autonomy-fact-checker";
