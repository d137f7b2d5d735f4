//! Fact-check data model
//!
//! Claims flow in from extraction, results flow out per claim, and the
//! report is the single value handed back to callers.

mod claim;
mod report;

pub use claim::{Claim, ClaimResult, Source};
pub use report::{AggregateResult, Report, ReportMeta};
