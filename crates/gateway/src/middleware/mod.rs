//! HTTP middleware

pub mod access_log;
pub mod rate_limit;
