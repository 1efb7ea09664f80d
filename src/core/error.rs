//! Error kinds surfaced by the rate oracle and its providers

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OracleError {
    /// A single upstream feed failed or returned data we could not use.
    #[error("{provider} unavailable: {reason}")]
    UpstreamUnavailable {
        provider: &'static str,
        reason: String,
    },

    /// No path (fresh cache, live feeds, stale cache) produced a rate.
    #[error("Cannot determine current rate")]
    RateUnavailable,
}

impl OracleError {
    pub fn upstream(provider: &'static str, reason: impl Into<String>) -> Self {
        OracleError::UpstreamUnavailable {
            provider,
            reason: reason.into(),
        }
    }
}
