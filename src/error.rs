//! Error handling for cotas
//!
//! Every fallible operation returns [`Result`], whose error side is
//! [`FundsError`]. Transport failures keep their own [`TransportError`] so
//! callers can tell an incorrect proxy apart from a period with no data.

use thiserror::Error;

/// Outcome of a single HTTP request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("incorrect proxy: proxy authentication required (HTTP 407) for {url}")]
    ProxyAuthRequired { url: String },

    #[error("no data available for this period (HTTP 404): {url}")]
    NotFound { url: String },

    #[error("request timed out: {url}")]
    Timeout { url: String },

    #[error("unexpected HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("request failed: {0}")]
    Unknown(String),
}

/// Core error type for fund retrieval and analysis
#[derive(Error, Debug)]
pub enum FundsError {
    #[error("benchmark not found: {name}")]
    UnknownBenchmark { name: String },

    #[error("fund class not found: {classes:?}")]
    UnknownClass { classes: Vec<String> },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("no data available: {0}")]
    NoData(String),

    #[error("io error")]
    Io(#[from] std::io::Error),
}

impl FundsError {
    /// True for errors caused by caller-supplied configuration (raised
    /// before any network call).
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            FundsError::UnknownBenchmark { .. }
                | FundsError::UnknownClass { .. }
                | FundsError::InvalidParameter(_)
        )
    }

    pub(crate) fn parse(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        FundsError::Parse(format!("{}: {}", context, err))
    }
}

/// Result type alias for fund operations
pub type Result<T> = std::result::Result<T, FundsError>;
