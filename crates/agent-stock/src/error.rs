//! Error types for stock data and analysis operations

use crate::config::DataSource;
use thiserror::Error;

/// Stock data and analysis errors
#[derive(Debug, Error)]
pub enum StockError {
    /// Upstream provider failed (non-success status, provider-reported error)
    #[error("{provider} error: {reason}")]
    Upstream {
        provider: DataSource,
        reason: String,
    },

    /// A successful response carried none of the required data
    #[error("{provider} returned no {what} for {ticker}")]
    EmptyPayload {
        provider: DataSource,
        what: String,
        ticker: String,
    },

    /// Invalid stock symbol provided
    #[error("Invalid ticker: {0}")]
    InvalidTicker(String),

    /// Invalid or inconsistent date input
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Numeric failure inside a scoring computation
    #[error("Computation error: {0}")]
    Computation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// State or pipeline error
    #[error(transparent)]
    Pipeline(#[from] agent_core::Error),
}

impl StockError {
    pub(crate) fn upstream(provider: DataSource, reason: impl Into<String>) -> Self {
        StockError::Upstream {
            provider,
            reason: reason.into(),
        }
    }

    pub(crate) fn empty(provider: DataSource, what: impl Into<String>, ticker: &str) -> Self {
        StockError::EmptyPayload {
            provider,
            what: what.into(),
            ticker: ticker.to_string(),
        }
    }

    /// Name `provider` in errors that do not already carry one
    pub(crate) fn with_provider(self, provider: DataSource) -> Self {
        match self {
            err @ (StockError::NetworkError(_)
            | StockError::JsonError(_)
            | StockError::ConfigError(_)) => StockError::upstream(provider, err.to_string()),
            other => other,
        }
    }

    /// Bad caller input; retrying against another provider cannot help
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            StockError::InvalidTicker(_)
                | StockError::InvalidDate(_)
                | StockError::Pipeline(_)
        )
    }
}

/// Result type alias for stock operations
pub type Result<T> = std::result::Result<T, StockError>;

/// Convert StockError to agent_core::Error
impl From<StockError> for agent_core::Error {
    fn from(err: StockError) -> Self {
        match err {
            StockError::Pipeline(inner) => inner,
            other => agent_core::Error::Generic(other.to_string()),
        }
    }
}
