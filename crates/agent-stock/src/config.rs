//! Configuration for market data retrieval and the signal pipeline

use crate::error::{Result, StockError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable holding the Financial Datasets API key
pub const FINANCIAL_DATASETS_API_KEY_ENV: &str = "FINANCIAL_DATASETS_API_KEY";

const DEFAULT_FINANCIAL_DATASETS_URL: &str = "https://api.financialdatasets.ai";
const DEFAULT_YAHOO_URL: &str = "https://query2.finance.yahoo.com";
const DEFAULT_YAHOO_COOKIE_URL: &str = "https://fc.yahoo.com";

/// Upstream data provider
///
/// Yahoo Finance is the primary source: it needs no key and is where failed
/// requests against the secondary source fall back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Yahoo Finance (primary, no API key required)
    #[default]
    #[serde(alias = "primary")]
    Yahoo,
    /// Financial Datasets API (secondary, requires API key)
    #[serde(
        alias = "secondary",
        alias = "financial_datasets",
        alias = "financial-datasets"
    )]
    FinancialDatasets,
}

impl DataSource {
    /// The source every fallback lands on
    pub const PRIMARY: DataSource = DataSource::Yahoo;

    pub fn is_primary(self) -> bool {
        self == Self::PRIMARY
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataSource::Yahoo => "yahoo",
            DataSource::FinancialDatasets => "financialdatasets",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSource {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yahoo" | "primary" => Ok(DataSource::Yahoo),
            "financialdatasets" | "financial_datasets" | "financial-datasets" | "secondary" => {
                Ok(DataSource::FinancialDatasets)
            }
            other => Err(StockError::ConfigError(format!(
                "Unknown data source '{other}' (expected yahoo/primary or financialdatasets/secondary)"
            ))),
        }
    }
}

/// Reporting period for financial statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportPeriod {
    /// Trailing twelve months
    #[default]
    Ttm,
    Annual,
    Quarterly,
}

impl ReportPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportPeriod::Ttm => "ttm",
            ReportPeriod::Annual => "annual",
            ReportPeriod::Quarterly => "quarterly",
        }
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for market data retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockConfig {
    /// Source used when the run does not select one
    pub data_source: DataSource,

    /// Financial Datasets API key (optional)
    pub financial_datasets_api_key: Option<String>,

    /// Financial Datasets API base URL
    pub financial_datasets_base_url: String,

    /// Yahoo Finance JSON API base URL
    pub yahoo_base_url: String,

    /// Page that hands out the Yahoo session cookie
    pub yahoo_cookie_url: String,

    /// Request timeout duration
    pub request_timeout: Duration,

    /// Maximum Financial Datasets requests per minute
    pub rate_limit_per_minute: u32,

    /// Period for metrics and line items
    pub report_period: ReportPeriod,

    /// Number of metric records to request
    pub metrics_limit: usize,

    /// Number of insider trades to request
    pub insider_trade_limit: usize,

    /// Line items requested for the fundamentals stage
    pub line_items: Vec<String>,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            data_source: DataSource::Yahoo,
            financial_datasets_api_key: None,
            financial_datasets_base_url: DEFAULT_FINANCIAL_DATASETS_URL.to_string(),
            yahoo_base_url: DEFAULT_YAHOO_URL.to_string(),
            yahoo_cookie_url: DEFAULT_YAHOO_COOKIE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            rate_limit_per_minute: 60,
            report_period: ReportPeriod::Ttm,
            metrics_limit: 1,
            insider_trade_limit: 5,
            line_items: vec!["free_cash_flow".to_string()],
        }
    }
}

impl StockConfig {
    /// Create a new configuration builder
    pub fn builder() -> StockConfigBuilder {
        StockConfigBuilder::default()
    }

    /// Load the Financial Datasets API key from the environment
    pub fn with_env_api_key(mut self) -> Self {
        if let Ok(key) = std::env::var(FINANCIAL_DATASETS_API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.financial_datasets_api_key = Some(key);
            }
        }
        self
    }

    /// Validate the configuration
    ///
    /// A missing API key is not an error: requests to the secondary source
    /// then fail and fall back to the primary one.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit_per_minute == 0 {
            return Err(StockError::ConfigError(
                "rate_limit_per_minute must be greater than 0".to_string(),
            ));
        }

        if self.metrics_limit == 0 || self.insider_trade_limit == 0 {
            return Err(StockError::ConfigError(
                "metrics_limit and insider_trade_limit must be greater than 0".to_string(),
            ));
        }

        if self.line_items.is_empty() {
            return Err(StockError::ConfigError(
                "at least one line item must be requested".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(StockError::ConfigError(
                "request_timeout must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for StockConfig
#[derive(Debug, Default)]
pub struct StockConfigBuilder {
    data_source: Option<DataSource>,
    financial_datasets_api_key: Option<String>,
    financial_datasets_base_url: Option<String>,
    yahoo_base_url: Option<String>,
    yahoo_cookie_url: Option<String>,
    request_timeout: Option<Duration>,
    rate_limit_per_minute: Option<u32>,
    report_period: Option<ReportPeriod>,
    metrics_limit: Option<usize>,
    insider_trade_limit: Option<usize>,
    line_items: Option<Vec<String>>,
}

impl StockConfigBuilder {
    /// Set the default data source
    pub fn data_source(mut self, source: DataSource) -> Self {
        self.data_source = Some(source);
        self
    }

    /// Set the Financial Datasets API key
    pub fn financial_datasets_api_key(mut self, key: impl Into<String>) -> Self {
        self.financial_datasets_api_key = Some(key.into());
        self
    }

    /// Load the Financial Datasets API key from the environment
    pub fn with_env_api_key(mut self) -> Self {
        if let Ok(key) = std::env::var(FINANCIAL_DATASETS_API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.financial_datasets_api_key = Some(key);
            }
        }
        self
    }

    pub fn financial_datasets_base_url(mut self, url: impl Into<String>) -> Self {
        self.financial_datasets_base_url = Some(url.into());
        self
    }

    pub fn yahoo_base_url(mut self, url: impl Into<String>) -> Self {
        self.yahoo_base_url = Some(url.into());
        self
    }

    pub fn yahoo_cookie_url(mut self, url: impl Into<String>) -> Self {
        self.yahoo_cookie_url = Some(url.into());
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    pub fn rate_limit_per_minute(mut self, limit: u32) -> Self {
        self.rate_limit_per_minute = Some(limit);
        self
    }

    pub fn report_period(mut self, period: ReportPeriod) -> Self {
        self.report_period = Some(period);
        self
    }

    pub fn metrics_limit(mut self, limit: usize) -> Self {
        self.metrics_limit = Some(limit);
        self
    }

    pub fn insider_trade_limit(mut self, limit: usize) -> Self {
        self.insider_trade_limit = Some(limit);
        self
    }

    pub fn line_items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.line_items = Some(items.into_iter().map(Into::into).collect());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<StockConfig> {
        let defaults = StockConfig::default();

        let config = StockConfig {
            data_source: self.data_source.unwrap_or(defaults.data_source),
            financial_datasets_api_key: self.financial_datasets_api_key,
            financial_datasets_base_url: self
                .financial_datasets_base_url
                .unwrap_or(defaults.financial_datasets_base_url),
            yahoo_base_url: self.yahoo_base_url.unwrap_or(defaults.yahoo_base_url),
            yahoo_cookie_url: self.yahoo_cookie_url.unwrap_or(defaults.yahoo_cookie_url),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            rate_limit_per_minute: self
                .rate_limit_per_minute
                .unwrap_or(defaults.rate_limit_per_minute),
            report_period: self.report_period.unwrap_or(defaults.report_period),
            metrics_limit: self.metrics_limit.unwrap_or(defaults.metrics_limit),
            insider_trade_limit: self
                .insider_trade_limit
                .unwrap_or(defaults.insider_trade_limit),
            line_items: self.line_items.unwrap_or(defaults.line_items),
        };

        config.validate()?;
        Ok(config)
    }
}
