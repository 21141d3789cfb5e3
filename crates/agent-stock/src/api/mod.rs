//! Upstream market data providers
//!
//! Each provider implements [`DataSourceAdapter`] and normalizes its payloads
//! into the records in [`crate::models`]. Adapters return `Ok(vec![])` when
//! the upstream simply has nothing to report for optional data (insider
//! trades, line items) and an error for anything that actually failed.

pub mod financial_datasets;
pub mod yahoo;

pub use financial_datasets::FinancialDatasetsClient;
pub use yahoo::YahooFinanceClient;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::config::{DataSource, ReportPeriod};
use crate::error::Result;
use crate::models::{FinancialMetrics, InsiderTrade, LineItemResult, PriceBar};

/// Per-provider fetch operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataSourceAdapter: Send + Sync {
    /// Which provider this adapter talks to
    fn source(&self) -> DataSource;

    /// Daily bars between `start_date` and `end_date`, inclusive
    async fn get_prices(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>>;

    /// Financial ratios reported on or before `report_period`
    async fn get_financial_metrics(
        &self,
        ticker: &str,
        report_period: NaiveDate,
        period: ReportPeriod,
        limit: usize,
    ) -> Result<Vec<FinancialMetrics>>;

    /// Most recent insider trades up to `end_date`
    async fn get_insider_trades(
        &self,
        ticker: &str,
        end_date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<InsiderTrade>>;

    /// Current market capitalization
    async fn get_market_cap(&self, ticker: &str) -> Result<f64>;

    /// Named financial statement line items
    async fn search_line_items(
        &self,
        ticker: &str,
        line_items: &[String],
        period: ReportPeriod,
        limit: usize,
    ) -> Result<Vec<LineItemResult>>;
}
