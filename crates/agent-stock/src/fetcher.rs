//! Unified data access with fallback to the primary source
//!
//! Every operation calls the adapter for the selected [`DataSource`]. When
//! the selected source is the secondary one and the call fails (or returns
//! no data where data is required), a [`FallbackNotice`] is emitted and the
//! operation is retried once against the primary source. Failures from the
//! primary source are logged and returned, always naming the source.

use chrono::NaiveDate;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::api::{DataSourceAdapter, FinancialDatasetsClient, YahooFinanceClient};
use crate::config::{DataSource, ReportPeriod, StockConfig};
use crate::error::{Result, StockError};
use crate::models::{FinancialMetrics, InsiderTrade, LineItemResult, PriceBar};

/// Callback invoked for every fallback
pub type FallbackListener = Arc<dyn Fn(&FallbackNotice) + Send + Sync>;

/// What was being fetched when a fallback happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOperation {
    Prices,
    FinancialMetrics,
    InsiderTrades,
    MarketCap,
    LineItems,
    /// The market data stage as a whole
    MarketData,
}

impl FetchOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchOperation::Prices => "prices",
            FetchOperation::FinancialMetrics => "financial metrics",
            FetchOperation::InsiderTrades => "insider trades",
            FetchOperation::MarketCap => "market cap",
            FetchOperation::LineItems => "line items",
            FetchOperation::MarketData => "market data",
        }
    }
}

impl fmt::Display for FetchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic emitted before retrying against the primary source
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackNotice {
    pub from: DataSource,
    pub to: DataSource,
    pub operation: FetchOperation,
    pub ticker: String,
    pub reason: String,
}

impl fmt::Display for FallbackNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} for {} failed: {}. Falling back to {}",
            self.from, self.operation, self.ticker, self.reason, self.to
        )
    }
}

/// Source-agnostic fetcher over a primary and a secondary adapter
#[derive(Clone)]
pub struct UnifiedFetcher {
    primary: Arc<dyn DataSourceAdapter>,
    secondary: Arc<dyn DataSourceAdapter>,
    listener: Option<FallbackListener>,
}

impl UnifiedFetcher {
    pub fn new(primary: Arc<dyn DataSourceAdapter>, secondary: Arc<dyn DataSourceAdapter>) -> Self {
        Self {
            primary,
            secondary,
            listener: None,
        }
    }

    /// Build both HTTP clients from the configuration
    pub fn from_config(config: &StockConfig) -> Result<Self> {
        config.validate()?;
        let primary = YahooFinanceClient::from_config(config)?;
        let secondary = FinancialDatasetsClient::from_config(config)?;
        Ok(Self::new(Arc::new(primary), Arc::new(secondary)))
    }

    /// Register a callback that observes every fallback
    pub fn with_listener(mut self, listener: FallbackListener) -> Self {
        self.listener = Some(listener);
        self
    }

    fn adapter(&self, source: DataSource) -> &dyn DataSourceAdapter {
        if source.is_primary() {
            self.primary.as_ref()
        } else {
            self.secondary.as_ref()
        }
    }

    /// Log a fallback and hand it to the listener
    pub fn notify(&self, notice: &FallbackNotice) {
        warn!(
            from = %notice.from,
            to = %notice.to,
            operation = %notice.operation,
            ticker = %notice.ticker,
            "{}",
            notice
        );
        if let Some(listener) = &self.listener {
            listener(notice);
        }
    }

    /// Decide what to do after `source` failed
    ///
    /// Returns the primary adapter for a retry, or the error itself when the
    /// primary source was the one that failed.
    fn fallback(
        &self,
        source: DataSource,
        operation: FetchOperation,
        ticker: &str,
        err: StockError,
    ) -> Result<&dyn DataSourceAdapter> {
        if source.is_primary() {
            return Err(self.abort(source, operation, ticker, err));
        }

        self.notify(&FallbackNotice {
            from: source,
            to: DataSource::PRIMARY,
            operation,
            ticker: ticker.to_string(),
            reason: err.to_string(),
        });
        Ok(self.primary.as_ref())
    }

    /// Log a failure that ends the operation
    fn abort(
        &self,
        source: DataSource,
        operation: FetchOperation,
        ticker: &str,
        err: StockError,
    ) -> StockError {
        let err = err.with_provider(source);
        warn!(
            source = %source,
            operation = %operation,
            ticker = %ticker,
            "{source} {operation} for {ticker} failed, no fallback left: {err}"
        );
        err
    }

    pub async fn get_prices(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        source: DataSource,
    ) -> Result<Vec<PriceBar>> {
        validate_ticker(ticker)?;
        if start_date > end_date {
            return Err(StockError::InvalidDate(format!(
                "start date {start_date} is after end date {end_date}"
            )));
        }

        let err = match self
            .adapter(source)
            .get_prices(ticker, start_date, end_date)
            .await
            .and_then(|bars| require_non_empty(bars, source, "price data", ticker))
        {
            Ok(bars) => return Ok(bars),
            Err(e) => e,
        };

        self.fallback(source, FetchOperation::Prices, ticker, err)?
            .get_prices(ticker, start_date, end_date)
            .await
            .and_then(|bars| require_non_empty(bars, DataSource::PRIMARY, "price data", ticker))
            .map_err(|e| self.abort(DataSource::PRIMARY, FetchOperation::Prices, ticker, e))
    }

    pub async fn get_financial_metrics(
        &self,
        ticker: &str,
        report_period: NaiveDate,
        period: ReportPeriod,
        limit: usize,
        source: DataSource,
    ) -> Result<Vec<FinancialMetrics>> {
        validate_ticker(ticker)?;

        let err = match self
            .adapter(source)
            .get_financial_metrics(ticker, report_period, period, limit)
            .await
            .and_then(|metrics| require_non_empty(metrics, source, "financial metrics", ticker))
        {
            Ok(metrics) => return Ok(metrics),
            Err(e) => e,
        };

        self.fallback(source, FetchOperation::FinancialMetrics, ticker, err)?
            .get_financial_metrics(ticker, report_period, period, limit)
            .await
            .and_then(|metrics| {
                require_non_empty(metrics, DataSource::PRIMARY, "financial metrics", ticker)
            })
            .map_err(|e| {
                self.abort(DataSource::PRIMARY, FetchOperation::FinancialMetrics, ticker, e)
            })
    }

    /// Insider trades; an empty list is a valid answer
    pub async fn get_insider_trades(
        &self,
        ticker: &str,
        end_date: NaiveDate,
        limit: usize,
        source: DataSource,
    ) -> Result<Vec<InsiderTrade>> {
        validate_ticker(ticker)?;

        let err = match self
            .adapter(source)
            .get_insider_trades(ticker, end_date, limit)
            .await
        {
            Ok(trades) => return Ok(trades),
            Err(e) => e,
        };

        self.fallback(source, FetchOperation::InsiderTrades, ticker, err)?
            .get_insider_trades(ticker, end_date, limit)
            .await
            .map_err(|e| self.abort(DataSource::PRIMARY, FetchOperation::InsiderTrades, ticker, e))
    }

    pub async fn get_market_cap(&self, ticker: &str, source: DataSource) -> Result<f64> {
        validate_ticker(ticker)?;

        let err = match self.adapter(source).get_market_cap(ticker).await {
            Ok(market_cap) => return Ok(market_cap),
            Err(e) => e,
        };

        self.fallback(source, FetchOperation::MarketCap, ticker, err)?
            .get_market_cap(ticker)
            .await
            .map_err(|e| self.abort(DataSource::PRIMARY, FetchOperation::MarketCap, ticker, e))
    }

    /// Line items; an empty list is a valid answer
    pub async fn search_line_items(
        &self,
        ticker: &str,
        line_items: &[String],
        period: ReportPeriod,
        limit: usize,
        source: DataSource,
    ) -> Result<Vec<LineItemResult>> {
        validate_ticker(ticker)?;

        let err = match self
            .adapter(source)
            .search_line_items(ticker, line_items, period, limit)
            .await
        {
            Ok(items) => return Ok(items),
            Err(e) => e,
        };

        self.fallback(source, FetchOperation::LineItems, ticker, err)?
            .search_line_items(ticker, line_items, period, limit)
            .await
            .map_err(|e| self.abort(DataSource::PRIMARY, FetchOperation::LineItems, ticker, e))
    }
}

fn validate_ticker(ticker: &str) -> Result<()> {
    if ticker.trim().is_empty() {
        return Err(StockError::InvalidTicker(ticker.to_string()));
    }
    Ok(())
}

fn require_non_empty<T>(
    items: Vec<T>,
    source: DataSource,
    what: &str,
    ticker: &str,
) -> Result<Vec<T>> {
    if items.is_empty() {
        return Err(StockError::empty(source, what, ticker));
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockDataSourceAdapter;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bars() -> Vec<PriceBar> {
        vec![
            PriceBar {
                date: date(2024, 1, 2),
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: 1.5,
                volume: 100.0,
            },
            PriceBar {
                date: date(2024, 1, 3),
                open: 1.5,
                high: 2.5,
                low: 1.0,
                close: 2.0,
                volume: 200.0,
            },
        ]
    }

    fn recording_fetcher(
        primary: MockDataSourceAdapter,
        secondary: MockDataSourceAdapter,
    ) -> (UnifiedFetcher, Arc<Mutex<Vec<FallbackNotice>>>) {
        let notices = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&notices);
        let fetcher = UnifiedFetcher::new(Arc::new(primary), Arc::new(secondary))
            .with_listener(Arc::new(move |notice: &FallbackNotice| {
                sink.lock().unwrap().push(notice.clone());
            }));
        (fetcher, notices)
    }

    #[tokio::test]
    async fn test_secondary_failure_falls_back_once() {
        let mut primary = MockDataSourceAdapter::new();
        primary
            .expect_get_prices()
            .times(1)
            .returning(|_, _, _| Ok(bars()));

        let mut secondary = MockDataSourceAdapter::new();
        secondary.expect_get_prices().times(1).returning(|_, _, _| {
            Err(StockError::upstream(DataSource::FinancialDatasets, "HTTP 500"))
        });

        let (fetcher, notices) = recording_fetcher(primary, secondary);
        let result = fetcher
            .get_prices("AAPL", date(2024, 1, 1), date(2024, 1, 5), DataSource::FinancialDatasets)
            .await
            .unwrap();

        assert_eq!(result, bars());
        let notices = notices.lock().unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].from, DataSource::FinancialDatasets);
        assert_eq!(notices[0].to, DataSource::Yahoo);
        assert_eq!(notices[0].operation, FetchOperation::Prices);
        assert!(notices[0].reason.contains("HTTP 500"));
    }

    #[tokio::test]
    async fn test_primary_failure_propagates_without_retry() {
        let mut primary = MockDataSourceAdapter::new();
        primary
            .expect_get_market_cap()
            .times(1)
            .returning(|ticker| Err(StockError::empty(DataSource::Yahoo, "market cap", ticker)));

        let mut secondary = MockDataSourceAdapter::new();
        secondary.expect_get_market_cap().never();

        let (fetcher, notices) = recording_fetcher(primary, secondary);
        let err = fetcher
            .get_market_cap("AAPL", DataSource::Yahoo)
            .await
            .unwrap_err();

        assert!(matches!(err, StockError::EmptyPayload { .. }));
        assert!(notices.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_both_sources_failing_propagates_primary_error() {
        let mut primary = MockDataSourceAdapter::new();
        primary
            .expect_get_financial_metrics()
            .times(1)
            .returning(|_, _, _, _| Err(StockError::upstream(DataSource::Yahoo, "HTTP 503")));

        let mut secondary = MockDataSourceAdapter::new();
        secondary
            .expect_get_financial_metrics()
            .times(1)
            .returning(|_, _, _, _| Err(StockError::ConfigError("no key".into())));

        let (fetcher, notices) = recording_fetcher(primary, secondary);
        let err = fetcher
            .get_financial_metrics(
                "AAPL",
                date(2024, 1, 5),
                ReportPeriod::Ttm,
                1,
                DataSource::FinancialDatasets,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StockError::Upstream { provider: DataSource::Yahoo, .. }));
        assert_eq!(notices.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_required_payload_triggers_fallback() {
        let mut primary = MockDataSourceAdapter::new();
        primary
            .expect_get_financial_metrics()
            .times(1)
            .returning(|_, _, _, _| Ok(vec![FinancialMetrics::default()]));

        let mut secondary = MockDataSourceAdapter::new();
        secondary
            .expect_get_financial_metrics()
            .times(1)
            .returning(|_, _, _, _| Ok(Vec::new()));

        let (fetcher, notices) = recording_fetcher(primary, secondary);
        let metrics = fetcher
            .get_financial_metrics(
                "AAPL",
                date(2024, 1, 5),
                ReportPeriod::Ttm,
                1,
                DataSource::FinancialDatasets,
            )
            .await
            .unwrap();

        assert_eq!(metrics.len(), 1);
        assert!(notices.lock().unwrap()[0].reason.contains("no financial metrics"));
    }

    #[tokio::test]
    async fn test_empty_insider_trades_is_not_a_failure() {
        let mut primary = MockDataSourceAdapter::new();
        primary.expect_get_insider_trades().never();

        let mut secondary = MockDataSourceAdapter::new();
        secondary
            .expect_get_insider_trades()
            .times(1)
            .returning(|_, _, _| Ok(Vec::new()));

        let (fetcher, notices) = recording_fetcher(primary, secondary);
        let trades = fetcher
            .get_insider_trades("AAPL", date(2024, 1, 5), 5, DataSource::FinancialDatasets)
            .await
            .unwrap();

        assert!(trades.is_empty());
        assert!(notices.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_line_items_is_not_a_failure() {
        let mut primary = MockDataSourceAdapter::new();
        primary.expect_search_line_items().never();

        let mut secondary = MockDataSourceAdapter::new();
        secondary
            .expect_search_line_items()
            .times(1)
            .returning(|_, _, _, _| Ok(Vec::new()));

        let (fetcher, notices) = recording_fetcher(primary, secondary);
        let names = vec!["free_cash_flow".to_string()];
        let items = fetcher
            .search_line_items("AAPL", &names, ReportPeriod::Ttm, 1, DataSource::FinancialDatasets)
            .await
            .unwrap();

        assert!(items.is_empty());
        assert!(notices.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_primary_transport_error_names_source() {
        let mut primary = MockDataSourceAdapter::new();
        primary.expect_get_prices().times(1).returning(|_, _, _| {
            let cause = serde_json::from_str::<serde_json::Value>("<html>").unwrap_err();
            Err(StockError::JsonError(cause))
        });

        let fetcher =
            UnifiedFetcher::new(Arc::new(primary), Arc::new(MockDataSourceAdapter::new()));
        let err = fetcher
            .get_prices("AAPL", date(2024, 1, 1), date(2024, 1, 5), DataSource::Yahoo)
            .await
            .unwrap_err();

        assert!(matches!(err, StockError::Upstream { provider: DataSource::Yahoo, .. }));
        assert!(err.to_string().contains("yahoo"));
        assert!(err.to_string().contains("expected value at line 1 column 1"));
    }

    #[tokio::test]
    async fn test_failed_retry_names_primary() {
        let mut primary = MockDataSourceAdapter::new();
        primary.expect_get_market_cap().times(1).returning(|_| {
            let cause = serde_json::from_str::<serde_json::Value>("").unwrap_err();
            Err(StockError::JsonError(cause))
        });

        let mut secondary = MockDataSourceAdapter::new();
        secondary
            .expect_get_market_cap()
            .times(1)
            .returning(|_| Err(StockError::ConfigError("missing API key".into())));

        let (fetcher, notices) = recording_fetcher(primary, secondary);
        let err = fetcher
            .get_market_cap("AAPL", DataSource::FinancialDatasets)
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("yahoo error: JSON error"));
        assert_eq!(notices.lock().unwrap()[0].reason, "Configuration error: missing API key");
    }

    #[tokio::test]
    async fn test_line_items_fall_back_on_error() {
        let mut primary = MockDataSourceAdapter::new();
        primary
            .expect_search_line_items()
            .times(1)
            .returning(|_, names, _, _| {
                let mut items = LineItemResult::new();
                for name in names {
                    items.insert(name.as_str(), 42.0);
                }
                Ok(vec![items])
            });

        let mut secondary = MockDataSourceAdapter::new();
        secondary
            .expect_search_line_items()
            .times(1)
            .returning(|_, _, _, _| {
                Err(StockError::upstream(DataSource::FinancialDatasets, "HTTP 429"))
            });

        let (fetcher, notices) = recording_fetcher(primary, secondary);
        let names = vec!["free_cash_flow".to_string()];
        let items = fetcher
            .search_line_items("AAPL", &names, ReportPeriod::Ttm, 1, DataSource::FinancialDatasets)
            .await
            .unwrap();

        assert_eq!(items[0].get("free_cash_flow"), 42.0);
        assert_eq!(notices.lock().unwrap()[0].operation, FetchOperation::LineItems);
    }

    #[tokio::test]
    async fn test_repeated_calls_requery_and_match() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut primary = MockDataSourceAdapter::new();
        primary.expect_get_prices().times(2).returning(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(bars())
        });

        let fetcher =
            UnifiedFetcher::new(Arc::new(primary), Arc::new(MockDataSourceAdapter::new()));
        let first = fetcher
            .get_prices("AAPL", date(2024, 1, 1), date(2024, 1, 5), DataSource::Yahoo)
            .await
            .unwrap();
        let second = fetcher
            .get_prices("AAPL", date(2024, 1, 1), date(2024, 1, 5), DataSource::Yahoo)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_inputs_rejected_before_any_call() {
        let fetcher = UnifiedFetcher::new(
            Arc::new(MockDataSourceAdapter::new()),
            Arc::new(MockDataSourceAdapter::new()),
        );

        let err = fetcher.get_market_cap("  ", DataSource::Yahoo).await.unwrap_err();
        assert!(matches!(err, StockError::InvalidTicker(_)));

        let err = fetcher
            .get_prices("AAPL", date(2024, 2, 1), date(2024, 1, 1), DataSource::Yahoo)
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::InvalidDate(_)));
    }

    #[test]
    fn test_notice_display_names_source_and_cause() {
        let notice = FallbackNotice {
            from: DataSource::FinancialDatasets,
            to: DataSource::Yahoo,
            operation: FetchOperation::MarketCap,
            ticker: "AAPL".to_string(),
            reason: "HTTP 401".to_string(),
        };
        assert_eq!(
            notice.to_string(),
            "financialdatasets market cap for AAPL failed: HTTP 401. Falling back to yahoo"
        );
    }
}
