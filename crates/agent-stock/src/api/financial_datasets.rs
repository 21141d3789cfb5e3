//! Financial Datasets API client

use async_trait::async_trait;
use chrono::NaiveDate;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{Value, json};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

use super::DataSourceAdapter;
use crate::config::{DataSource, FINANCIAL_DATASETS_API_KEY_ENV, ReportPeriod, StockConfig};
use crate::error::{Result, StockError};
use crate::models::{
    FinancialMetrics, InsiderTrade, LineItemResult, PriceBar, coerce_f64, normalize_price_bars,
    parse_iso_date,
};

const SOURCE: DataSource = DataSource::FinancialDatasets;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Financial Datasets API client
///
/// Authenticates with the `X-API-KEY` header. Without a key every request
/// fails with a configuration error, which the unified fetcher treats like
/// any other upstream failure.
#[derive(Debug, Clone)]
pub struct FinancialDatasetsClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    rate_limiter: SharedRateLimiter,
}

#[derive(Debug, Deserialize)]
struct RawPrice {
    time: String,
    #[serde(default, deserialize_with = "crate::models::lenient_f64")]
    open: f64,
    #[serde(default, deserialize_with = "crate::models::lenient_f64")]
    high: f64,
    #[serde(default, deserialize_with = "crate::models::lenient_f64")]
    low: f64,
    #[serde(default, deserialize_with = "crate::models::lenient_f64")]
    close: f64,
    #[serde(default, deserialize_with = "crate::models::lenient_f64")]
    volume: f64,
}

impl FinancialDatasetsClient {
    /// Create a client
    ///
    /// # Arguments
    /// * `api_key` - Financial Datasets API key, if any
    /// * `base_url` - API root, without a trailing slash
    /// * `rate_limit` - Maximum requests per minute
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        rate_limit: u32,
        client: Client,
    ) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN));

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Create a client from the pipeline configuration
    pub fn from_config(config: &StockConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self::new(
            config.financial_datasets_api_key.clone(),
            config.financial_datasets_base_url.clone(),
            config.rate_limit_per_minute,
            client,
        ))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the key, wait for the rate limiter, send, and check the status
    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            StockError::ConfigError(format!("{FINANCIAL_DATASETS_API_KEY_ENV} is not set"))
        })?;

        self.rate_limiter.until_ready().await;

        let response = request.header("X-API-KEY", api_key).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StockError::upstream(
                SOURCE,
                format!("HTTP {status}: {}", body.trim()),
            ));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl DataSourceAdapter for FinancialDatasetsClient {
    fn source(&self) -> DataSource {
        SOURCE
    }

    async fn get_prices(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>> {
        let start = start_date.to_string();
        let end = end_date.to_string();
        let request = self.client.get(self.url("/prices/")).query(&[
            ("ticker", ticker),
            ("interval", "day"),
            ("interval_multiplier", "1"),
            ("start_date", start.as_str()),
            ("end_date", end.as_str()),
        ]);

        let payload = self.send(request).await?;
        parse_prices(&payload, ticker)
    }

    async fn get_financial_metrics(
        &self,
        ticker: &str,
        report_period: NaiveDate,
        period: ReportPeriod,
        limit: usize,
    ) -> Result<Vec<FinancialMetrics>> {
        let report_period = report_period.to_string();
        let limit = limit.to_string();
        let request = self.client.get(self.url("/financial-metrics/")).query(&[
            ("ticker", ticker),
            ("report_period_lte", report_period.as_str()),
            ("limit", limit.as_str()),
            ("period", period.as_str()),
        ]);

        let payload = self.send(request).await?;
        parse_financial_metrics(&payload, ticker)
    }

    async fn get_insider_trades(
        &self,
        ticker: &str,
        end_date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<InsiderTrade>> {
        let end = end_date.to_string();
        let limit = limit.to_string();
        let request = self.client.get(self.url("/insider-trades/")).query(&[
            ("ticker", ticker),
            ("filing_date_lte", end.as_str()),
            ("limit", limit.as_str()),
        ]);

        let payload = self.send(request).await?;
        parse_insider_trades(&payload)
    }

    async fn get_market_cap(&self, ticker: &str) -> Result<f64> {
        let request = self
            .client
            .get(self.url("/company/facts"))
            .query(&[("ticker", ticker)]);

        let payload = self.send(request).await?;
        parse_market_cap(&payload, ticker)
    }

    async fn search_line_items(
        &self,
        ticker: &str,
        line_items: &[String],
        period: ReportPeriod,
        limit: usize,
    ) -> Result<Vec<LineItemResult>> {
        let body = json!({
            "tickers": [ticker],
            "line_items": line_items,
            "period": period.as_str(),
            "limit": limit,
        });
        let request = self
            .client
            .post(self.url("/financials/search/line-items"))
            .json(&body);

        let payload = self.send(request).await?;
        Ok(parse_line_items(&payload, line_items))
    }
}

fn parse_prices(payload: &Value, ticker: &str) -> Result<Vec<PriceBar>> {
    let raw: Vec<RawPrice> = match payload.get("prices") {
        Some(prices @ Value::Array(_)) => serde_json::from_value(prices.clone())?,
        _ => Vec::new(),
    };

    let bars: Vec<PriceBar> = raw
        .into_iter()
        .filter_map(|p| {
            let Some(date) = parse_iso_date(&p.time) else {
                debug!("Skipping price bar with unparseable time '{}'", p.time);
                return None;
            };
            Some(PriceBar {
                date,
                open: p.open,
                high: p.high,
                low: p.low,
                close: p.close,
                volume: p.volume,
            })
        })
        .collect();

    if bars.is_empty() {
        return Err(StockError::empty(SOURCE, "price data", ticker));
    }
    Ok(normalize_price_bars(bars))
}

fn parse_financial_metrics(payload: &Value, ticker: &str) -> Result<Vec<FinancialMetrics>> {
    let metrics: Vec<FinancialMetrics> = match payload.get("financial_metrics") {
        Some(metrics @ Value::Array(_)) => serde_json::from_value(metrics.clone())?,
        _ => Vec::new(),
    };

    if metrics.is_empty() {
        return Err(StockError::empty(SOURCE, "financial metrics", ticker));
    }
    Ok(metrics)
}

fn parse_insider_trades(payload: &Value) -> Result<Vec<InsiderTrade>> {
    match payload.get("insider_trades") {
        Some(trades @ Value::Array(_)) => Ok(serde_json::from_value(trades.clone())?),
        _ => Ok(Vec::new()),
    }
}

fn parse_market_cap(payload: &Value, ticker: &str) -> Result<f64> {
    let market_cap = payload
        .get("company_facts")
        .and_then(|facts| facts.get("market_cap"));

    match market_cap {
        Some(value) if !value.is_null() => Ok(coerce_f64(Some(value))),
        _ => Err(StockError::empty(SOURCE, "market cap", ticker)),
    }
}

fn parse_line_items(payload: &Value, requested: &[String]) -> Vec<LineItemResult> {
    payload
        .get("search_results")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .map(|record| LineItemResult::from_record(record, requested))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = FinancialDatasetsClient::new(
            Some("test_key".into()),
            "http://localhost/",
            5,
            Client::new(),
        );
        assert_eq!(client.api_key.as_deref(), Some("test_key"));
        assert_eq!(client.url("/prices/"), "http://localhost/prices/");
        assert_eq!(client.source(), DataSource::FinancialDatasets);
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let client = FinancialDatasetsClient::new(None, "http://127.0.0.1:9", 5, Client::new());
        let err = client.get_market_cap("AAPL").await.unwrap_err();
        assert!(matches!(
            err,
            StockError::ConfigError(msg) if msg.contains("FINANCIAL_DATASETS_API_KEY")
        ));
    }

    #[test]
    fn test_parse_prices_sorted() {
        let payload = json!({
            "prices": [
                {"time": "2024-01-03T05:00:00Z", "open": 2, "high": 3, "low": 1, "close": 2.5, "volume": 1000},
                {"time": "2024-01-02T05:00:00Z", "open": "1", "high": 2, "low": 0.5, "close": 1.5},
                {"time": "garbage", "open": 9, "high": 9, "low": 9, "close": 9, "volume": 9}
            ]
        });

        let bars = parse_prices(&payload, "AAPL").unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[0].open, 1.0);
        assert_eq!(bars[0].volume, 0.0);
        assert_eq!(bars[1].close, 2.5);
    }

    #[test]
    fn test_parse_prices_empty_is_failure() {
        let err = parse_prices(&json!({"prices": []}), "AAPL").unwrap_err();
        assert!(matches!(err, StockError::EmptyPayload { .. }));

        let err = parse_prices(&json!({}), "AAPL").unwrap_err();
        assert!(matches!(err, StockError::EmptyPayload { .. }));
    }

    #[test]
    fn test_parse_metrics() {
        let payload = json!({
            "financial_metrics": [{
                "ticker": "AAPL",
                "return_on_equity": 1.6,
                "net_margin": 0.25,
                "debt_to_equity": null
            }]
        });
        let metrics = parse_financial_metrics(&payload, "AAPL").unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].return_on_equity, 1.6);
        assert_eq!(metrics[0].debt_to_equity, 0.0);

        let err = parse_financial_metrics(&json!({"financial_metrics": []}), "AAPL").unwrap_err();
        assert!(matches!(err, StockError::EmptyPayload { .. }));
    }

    #[test]
    fn test_parse_insider_trades_optional() {
        assert!(parse_insider_trades(&json!({})).unwrap().is_empty());
        assert!(parse_insider_trades(&json!({"insider_trades": null})).unwrap().is_empty());

        let trades = parse_insider_trades(&json!({
            "insider_trades": [
                {"transaction_shares": 100, "transaction_date": "2024-01-05", "name": "A"},
                {"transaction_shares": -50}
            ]
        }))
        .unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[1].transaction_shares, -50.0);
    }

    #[test]
    fn test_parse_market_cap() {
        let cap =
            parse_market_cap(&json!({"company_facts": {"market_cap": 3.0e12}}), "AAPL").unwrap();
        assert_eq!(cap, 3.0e12);

        let err = parse_market_cap(&json!({"company_facts": {}}), "AAPL").unwrap_err();
        assert!(matches!(err, StockError::EmptyPayload { .. }));
    }

    #[test]
    fn test_parse_line_items() {
        let requested = vec!["free_cash_flow".to_string()];
        let items = parse_line_items(
            &json!({"search_results": [{"ticker": "AAPL", "free_cash_flow": 9.9e10, "period": "ttm"}]}),
            &requested,
        );
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].get("free_cash_flow"), 9.9e10);
        assert_eq!(items[0].len(), 1);

        assert!(parse_line_items(&json!({"search_results": []}), &requested).is_empty());
        assert!(parse_line_items(&json!({}), &requested).is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires API key and network access
    async fn test_get_prices_live() {
        let config = StockConfig::default().with_env_api_key();
        let client = FinancialDatasetsClient::from_config(&config).unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();

        let bars = client.get_prices("AAPL", start, end).await.unwrap();
        assert!(!bars.is_empty());
    }
}
