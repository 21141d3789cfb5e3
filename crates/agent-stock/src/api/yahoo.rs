//! Yahoo Finance API client

use async_trait::async_trait;
use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;
use yahoo_finance_api as yahoo;

use super::DataSourceAdapter;
use crate::config::{DataSource, ReportPeriod, StockConfig};
use crate::error::{Result, StockError};
use crate::models::{
    FinancialMetrics, InsiderTrade, LineItemResult, PriceBar, coerce_f64, normalize_price_bars,
};

const SOURCE: DataSource = DataSource::Yahoo;
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const METRICS_MODULES: &str = "financialData,defaultKeyStatistics,summaryDetail";
const MARKET_CAP_MODULES: &str = "summaryDetail,price";
const INSIDER_MODULES: &str = "insiderTransactions";

/// Yahoo Finance API client
///
/// Daily prices go through `yahoo_finance_api`, whose chart endpoint is fixed
/// by that crate; fundamentals, insider transactions and cash flow statements
/// come from the `quoteSummary` endpoint under `base_url`, which needs a
/// session cookie plus a crumb.
#[derive(Clone)]
pub struct YahooFinanceClient {
    client: Client,
    connector: Arc<yahoo::YahooConnector>,
    base_url: String,
    cookie_url: String,
    crumb: Arc<RwLock<Option<String>>>,
}

impl fmt::Debug for YahooFinanceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YahooFinanceClient")
            .field("base_url", &self.base_url)
            .field("cookie_url", &self.cookie_url)
            .finish_non_exhaustive()
    }
}

impl YahooFinanceClient {
    /// Create a client against `base_url` (no trailing slash)
    pub fn new(
        base_url: impl Into<String>,
        cookie_url: impl Into<String>,
        client: Client,
        connector: yahoo::YahooConnector,
    ) -> Self {
        Self {
            client,
            connector: Arc::new(connector),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cookie_url: cookie_url.into(),
            crumb: Arc::new(RwLock::new(None)),
        }
    }

    /// Create a client from the pipeline configuration
    pub fn from_config(config: &StockConfig) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()?;
        let connector = yahoo::YahooConnector::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| StockError::upstream(SOURCE, e.to_string()))?;
        Ok(Self::new(
            config.yahoo_base_url.clone(),
            config.yahoo_cookie_url.clone(),
            client,
            connector,
        ))
    }

    async fn crumb(&self) -> Result<String> {
        if let Some(crumb) = self.crumb.read().await.as_ref() {
            return Ok(crumb.clone());
        }

        let mut slot = self.crumb.write().await;
        if let Some(crumb) = slot.as_ref() {
            return Ok(crumb.clone());
        }
        let crumb = self.fetch_crumb().await?;
        *slot = Some(crumb.clone());
        Ok(crumb)
    }

    async fn reset_crumb(&self) {
        self.crumb.write().await.take();
    }

    async fn fetch_crumb(&self) -> Result<String> {
        // Only the cookie matters here; the landing page itself is a 404
        if let Err(e) = self.client.get(&self.cookie_url).send().await {
            debug!("Yahoo cookie request failed: {e}");
        }

        let response = self
            .client
            .get(format!("{}/v1/test/getcrumb", self.base_url))
            .send()
            .await?;
        let status = response.status();
        let crumb = response.text().await?;
        if !status.is_success() || crumb.trim().is_empty() {
            return Err(StockError::upstream(
                SOURCE,
                format!("could not obtain crumb (HTTP {status})"),
            ));
        }

        debug!("Obtained Yahoo crumb");
        Ok(crumb.trim().to_string())
    }

    async fn request_summary(&self, ticker: &str, modules: &str) -> Result<(StatusCode, String)> {
        let crumb = self.crumb().await?;
        let response = self
            .client
            .get(format!(
                "{}/v10/finance/quoteSummary/{ticker}",
                self.base_url
            ))
            .query(&[("modules", modules), ("crumb", crumb.as_str())])
            .send()
            .await?;

        let status = response.status();
        Ok((status, response.text().await?))
    }

    /// Fetch `modules` from quoteSummary and return the single result object
    ///
    /// A 401 means the cached crumb expired; it is dropped and the request
    /// is sent once more with a fresh one.
    async fn quote_summary(&self, ticker: &str, modules: &str) -> Result<Value> {
        let (mut status, mut body) = self.request_summary(ticker, modules).await?;
        if status == StatusCode::UNAUTHORIZED {
            debug!("Yahoo rejected the crumb for {ticker}, refreshing");
            self.reset_crumb().await;
            (status, body) = self.request_summary(ticker, modules).await?;
        }

        if !status.is_success() {
            let reason = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|payload| summary_error(&payload))
                .unwrap_or_else(|| body.trim().to_string());
            return Err(StockError::upstream(
                SOURCE,
                format!("HTTP {status}: {reason}"),
            ));
        }

        extract_summary(serde_json::from_str(&body)?, ticker)
    }
}

#[async_trait]
impl DataSourceAdapter for YahooFinanceClient {
    fn source(&self) -> DataSource {
        SOURCE
    }

    async fn get_prices(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>> {
        // Yahoo treats the end bound as exclusive; one extra day on each side
        // covers exchanges whose local date differs from the UTC date
        let end_exclusive = end_date.checked_add_days(Days::new(2)).unwrap_or(end_date);
        let start_inclusive = start_date.checked_sub_days(Days::new(1)).unwrap_or(start_date);
        let start = to_offset_datetime(start_inclusive)?;
        let end = to_offset_datetime(end_exclusive)?;

        let response = self
            .connector
            .get_quote_history(ticker, start, end)
            .await
            .map_err(|e| StockError::upstream(SOURCE, e.to_string()))?;

        let gmtoffset = response
            .metadata()
            .map_err(|e| StockError::upstream(SOURCE, e.to_string()))?
            .gmtoffset;
        let quotes = response
            .quotes()
            .map_err(|e| StockError::upstream(SOURCE, e.to_string()))?;

        let bars: Vec<PriceBar> = quotes
            .iter()
            .filter_map(|q| {
                Some(PriceBar {
                    date: exchange_date(q.timestamp, gmtoffset)?,
                    open: q.open,
                    high: q.high,
                    low: q.low,
                    close: q.close,
                    volume: q.volume as f64,
                })
            })
            .filter(|bar| bar.date >= start_date && bar.date <= end_date)
            .collect();

        if bars.is_empty() {
            return Err(StockError::empty(SOURCE, "price data", ticker));
        }
        Ok(normalize_price_bars(bars))
    }

    async fn get_financial_metrics(
        &self,
        ticker: &str,
        _report_period: NaiveDate,
        _period: ReportPeriod,
        _limit: usize,
    ) -> Result<Vec<FinancialMetrics>> {
        // quoteSummary only exposes the current trailing figures
        let summary = self.quote_summary(ticker, METRICS_MODULES).await?;
        Ok(vec![parse_financial_metrics(&summary, ticker)?])
    }

    async fn get_insider_trades(
        &self,
        ticker: &str,
        end_date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<InsiderTrade>> {
        let summary = self.quote_summary(ticker, INSIDER_MODULES).await?;
        Ok(parse_insider_trades(&summary, end_date, limit))
    }

    async fn get_market_cap(&self, ticker: &str) -> Result<f64> {
        let summary = self.quote_summary(ticker, MARKET_CAP_MODULES).await?;
        parse_market_cap(&summary, ticker)
    }

    async fn search_line_items(
        &self,
        ticker: &str,
        line_items: &[String],
        period: ReportPeriod,
        limit: usize,
    ) -> Result<Vec<LineItemResult>> {
        let module = cashflow_module(period);
        let summary = self.quote_summary(ticker, module).await?;
        Ok(parse_line_items(&summary, module, line_items, limit))
    }
}

/// Trading day of a bar, in the exchange's own timezone
fn exchange_date(timestamp: i64, gmtoffset: i32) -> Option<NaiveDate> {
    let offset = FixedOffset::east_opt(gmtoffset)?;
    Some(
        DateTime::from_timestamp(timestamp, 0)?
            .with_timezone(&offset)
            .date_naive(),
    )
}

fn to_offset_datetime(date: NaiveDate) -> Result<OffsetDateTime> {
    let timestamp = date.and_time(NaiveTime::MIN).and_utc().timestamp();
    OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|e| StockError::InvalidDate(format!("{date}: {e}")))
}

fn cashflow_module(period: ReportPeriod) -> &'static str {
    match period {
        ReportPeriod::Quarterly => "cashflowStatementHistoryQuarterly",
        ReportPeriod::Ttm | ReportPeriod::Annual => "cashflowStatementHistory",
    }
}

fn summary_error(payload: &Value) -> Option<String> {
    let error = payload.pointer("/quoteSummary/error")?;
    if error.is_null() {
        return None;
    }
    error
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| Some(error.to_string()))
}

fn extract_summary(mut payload: Value, ticker: &str) -> Result<Value> {
    if let Some(reason) = summary_error(&payload) {
        return Err(StockError::upstream(SOURCE, reason));
    }

    match payload.pointer_mut("/quoteSummary/result/0") {
        Some(result) if result.is_object() => Ok(result.take()),
        _ => Err(StockError::empty(SOURCE, "quote summary", ticker)),
    }
}

/// Look up `module.field`, treating a missing module or field as absent
fn field<'a>(summary: &'a Value, module: &str, name: &str) -> Option<&'a Value> {
    summary
        .get(module)
        .and_then(|m| m.get(name))
        .filter(|v| !v.is_null() && v.as_object().is_none_or(|o| o.contains_key("raw")))
}

fn number(summary: &Value, module: &str, name: &str) -> f64 {
    coerce_f64(field(summary, module, name))
}

fn parse_financial_metrics(summary: &Value, ticker: &str) -> Result<FinancialMetrics> {
    if summary.get("financialData").is_none() && summary.get("defaultKeyStatistics").is_none() {
        return Err(StockError::empty(SOURCE, "financial metrics", ticker));
    }

    let shares_outstanding = number(summary, "defaultKeyStatistics", "sharesOutstanding");
    let free_cash_flow = number(summary, "financialData", "freeCashflow");
    let free_cash_flow_per_share = if shares_outstanding > 0.0 {
        free_cash_flow / shares_outstanding
    } else {
        0.0
    };

    Ok(FinancialMetrics {
        return_on_equity: number(summary, "financialData", "returnOnEquity"),
        net_margin: number(summary, "financialData", "profitMargins"),
        operating_margin: number(summary, "financialData", "operatingMargins"),
        revenue_growth: number(summary, "financialData", "revenueGrowth"),
        earnings_growth: number(summary, "financialData", "earningsGrowth"),
        book_value_growth: 0.0,
        current_ratio: number(summary, "financialData", "currentRatio"),
        debt_to_equity: number(summary, "financialData", "debtToEquity"),
        free_cash_flow_per_share,
        earnings_per_share: number(summary, "defaultKeyStatistics", "trailingEps"),
        price_to_earnings_ratio: number(summary, "summaryDetail", "trailingPE"),
        price_to_book_ratio: number(summary, "defaultKeyStatistics", "priceToBook"),
        price_to_sales_ratio: number(summary, "summaryDetail", "priceToSalesTrailing12Months"),
    })
}

fn parse_market_cap(summary: &Value, ticker: &str) -> Result<f64> {
    field(summary, "summaryDetail", "marketCap")
        .or_else(|| field(summary, "price", "marketCap"))
        .map(|value| coerce_f64(Some(value)))
        .ok_or_else(|| StockError::empty(SOURCE, "market cap", ticker))
}

fn parse_insider_trades(summary: &Value, end_date: NaiveDate, limit: usize) -> Vec<InsiderTrade> {
    let Some(transactions) = summary
        .pointer("/insiderTransactions/transactions")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    transactions
        .iter()
        .filter_map(|tx| {
            let text = tx
                .get("transactionText")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let shares = coerce_f64(tx.get("shares")).abs();

            // Awards, gifts and option exercises carry no buy/sell direction
            let transaction_shares = match trade_direction(text)? {
                Direction::Buy => shares,
                Direction::Sell => -shares,
            };

            Some(InsiderTrade {
                transaction_shares,
                transaction_date: tx
                    .pointer("/startDate/raw")
                    .and_then(Value::as_i64)
                    .and_then(|ts| DateTime::from_timestamp(ts, 0))
                    .map(|dt| dt.date_naive()),
                insider_name: tx
                    .get("filerName")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                transaction_type: Some(text.to_string()),
            })
        })
        .filter(|trade| trade.transaction_date.is_none_or(|date| date <= end_date))
        .take(limit)
        .collect()
}

enum Direction {
    Buy,
    Sell,
}

fn trade_direction(text: &str) -> Option<Direction> {
    if text.contains("Sale") || text.contains("Sell") {
        Some(Direction::Sell)
    } else if text.contains("Purchase") || text.contains("Buy") {
        Some(Direction::Buy)
    } else {
        None
    }
}

fn parse_line_items(
    summary: &Value,
    module: &str,
    requested: &[String],
    limit: usize,
) -> Vec<LineItemResult> {
    let Some(statements) = summary
        .get(module)
        .and_then(|m| m.get("cashflowStatements"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    statements
        .iter()
        .take(limit)
        .map(|statement| {
            let mut items = LineItemResult::new();
            for name in requested {
                items.insert(name.as_str(), statement_value(statement, name));
            }
            items
        })
        .collect()
}

fn statement_value(statement: &Value, name: &str) -> f64 {
    let key = snake_to_camel(name);
    if let Some(value) = statement.get(&key) {
        return coerce_f64(Some(value));
    }

    if name == "free_cash_flow" {
        let operating = coerce_f64(statement.get("totalCashFromOperatingActivities"));
        let capex = coerce_f64(statement.get("capitalExpenditures"));
        return operating + capex;
    }

    0.0
}

fn snake_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
