//! Market data stage

use agent_core::{AgentState, Stage, StateDelta, keys};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::{MARKET_DATA_AGENT, data_keys};
use crate::config::{DataSource, StockConfig};
use crate::dates::resolve_date_window;
use crate::error::Result;
use crate::fetcher::{FallbackNotice, FetchOperation, UnifiedFetcher};

/// Fetches everything the scoring stages need into `data`
///
/// Missing dates are resolved first (end date defaults to today, start date
/// to three months earlier). If any fetch still fails while the secondary
/// source is selected, the whole stage runs again against the primary source.
/// This sits on top of the per-call fallback in [`UnifiedFetcher`].
pub struct MarketDataStage {
    fetcher: Arc<UnifiedFetcher>,
    config: StockConfig,
    today: Option<NaiveDate>,
}

impl MarketDataStage {
    pub fn new(fetcher: Arc<UnifiedFetcher>, config: StockConfig) -> Self {
        Self {
            fetcher,
            config,
            today: None,
        }
    }

    /// Pin the date used when no end date is given
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    fn selected_source(&self, state: &AgentState) -> Result<DataSource> {
        Ok(state
            .get_typed::<DataSource>(keys::DATA_SOURCE)?
            .unwrap_or(self.config.data_source))
    }

    async fn collect(&self, state: &AgentState, source: DataSource) -> Result<StateDelta> {
        let ticker = state.ticker()?;
        let (start_date, end_date) = resolve_date_window(
            state.get_typed(keys::START_DATE)?,
            state.get_typed(keys::END_DATE)?,
            self.today(),
        )?;

        info!("Fetching market data for {ticker} from {source} ({start_date} to {end_date})");

        let config = &self.config;
        let fetcher = &self.fetcher;

        let prices = fetcher
            .get_prices(&ticker, start_date, end_date, source)
            .await?;
        let metrics = fetcher
            .get_financial_metrics(
                &ticker,
                end_date,
                config.report_period,
                config.metrics_limit,
                source,
            )
            .await?;
        let insider_trades = fetcher
            .get_insider_trades(&ticker, end_date, config.insider_trade_limit, source)
            .await?;
        let market_cap = fetcher.get_market_cap(&ticker, source).await?;
        let line_items = fetcher
            .search_line_items(
                &ticker,
                &config.line_items,
                config.report_period,
                config.metrics_limit,
                source,
            )
            .await?;

        info!(
            "Fetched {} price bar(s), {} insider trade(s) for {ticker}",
            prices.len(),
            insider_trades.len()
        );

        let delta = StateDelta::new()
            .with_data(keys::START_DATE, json!(start_date))
            .with_data(keys::END_DATE, json!(end_date))
            .with_data(keys::DATA_SOURCE, json!(source))
            .with_data_typed(data_keys::PRICES, &prices)?
            .with_data_typed(data_keys::FINANCIAL_METRICS, &metrics)?
            .with_data_typed(data_keys::INSIDER_TRADES, &insider_trades)?
            .with_data(data_keys::MARKET_CAP, json!(market_cap))
            .with_data_typed(data_keys::FINANCIAL_LINE_ITEMS, &line_items)?;
        Ok(delta)
    }
}

#[async_trait]
impl Stage for MarketDataStage {
    async fn run(&self, state: &AgentState) -> agent_core::Result<StateDelta> {
        let source = self.selected_source(state)?;

        let err = match self.collect(state, source).await {
            Ok(delta) => return Ok(delta),
            Err(e) => e,
        };

        if source.is_primary() || err.is_input_error() {
            return Err(err.into());
        }

        self.fetcher.notify(&FallbackNotice {
            from: source,
            to: DataSource::PRIMARY,
            operation: FetchOperation::MarketData,
            ticker: state.ticker().unwrap_or_default(),
            reason: err.to_string(),
        });

        Ok(self.collect(state, DataSource::PRIMARY).await?)
    }

    fn name(&self) -> &str {
        MARKET_DATA_AGENT
    }
}
