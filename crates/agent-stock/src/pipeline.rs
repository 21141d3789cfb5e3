//! Default signal pipeline

use agent_core::{AgentState, Stage, keys};
use agent_workflow::Pipeline;
use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;

use crate::agents::{FundamentalsStage, MarketDataStage, SentimentStage};
use crate::config::{DataSource, StockConfig};
use crate::error::Result;
use crate::fetcher::UnifiedFetcher;

/// Inputs for one signal run
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRequest {
    pub ticker: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub data_source: Option<DataSource>,
    pub show_reasoning: bool,
}

impl SignalRequest {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            start_date: None,
            end_date: None,
            data_source: None,
            show_reasoning: false,
        }
    }

    /// Initial pipeline state: ticker and dates in `data`, the flag in `metadata`
    pub fn initial_state(&self) -> AgentState {
        let mut state = AgentState::new()
            .with_data(keys::TICKER, json!(self.ticker))
            .with_show_reasoning(self.show_reasoning);

        if let Some(start) = self.start_date {
            state = state.with_data(keys::START_DATE, json!(start));
        }
        if let Some(end) = self.end_date {
            state = state.with_data(keys::END_DATE, json!(end));
        }
        if let Some(source) = self.data_source {
            state = state.with_data(keys::DATA_SOURCE, json!(source));
        }
        state
    }
}

/// Market data first, then fundamentals and sentiment side by side
pub fn build_signal_pipeline(
    fetcher: Arc<UnifiedFetcher>,
    config: StockConfig,
) -> Result<Pipeline> {
    let scoring: Vec<Arc<dyn Stage>> = vec![
        Arc::new(FundamentalsStage::new()),
        Arc::new(SentimentStage::new()),
    ];

    let pipeline = Pipeline::builder("signal")
        .add_stage(Arc::new(MarketDataStage::new(fetcher, config)))
        .add_parallel(scoring)
        .build()?;
    Ok(pipeline)
}
