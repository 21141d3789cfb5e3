//! Fundamentals scoring stage

use agent_core::{AgentMessage, AgentState, Error, Result, Stage, StateDelta};
use async_trait::async_trait;
use tracing::info;

use super::{FUNDAMENTALS_AGENT, data_keys};
use crate::models::{FinancialMetrics, LineItemResult};
use crate::reasoning::show_stage_report;
use crate::scoring::analyze_fundamentals;

/// Scores the most recent financial metrics, free cash flow and market cap
#[derive(Debug, Default)]
pub struct FundamentalsStage;

impl FundamentalsStage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Stage for FundamentalsStage {
    async fn run(&self, state: &AgentState) -> Result<StateDelta> {
        let metrics: Vec<FinancialMetrics> = state.require(data_keys::FINANCIAL_METRICS)?;
        let metrics = metrics.into_iter().next().ok_or_else(|| {
            Error::State(format!("'{}' is empty", data_keys::FINANCIAL_METRICS))
        })?;

        let line_item = state
            .get_typed::<Vec<LineItemResult>>(data_keys::FINANCIAL_LINE_ITEMS)?
            .and_then(|items| items.into_iter().next())
            .unwrap_or_default();
        let market_cap: f64 = state.require(data_keys::MARKET_CAP)?;

        let analysis = analyze_fundamentals(&metrics, &line_item, market_cap);
        let content = analysis.to_content();
        info!(
            signal = %analysis.signal,
            confidence = analysis.confidence,
            "Fundamental analysis complete"
        );

        if state.show_reasoning() {
            show_stage_report(
                "Fundamental Analysis",
                &analysis.summary(),
                &content,
                "Fundamental Analysis Agent",
            );
        }

        Ok(StateDelta::new().with_message(AgentMessage::new(FUNDAMENTALS_AGENT, content)))
    }

    fn name(&self) -> &str {
        FUNDAMENTALS_AGENT
    }
}
