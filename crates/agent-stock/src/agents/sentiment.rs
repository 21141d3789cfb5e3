//! Insider sentiment stage

use agent_core::{AgentMessage, AgentState, Result, Stage, StateDelta};
use async_trait::async_trait;
use tracing::info;

use super::{SENTIMENT_AGENT, data_keys};
use crate::models::InsiderTrade;
use crate::reasoning::show_stage_report;
use crate::scoring::analyze_sentiment;

/// Turns insider buys and sells into a signal
#[derive(Debug, Default)]
pub struct SentimentStage;

impl SentimentStage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Stage for SentimentStage {
    async fn run(&self, state: &AgentState) -> Result<StateDelta> {
        let trades: Vec<InsiderTrade> = state.require(data_keys::INSIDER_TRADES)?;

        let analysis = analyze_sentiment(&trades);
        let content = analysis.to_content();
        info!(
            signal = %analysis.signal,
            confidence = analysis.confidence,
            trades = trades.len(),
            "Sentiment analysis complete"
        );

        if state.show_reasoning() {
            show_stage_report(
                "Sentiment Analysis",
                &analysis.summary(),
                &content,
                "Sentiment Analysis Agent",
            );
        }

        Ok(StateDelta::new().with_message(AgentMessage::new(SENTIMENT_AGENT, content)))
    }

    fn name(&self) -> &str {
        SENTIMENT_AGENT
    }
}
