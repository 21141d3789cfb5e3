//! Insider trading sentiment

use serde_json::{Value, json};

use super::{Signal, count, group_digits, majority};
use crate::models::InsiderTrade;

/// Insider trade vote tally
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentAnalysis {
    pub trades: Vec<InsiderTrade>,
    pub bullish: usize,
    pub bearish: usize,
    pub signal: Signal,
    pub confidence: f64,
    pub reasoning: String,
}

/// Each purchase votes bullish and each sale bearish; zero-share trades abstain
pub fn analyze_sentiment(trades: &[InsiderTrade]) -> SentimentAnalysis {
    let votes: Vec<Signal> = trades
        .iter()
        .filter_map(|trade| match trade.transaction_shares {
            s if s > 0.0 => Some(Signal::Bullish),
            s if s < 0.0 => Some(Signal::Bearish),
            _ => None,
        })
        .collect();

    let (signal, confidence) = majority(&votes);
    let bullish = count(&votes, Signal::Bullish);
    let bearish = count(&votes, Signal::Bearish);

    let reasoning = if votes.is_empty() {
        "No recent insider trades available. Defaulting to neutral stance.".to_string()
    } else {
        format!(
            "Analyzed {} insider trades. Bullish signals: {bullish}, Bearish signals: {bearish}",
            votes.len()
        )
    };

    SentimentAnalysis {
        trades: trades.to_vec(),
        bullish,
        bearish,
        signal,
        confidence,
        reasoning,
    }
}

impl SentimentAnalysis {
    /// Message payload: `{signal, confidence, reasoning}`
    pub fn to_content(&self) -> Value {
        json!({
            "signal": self.signal,
            "confidence": self.confidence,
            "reasoning": self.reasoning,
        })
    }

    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if self.trades.is_empty() {
            parts.push(
                "No recent insider trades detected. This could indicate either trading \
                 restrictions or a lack of strong insider sentiment in either direction."
                    .to_string(),
            );
        } else {
            parts.push(format!(
                "Insider Trading Analysis:\n- Total Trades: {}\n- Buy Trades: {}\n- Sell Trades: {}\n- Net Position: {}",
                self.trades.len(),
                self.bullish,
                self.bearish,
                self.signal.title()
            ));

            let details: Vec<String> = self
                .trades
                .iter()
                .map(|trade| {
                    let date = trade
                        .transaction_date
                        .map_or_else(|| "N/A".to_string(), |d| d.to_string());
                    let insider = trade.insider_name.as_deref().unwrap_or("Unknown Insider");
                    let action = if trade.transaction_shares > 0.0 {
                        "bought"
                    } else {
                        "sold"
                    };
                    format!(
                        "- {date}: {insider} {action} {} shares",
                        group_digits(&format!("{:.0}", trade.transaction_shares.abs()))
                    )
                })
                .collect();
            parts.push(format!("Recent Trades:\n{}", details.join("\n")));
        }

        parts.push(format!(
            "\nOverall Sentiment: {}\nConfidence: {:.0}%\n{}",
            self.signal.title(),
            self.confidence * 100.0,
            self.reasoning
        ));

        parts.join("\n\n")
    }
}
