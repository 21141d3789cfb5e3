//! Signal scoring shared by the analysis stages

pub mod fundamentals;
pub mod sentiment;

pub use fundamentals::{
    FundamentalsAnalysis, SubSignal, analyze_fundamentals, calculate_intrinsic_value,
};
pub use sentiment::{SentimentAnalysis, analyze_sentiment};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading stance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Bullish,
    Bearish,
    Neutral,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Bullish => "bullish",
            Signal::Bearish => "bearish",
            Signal::Neutral => "neutral",
        }
    }

    /// Map a 0-3 threshold score: 2 or more is bullish, 0 is bearish
    pub fn from_score(score: u8) -> Self {
        match score {
            0 => Signal::Bearish,
            1 => Signal::Neutral,
            _ => Signal::Bullish,
        }
    }

    /// Capitalized label for summaries
    pub fn title(self) -> &'static str {
        match self {
            Signal::Bullish => "Bullish",
            Signal::Bearish => "Bearish",
            Signal::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combine votes into an overall signal and a confidence in `[0, 1]`
///
/// Ties between bullish and bearish resolve to neutral. With no votes the
/// result is `(Neutral, 0.5)`.
pub fn majority(signals: &[Signal]) -> (Signal, f64) {
    if signals.is_empty() {
        return (Signal::Neutral, 0.5);
    }

    let bullish = count(signals, Signal::Bullish);
    let bearish = count(signals, Signal::Bearish);
    let overall = match bullish.cmp(&bearish) {
        std::cmp::Ordering::Greater => Signal::Bullish,
        std::cmp::Ordering::Less => Signal::Bearish,
        std::cmp::Ordering::Equal => Signal::Neutral,
    };

    let confidence = bullish.max(bearish) as f64 / signals.len() as f64;
    (overall, confidence)
}

pub(crate) fn count(signals: &[Signal], wanted: Signal) -> usize {
    signals.iter().filter(|s| **s == wanted).count()
}

/// Insert thousands separators into a run of digits
pub(crate) fn group_digits(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// Format a dollar amount with thousands separators, e.g. `$1,234,567.89`
pub(crate) fn format_usd(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (whole, frac) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}${}.{frac}", group_digits(whole))
}
