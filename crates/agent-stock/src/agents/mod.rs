//! Pipeline stages for the signal run

pub mod fundamentals;
pub mod market_data;
pub mod sentiment;

pub use fundamentals::FundamentalsStage;
pub use market_data::MarketDataStage;
pub use sentiment::SentimentStage;

/// `data` keys written by the market data stage
pub mod data_keys {
    pub const PRICES: &str = "prices";
    pub const FINANCIAL_METRICS: &str = "financial_metrics";
    pub const INSIDER_TRADES: &str = "insider_trades";
    pub const MARKET_CAP: &str = "market_cap";
    pub const FINANCIAL_LINE_ITEMS: &str = "financial_line_items";
}

pub const MARKET_DATA_AGENT: &str = "market_data_agent";
pub const FUNDAMENTALS_AGENT: &str = "fundamentals_agent";
pub const SENTIMENT_AGENT: &str = "sentiment_agent";
