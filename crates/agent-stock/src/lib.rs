//! Trading-stance signals for a single ticker
//!
//! The crate pulls prices, financial ratios, insider trades, market cap and
//! line items from one of two providers and scores them:
//!
//! - Data retrieval from Yahoo Finance (primary) and Financial Datasets
//!   (secondary), normalized to the records in [`models`]
//! - A [`UnifiedFetcher`] that retries failed secondary calls against the
//!   primary source
//! - Pipeline stages: market data, fundamentals scoring, insider sentiment
//!
//! # Example
//!
//! ```rust,no_run
//! use agent_stock::{SignalRequest, StockConfig, UnifiedFetcher, build_signal_pipeline};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = StockConfig::builder().with_env_api_key().build()?;
//! let fetcher = Arc::new(UnifiedFetcher::from_config(&config)?);
//! let pipeline = build_signal_pipeline(fetcher, config)?;
//!
//! let state = pipeline.run(SignalRequest::new("AAPL").initial_state()).await?;
//! for message in state.messages() {
//!     println!("{}: {}", message.name, message.content);
//! }
//! # Ok(())
//! # }
//! ```

pub mod agents;
pub mod api;
pub mod config;
pub mod dates;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod pipeline;
pub mod reasoning;
pub mod scoring;

pub use agents::{FundamentalsStage, MarketDataStage, SentimentStage};
pub use api::{DataSourceAdapter, FinancialDatasetsClient, YahooFinanceClient};
pub use config::{DataSource, ReportPeriod, StockConfig};
pub use error::{Result, StockError};
pub use fetcher::{FallbackListener, FallbackNotice, FetchOperation, UnifiedFetcher};
pub use models::{FinancialMetrics, InsiderTrade, LineItemResult, PriceBar};
pub use pipeline::{SignalRequest, build_signal_pipeline};
pub use scoring::Signal;
