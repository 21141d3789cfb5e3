//! Command-line interface for trading-stance signals

use agent_core::{AgentState, keys};
use agent_stock::{DataSource, SignalRequest, StockConfig, UnifiedFetcher, build_signal_pipeline};
use agent_utils::{LogFormat, init_tracing};
use chrono::NaiveDate;
use clap::Parser;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

const DEFAULT_LOG_FILTER: &str = "warn,agent_stock=info,agent_workflow=info";

#[derive(Parser, Debug)]
#[command(name = "stance")]
#[command(about = "Compute a bullish/bearish/neutral stance for a stock", long_about = None)]
struct Args {
    /// Ticker symbol, e.g. AAPL
    #[arg(short, long)]
    ticker: String,

    /// Start date (YYYY-MM-DD); defaults to three months before the end date
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// End date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Data source: yahoo/primary or financialdatasets/secondary
    #[arg(long)]
    data_source: Option<DataSource>,

    /// Print per-stage summaries
    #[arg(long)]
    show_reasoning: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn request(&self) -> SignalRequest {
        SignalRequest {
            ticker: self.ticker.trim().to_uppercase(),
            start_date: self.start_date,
            end_date: self.end_date,
            data_source: self.data_source,
            show_reasoning: self.show_reasoning,
        }
    }
}

/// Final report: run details plus every stage message
fn render_output(state: &AgentState) -> Value {
    json!({
        "run_id": state.run_id(),
        "ticker": state.get(keys::TICKER),
        "start_date": state.get(keys::START_DATE),
        "end_date": state.get(keys::END_DATE),
        "data_source": state.get(keys::DATA_SOURCE),
        "messages": state.messages(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let format = if args.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_tracing(DEFAULT_LOG_FILTER, format);

    let mut builder = StockConfig::builder().with_env_api_key();
    if let Some(source) = args.data_source {
        builder = builder.data_source(source);
    }
    let config = builder.build()?;

    let fetcher = Arc::new(UnifiedFetcher::from_config(&config)?);
    let pipeline = build_signal_pipeline(fetcher, config)?;

    let request = args.request();
    info!("Starting signal run for {}", request.ticker);

    let state = pipeline.run(request.initial_state()).await?;
    println!("{}", serde_json::to_string_pretty(&render_output(&state))?);

    Ok(())
}
