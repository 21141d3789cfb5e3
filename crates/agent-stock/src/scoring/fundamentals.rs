//! Threshold scoring of financial ratios plus a DCF valuation check

use serde_json::{Value, json};
use tracing::warn;

use super::{Signal, count, format_usd, majority};
use crate::error::{Result, StockError};
use crate::models::{FinancialMetrics, LineItemResult};

const DISCOUNT_RATE: f64 = 0.10;
const TERMINAL_GROWTH_RATE: f64 = 0.03;
const PROJECTION_YEARS: u32 = 5;

/// One scored category
#[derive(Debug, Clone, PartialEq)]
pub struct SubSignal {
    pub signal: Signal,
    pub details: String,
}

impl SubSignal {
    fn to_json(&self) -> Value {
        json!({ "signal": self.signal, "details": self.details })
    }
}

/// Result of scoring one set of fundamentals
#[derive(Debug, Clone, PartialEq)]
pub struct FundamentalsAnalysis {
    pub metrics: FinancialMetrics,
    pub profitability: SubSignal,
    pub growth: SubSignal,
    pub financial_health: SubSignal,
    pub price_ratios: SubSignal,
    pub intrinsic_value: SubSignal,
    pub intrinsic_value_estimate: f64,
    pub market_cap: f64,
    pub signal: Signal,
    pub confidence: f64,
}

/// Present value of `free_cash_flow` grown for `years` plus a terminal value
///
/// Returns 0 when there is no free cash flow.
pub fn calculate_intrinsic_value(
    free_cash_flow: f64,
    growth_rate: f64,
    discount_rate: f64,
    terminal_growth_rate: f64,
    years: u32,
) -> Result<f64> {
    if free_cash_flow == 0.0 {
        return Ok(0.0);
    }
    if years == 0 {
        return Err(StockError::Computation(
            "projection period must be at least one year".to_string(),
        ));
    }
    if discount_rate <= terminal_growth_rate {
        return Err(StockError::Computation(format!(
            "discount rate {discount_rate} must exceed terminal growth rate {terminal_growth_rate}"
        )));
    }

    let cash_flows: Vec<f64> = (0..years)
        .map(|i| free_cash_flow * (1.0 + growth_rate).powi(i as i32))
        .collect();

    let present_value: f64 = cash_flows
        .iter()
        .zip(1..)
        .map(|(cf, year)| cf / (1.0 + discount_rate).powi(year))
        .sum();

    let last = cash_flows.last().copied().unwrap_or_default();
    let terminal_value =
        last * (1.0 + terminal_growth_rate) / (discount_rate - terminal_growth_rate);
    let terminal_present_value = terminal_value / (1.0 + discount_rate).powi(years as i32);

    let value = present_value + terminal_present_value;
    if !value.is_finite() {
        return Err(StockError::Computation(format!(
            "intrinsic value is not finite (fcf {free_cash_flow}, growth {growth_rate})"
        )));
    }
    Ok(value)
}

fn score(checks: [bool; 3]) -> Signal {
    Signal::from_score(checks.iter().filter(|passed| **passed).count() as u8)
}

fn pct(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

/// Score profitability, growth, health, price ratios and intrinsic value
pub fn analyze_fundamentals(
    metrics: &FinancialMetrics,
    line_item: &LineItemResult,
    market_cap: f64,
) -> FundamentalsAnalysis {
    let m = metrics;

    let profitability = SubSignal {
        signal: score([
            m.return_on_equity > 0.15,
            m.net_margin > 0.20,
            m.operating_margin > 0.15,
        ]),
        details: format!(
            "ROE: {}, Net Margin: {}, Op Margin: {}",
            pct(m.return_on_equity),
            pct(m.net_margin),
            pct(m.operating_margin)
        ),
    };

    let growth = SubSignal {
        signal: score([
            m.revenue_growth > 0.10,
            m.earnings_growth > 0.10,
            m.book_value_growth > 0.10,
        ]),
        details: format!(
            "Revenue Growth: {}, Earnings Growth: {}",
            pct(m.revenue_growth),
            pct(m.earnings_growth)
        ),
    };

    let financial_health = SubSignal {
        signal: score([
            m.current_ratio > 1.5,
            m.debt_to_equity < 0.5,
            m.free_cash_flow_per_share > m.earnings_per_share * 0.8,
        ]),
        details: format!(
            "Current Ratio: {:.2}, D/E: {:.2}",
            m.current_ratio, m.debt_to_equity
        ),
    };

    let price_ratios = SubSignal {
        signal: score([
            m.price_to_earnings_ratio < 25.0,
            m.price_to_book_ratio < 3.0,
            m.price_to_sales_ratio < 5.0,
        ]),
        details: format!(
            "P/E: {:.2}, P/B: {:.2}, P/S: {:.2}",
            m.price_to_earnings_ratio, m.price_to_book_ratio, m.price_to_sales_ratio
        ),
    };

    let intrinsic_value_estimate = calculate_intrinsic_value(
        line_item.get("free_cash_flow"),
        m.earnings_growth,
        DISCOUNT_RATE,
        TERMINAL_GROWTH_RATE,
        PROJECTION_YEARS,
    )
    .unwrap_or_else(|e| {
        warn!("Error calculating intrinsic value: {e}");
        0.0
    });

    let intrinsic_value = SubSignal {
        signal: if market_cap < intrinsic_value_estimate {
            Signal::Bullish
        } else {
            Signal::Bearish
        },
        details: format!(
            "Intrinsic Value: {}, Market Cap: {}",
            format_usd(intrinsic_value_estimate),
            format_usd(market_cap)
        ),
    };

    let signals = [
        profitability.signal,
        growth.signal,
        financial_health.signal,
        price_ratios.signal,
        intrinsic_value.signal,
    ];
    let (signal, confidence) = majority(&signals);

    FundamentalsAnalysis {
        metrics: metrics.clone(),
        profitability,
        growth,
        financial_health,
        price_ratios,
        intrinsic_value,
        intrinsic_value_estimate,
        market_cap,
        signal,
        confidence,
    }
}

impl FundamentalsAnalysis {
    /// Category signals in scoring order
    pub fn signals(&self) -> [Signal; 5] {
        [
            self.profitability.signal,
            self.growth.signal,
            self.financial_health.signal,
            self.price_ratios.signal,
            self.intrinsic_value.signal,
        ]
    }

    /// Message payload: `{signal, confidence, reasoning}`
    pub fn to_content(&self) -> Value {
        json!({
            "signal": self.signal,
            "confidence": self.confidence,
            "reasoning": {
                "Profitability": self.profitability.to_json(),
                "Growth": self.growth.to_json(),
                "Financial_Health": self.financial_health.to_json(),
                "Price_Ratios": self.price_ratios.to_json(),
                "Intrinsic_Value": self.intrinsic_value.to_json(),
            }
        })
    }

    /// Human-readable summary printed when reasoning is shown
    pub fn summary(&self) -> String {
        let m = &self.metrics;
        let signals = self.signals();

        let lines = [
            format!(
                "Profitability analysis shows {} indicators with Return on Equity at {:.1}%, Net Margin at {:.1}%, and Operating Margin at {:.1}%.",
                self.profitability.signal,
                m.return_on_equity * 100.0,
                m.net_margin * 100.0,
                m.operating_margin * 100.0
            ),
            format!(
                "Growth metrics indicate {} performance with Revenue Growth at {:.1}% and Earnings Growth at {:.1}%.",
                self.growth.signal,
                m.revenue_growth * 100.0,
                m.earnings_growth * 100.0
            ),
            format!(
                "Financial health is {} with Current Ratio at {:.2} and Debt-to-Equity at {:.2}.",
                self.financial_health.signal, m.current_ratio, m.debt_to_equity
            ),
            format!(
                "Valuation metrics are {} with P/E at {:.2}, P/B at {:.2}, and P/S at {:.2}.",
                self.price_ratios.signal,
                m.price_to_earnings_ratio,
                m.price_to_book_ratio,
                m.price_to_sales_ratio
            ),
            format!(
                "\nOverall Analysis: Found {} bullish, {} bearish, and {} neutral indicators. \
                 The analysis suggests a {} stance with {:.0}% confidence based on the \
                 comprehensive evaluation of profitability, growth, financial health, and valuation metrics.",
                count(&signals, Signal::Bullish),
                count(&signals, Signal::Bearish),
                count(&signals, Signal::Neutral),
                self.signal,
                self.confidence * 100.0
            ),
        ];

        lines.join("\n")
    }
}
