//! Normalized market data records shared by every provider

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One daily price bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Sort bars by date and drop repeated dates, keeping the first occurrence
pub fn normalize_price_bars(mut bars: Vec<PriceBar>) -> Vec<PriceBar> {
    bars.sort_by_key(|bar| bar.date);
    bars.dedup_by_key(|bar| bar.date);
    bars
}

/// Trailing financial ratios for one report period
///
/// Every field defaults to 0 when the provider omits it or sends `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialMetrics {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub return_on_equity: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub net_margin: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub operating_margin: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub revenue_growth: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub earnings_growth: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub book_value_growth: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub current_ratio: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub debt_to_equity: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub free_cash_flow_per_share: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub earnings_per_share: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price_to_earnings_ratio: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price_to_book_ratio: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price_to_sales_ratio: f64,
}

/// A single insider transaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsiderTrade {
    /// Positive for a purchase, negative for a sale
    #[serde(default, deserialize_with = "lenient_f64")]
    pub transaction_shares: f64,
    #[serde(default, deserialize_with = "lenient_date")]
    pub transaction_date: Option<NaiveDate>,
    #[serde(default, alias = "name")]
    pub insider_name: Option<String>,
    #[serde(default)]
    pub transaction_type: Option<String>,
}

/// Requested line items for one report period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineItemResult(BTreeMap<String, f64>);

impl LineItemResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a provider record, keeping only the requested names
    pub fn from_record(record: &Value, requested: &[String]) -> Self {
        let values = requested
            .iter()
            .map(|name| (name.clone(), coerce_f64(record.get(name))))
            .collect();
        Self(values)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    /// Value for `name`, 0 when absent
    pub fn get(&self, name: &str) -> f64 {
        self.0.get(name).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Coerce a JSON value to `f64`
///
/// Numbers pass through, numeric strings are parsed, Yahoo-style
/// `{"raw": n, "fmt": "..."}` objects use `raw`; anything else is 0.
pub fn coerce_f64(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        Some(Value::Object(obj)) => coerce_f64(obj.get("raw")),
        _ => 0.0,
    }
}

/// Parse the leading `YYYY-MM-DD` of a date or timestamp string
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    value
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(coerce_f64(value.as_ref()))
}

pub(crate) fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(parse_iso_date))
}
