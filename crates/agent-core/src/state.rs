//! Shared state threaded through pipeline stages
//!
//! `AgentState` is never mutated in place by a stage. A stage reads the state
//! it is handed and returns a [`StateDelta`]; the pipeline folds that delta in
//! with [`AgentState::apply`], producing the next state.
//!
//! # Example
//!
//! ```
//! use agent_core::{AgentMessage, AgentState, StateDelta};
//! use serde_json::json;
//!
//! let state = AgentState::new()
//!     .with_data("ticker", json!("AAPL"))
//!     .with_show_reasoning(false);
//!
//! let delta = StateDelta::new()
//!     .with_data("market_cap", json!(2.5e12))
//!     .with_message(AgentMessage::new("example", json!({"ok": true})));
//!
//! let next = state.apply(&delta);
//! assert_eq!(next.ticker().unwrap(), "AAPL");
//! assert_eq!(next.messages().len(), 1);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::merge::{StateMap, merge_maps, merge_messages};
use crate::{Error, Result};

/// Well-known state keys
pub mod keys {
    /// Ticker symbol under analysis (`data`)
    pub const TICKER: &str = "ticker";
    /// Start of the price window, ISO date (`data`)
    pub const START_DATE: &str = "start_date";
    /// End of the price window, ISO date (`data`)
    pub const END_DATE: &str = "end_date";
    /// Selected upstream source (`data`)
    pub const DATA_SOURCE: &str = "data_source";
    /// Whether stages print human-readable summaries (`metadata`)
    pub const SHOW_REASONING: &str = "show_reasoning";
    /// Identifier of the current pipeline run (`metadata`)
    pub const RUN_ID: &str = "run_id";
}

/// Output of one analysis stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Name of the stage that produced the message
    pub name: String,
    /// Structured payload
    pub content: Value,
}

impl AgentMessage {
    pub fn new(name: impl Into<String>, content: Value) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }

    /// Deserialize the payload into a concrete type
    pub fn content_typed<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        serde_json::from_value(self.content.clone())
            .map_err(|e| Error::State(format!("Failed to deserialize message content: {e}")))
    }
}

/// The record every stage reads from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    messages: Vec<AgentMessage>,
    data: StateMap,
    metadata: StateMap,
}

impl AgentState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    // =========== Builder Methods ===========

    /// Seed a `data` entry
    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Seed a `metadata` entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Set the `show_reasoning` flag
    pub fn with_show_reasoning(self, show: bool) -> Self {
        self.with_metadata(keys::SHOW_REASONING, Value::Bool(show))
    }

    // =========== Merging ===========

    /// Fold a stage delta into this state, returning the new state
    pub fn apply(&self, delta: &StateDelta) -> AgentState {
        AgentState {
            messages: merge_messages(&self.messages, &delta.messages),
            data: merge_maps(&self.data, &delta.data),
            metadata: merge_maps(&self.metadata, &delta.metadata),
        }
    }

    /// Merge two whole states; `other` wins on overlapping keys
    pub fn merge(&self, other: &AgentState) -> AgentState {
        AgentState {
            messages: merge_messages(&self.messages, &other.messages),
            data: merge_maps(&self.data, &other.data),
            metadata: merge_maps(&self.metadata, &other.metadata),
        }
    }

    // =========== Accessors ===========

    pub fn messages(&self) -> &[AgentMessage] {
        &self.messages
    }

    pub fn data(&self) -> &StateMap {
        &self.data
    }

    pub fn metadata(&self) -> &StateMap {
        &self.metadata
    }

    /// Latest message produced by the named stage
    pub fn last_message_from(&self, name: &str) -> Option<&AgentMessage> {
        self.messages.iter().rev().find(|m| m.name == name)
    }

    /// Get a raw `data` value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Get a `data` value deserialized into `T`
    ///
    /// Returns `Ok(None)` when the key is absent or explicitly `null`.
    pub fn get_typed<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<Option<T>> {
        match self.data.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => {
                let typed = serde_json::from_value(value.clone()).map_err(|e| {
                    Error::State(format!("Failed to deserialize data key '{key}': {e}"))
                })?;
                Ok(Some(typed))
            }
        }
    }

    /// Like [`get_typed`](Self::get_typed) but a missing key is an error
    pub fn require<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<T> {
        self.get_typed(key)?
            .ok_or_else(|| Error::MissingKey(key.to_string()))
    }

    /// Get a `metadata` value
    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Ticker under analysis
    pub fn ticker(&self) -> Result<String> {
        let ticker: String = self.require(keys::TICKER)?;
        if ticker.trim().is_empty() {
            return Err(Error::State("ticker must not be empty".to_string()));
        }
        Ok(ticker)
    }

    /// `show_reasoning` flag, `false` when unset
    pub fn show_reasoning(&self) -> bool {
        self.get_metadata(keys::SHOW_REASONING)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Run identifier, if the pipeline assigned one
    pub fn run_id(&self) -> Option<&str> {
        self.get_metadata(keys::RUN_ID).and_then(Value::as_str)
    }
}

/// Changes a stage contributes to the state
///
/// Deltas combine with the same operators as whole states, so
/// `StateDelta::default()` is the identity and `merge` is associative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDelta {
    messages: Vec<AgentMessage>,
    data: StateMap,
    metadata: StateMap,
}

impl StateDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or overwrite a `data` key
    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Add or overwrite a `data` key from any serializable value
    pub fn with_data_typed<T: Serialize>(self, key: impl Into<String>, value: &T) -> Result<Self> {
        let key = key.into();
        let json_value = serde_json::to_value(value)
            .map_err(|e| Error::State(format!("Failed to serialize data key '{key}': {e}")))?;
        Ok(self.with_data(key, json_value))
    }

    /// Add or overwrite a `metadata` key
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Append a message
    pub fn with_message(mut self, message: AgentMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Combine two deltas; `other` is treated as the later contribution
    pub fn merge(&self, other: &StateDelta) -> StateDelta {
        StateDelta {
            messages: merge_messages(&self.messages, &other.messages),
            data: merge_maps(&self.data, &other.data),
            metadata: merge_maps(&self.metadata, &other.metadata),
        }
    }

    pub fn messages(&self) -> &[AgentMessage] {
        &self.messages
    }

    pub fn data(&self) -> &StateMap {
        &self.data
    }

    pub fn metadata(&self) -> &StateMap {
        &self.metadata
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.data.is_empty() && self.metadata.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Bar {
        close: f64,
    }

    #[test]
    fn test_apply_keeps_existing_keys() {
        let state = AgentState::new()
            .with_data("ticker", json!("AAPL"))
            .with_data("end_date", json!("2024-01-15"));
        let delta = StateDelta::new().with_data("market_cap", json!(1.0));

        let next = state.apply(&delta);
        assert_eq!(next.get("ticker"), Some(&json!("AAPL")));
        assert_eq!(next.get("end_date"), Some(&json!("2024-01-15")));
        assert_eq!(next.get("market_cap"), Some(&json!(1.0)));
        // input untouched
        assert!(state.get("market_cap").is_none());
    }

    #[test]
    fn test_apply_overwrites_same_key() {
        let state = AgentState::new().with_data("end_date", json!(null));
        let delta = StateDelta::new().with_data("end_date", json!("2024-01-15"));

        let next = state.apply(&delta);
        assert_eq!(next.get("end_date"), Some(&json!("2024-01-15")));
    }

    #[test]
    fn test_messages_append_in_stage_order() {
        let state = AgentState::new();
        let first = StateDelta::new().with_message(AgentMessage::new("a", json!(1)));
        let second = StateDelta::new().with_message(AgentMessage::new("b", json!(2)));

        let next = state.apply(&first).apply(&second);
        let names: Vec<_> = next.messages().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn test_delta_merge_associative() {
        let a = StateDelta::new()
            .with_data("x", json!(1))
            .with_message(AgentMessage::new("a", json!(null)));
        let b = StateDelta::new()
            .with_data("x", json!(2))
            .with_metadata("m", json!(true))
            .with_message(AgentMessage::new("b", json!(null)));
        let c = StateDelta::new()
            .with_data("y", json!(3))
            .with_message(AgentMessage::new("c", json!(null)));

        assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
    }

    #[test]
    fn test_delta_identity() {
        let a = StateDelta::new()
            .with_data("x", json!(1))
            .with_message(AgentMessage::new("a", json!(null)));
        let empty = StateDelta::default();

        assert_eq!(a.merge(&empty), a);
        assert_eq!(empty.merge(&a), a);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_applying_merged_delta_equals_sequential_apply() {
        let state = AgentState::new().with_data("ticker", json!("MSFT"));
        let a = StateDelta::new().with_data("prices", json!([]));
        let b = StateDelta::new().with_message(AgentMessage::new("b", json!({})));

        assert_eq!(state.apply(&a).apply(&b), state.apply(&a.merge(&b)));
    }

    #[test]
    fn test_state_merge_right_wins() {
        let left = AgentState::new().with_data("x", json!(1)).with_show_reasoning(false);
        let right = AgentState::new().with_data("x", json!(2)).with_show_reasoning(true);

        let merged = left.merge(&right);
        assert_eq!(merged.get("x"), Some(&json!(2)));
        assert!(merged.show_reasoning());
    }

    #[test]
    fn test_typed_accessors() {
        let state = AgentState::new()
            .with_data("ticker", json!("NVDA"))
            .with_data("prices", json!([{"close": 1.5}]))
            .with_data("start_date", json!(null));

        assert_eq!(state.ticker().unwrap(), "NVDA");
        let bars: Vec<Bar> = state.require("prices").unwrap();
        assert_eq!(bars, vec![Bar { close: 1.5 }]);
        let start: Option<String> = state.get_typed("start_date").unwrap();
        assert!(start.is_none());
    }

    #[test]
    fn test_require_missing_key() {
        let state = AgentState::new();
        let err = state.require::<f64>("market_cap").unwrap_err();
        assert!(matches!(err, Error::MissingKey(key) if key == "market_cap"));
    }

    #[test]
    fn test_get_typed_wrong_shape() {
        let state = AgentState::new().with_data("market_cap", json!("lots"));
        assert!(state.get_typed::<f64>("market_cap").is_err());
    }

    #[test]
    fn test_empty_ticker_rejected() {
        let state = AgentState::new().with_data("ticker", json!("  "));
        assert!(state.ticker().is_err());
    }

    #[test]
    fn test_show_reasoning_defaults_false() {
        assert!(!AgentState::new().show_reasoning());
        assert!(AgentState::new().with_show_reasoning(true).show_reasoning());
    }

    #[test]
    fn test_last_message_from() {
        let state = AgentState::new().apply(
            &StateDelta::new()
                .with_message(AgentMessage::new("sentiment_agent", json!({"n": 1})))
                .with_message(AgentMessage::new("sentiment_agent", json!({"n": 2}))),
        );
        let msg = state.last_message_from("sentiment_agent").unwrap();
        assert_eq!(msg.content, json!({"n": 2}));
        assert!(state.last_message_from("missing").is_none());
    }
}
