//! Reducers used to fold stage output into the running state
//!
//! Both operators are pure: they never mutate their inputs, so deltas produced
//! by independent stages can be combined in any grouping.

use serde_json::{Map, Value};

use crate::state::AgentMessage;

/// String-keyed JSON store used for `data` and `metadata`
pub type StateMap = Map<String, Value>;

/// Merge two key-value maps.
///
/// The result holds the union of both key sets. Where a key appears on both
/// sides the value from `right` replaces the one from `left` entirely (no deep
/// merge of nested objects).
pub fn merge_maps(left: &StateMap, right: &StateMap) -> StateMap {
    let mut merged = left.clone();
    for (key, value) in right {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Concatenate two message sequences, `left` first.
pub fn merge_messages(left: &[AgentMessage], right: &[AgentMessage]) -> Vec<AgentMessage> {
    let mut merged = Vec::with_capacity(left.len() + right.len());
    merged.extend_from_slice(left);
    merged.extend_from_slice(right);
    merged
}
