//! Core Stage trait definition

use crate::{AgentState, Result, StateDelta};
use async_trait::async_trait;

/// One step of an analysis pipeline
///
/// A stage sees the full state accumulated so far and returns only what it
/// adds or changes. It never writes to the state it is given; the pipeline
/// owns the merge.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Run the stage against the current state
    async fn run(&self, state: &AgentState) -> Result<StateDelta>;

    /// Get the stage's name
    fn name(&self) -> &str;
}
