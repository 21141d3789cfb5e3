//! Core abstractions for agent pipelines
//!
//! This crate defines the shared state record, the reducers that merge stage
//! output into it, and the `Stage` trait every analysis step implements.

pub mod error;
pub mod merge;
pub mod stage;
pub mod state;

pub use error::{Error, Result};
pub use merge::{StateMap, merge_maps, merge_messages};
pub use stage::Stage;
pub use state::{AgentMessage, AgentState, StateDelta, keys};
