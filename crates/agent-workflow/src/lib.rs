//! Stage orchestration for agent pipelines
//!
//! A [`Pipeline`] runs stages in order, folding each stage's delta into the
//! running state before the next step sees it.

pub mod pipeline;
pub mod pipeline_stage;

// Re-export for convenience
pub use pipeline::{Pipeline, PipelineBuilder, PipelineStep};
pub use pipeline_stage::PipelineStage;
