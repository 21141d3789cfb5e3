//! Pipeline stage implementation (wraps a pipeline as a stage)

use crate::pipeline::Pipeline;
use agent_core::{AgentState, Result, Stage, StateDelta};
use async_trait::async_trait;

/// Wraps a Pipeline as a Stage
///
/// The wrapped pipeline runs against the outer state and its combined delta
/// becomes the stage's delta, so nesting is transparent to the parent.
///
/// # Example
///
/// ```no_run
/// use agent_workflow::{Pipeline, PipelineStage};
/// use std::sync::Arc;
///
/// # fn example(a: Arc<dyn agent_core::Stage>, b: Arc<dyn agent_core::Stage>) -> agent_core::Result<()> {
/// let scoring = Pipeline::builder("scoring").add_stage(a).build()?;
///
/// let _outer = Pipeline::builder("outer")
///     .add_stage(Arc::new(PipelineStage::new("scoring", scoring)))
///     .add_stage(b)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct PipelineStage {
    pipeline: Pipeline,
    name: String,
}

impl PipelineStage {
    pub fn new(name: impl Into<String>, pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            name: name.into(),
        }
    }

    /// Get a reference to the underlying pipeline
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

#[async_trait]
impl Stage for PipelineStage {
    async fn run(&self, state: &AgentState) -> Result<StateDelta> {
        self.pipeline.run_delta(state).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
