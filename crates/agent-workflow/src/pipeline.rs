//! Pipeline definition and execution

use agent_core::{AgentState, Error, Result, Stage, StateDelta, keys};
use futures::future::try_join_all;
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, error, info, info_span};

/// A step in a pipeline
#[derive(Clone)]
pub enum PipelineStep {
    /// Run a single stage
    Stage(Arc<dyn Stage>),
    /// Run several stages against the same state
    ///
    /// The stages must not depend on each other's output. Their deltas are
    /// merged in the order the stages were declared, so the result is the same
    /// as running them one after another.
    Parallel(Vec<Arc<dyn Stage>>),
    /// Run a nested pipeline
    SubPipeline(Arc<Pipeline>),
}

/// An ordered sequence of stages sharing one state
///
/// Each step sees the state produced by every step before it. Stages only
/// return deltas; the pipeline applies them, so a stage can never drop a key
/// another stage wrote.
///
/// # Example
///
/// ```no_run
/// use agent_core::AgentState;
/// use agent_workflow::Pipeline;
/// use std::sync::Arc;
///
/// # async fn example(fetch: Arc<dyn agent_core::Stage>, score: Arc<dyn agent_core::Stage>) -> agent_core::Result<()> {
/// let pipeline = Pipeline::builder("signal")
///     .add_stage(fetch)
///     .add_stage(score)
///     .build()?;
///
/// let state = pipeline.run(AgentState::new()).await?;
/// println!("{} messages", state.messages().len());
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    name: String,
    steps: Vec<PipelineStep>,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// Execute the pipeline and return the final state
    ///
    /// A `run_id` is added to the metadata unless the caller already set one.
    /// The first failing step aborts the run; no partial state is returned.
    pub async fn run(&self, initial: AgentState) -> Result<AgentState> {
        let initial = match initial.run_id() {
            Some(_) => initial,
            None => initial.with_metadata(keys::RUN_ID, json!(uuid::Uuid::new_v4().to_string())),
        };
        let run_id = initial.run_id().unwrap_or_default().to_string();

        let span = info_span!("pipeline", name = %self.name, run_id = %run_id);
        let delta = self.run_delta(&initial).instrument(span).await?;
        Ok(initial.apply(&delta))
    }

    /// Execute the pipeline and return only what it added
    pub fn run_delta<'a>(
        &'a self,
        state: &'a AgentState,
    ) -> Pin<Box<dyn Future<Output = Result<StateDelta>> + Send + 'a>> {
        Box::pin(async move {
            let mut current = state.clone();
            let mut total = StateDelta::new();

            for step in &self.steps {
                let delta = match step {
                    PipelineStep::Stage(stage) => run_stage(stage.as_ref(), &current).await?,
                    PipelineStep::Parallel(stages) => {
                        let deltas = try_join_all(
                            stages.iter().map(|stage| run_stage(stage.as_ref(), &current)),
                        )
                        .await?;
                        deltas
                            .iter()
                            .fold(StateDelta::new(), |acc, delta| acc.merge(delta))
                    }
                    PipelineStep::SubPipeline(pipeline) => {
                        debug!("Entering sub-pipeline {}", pipeline.name());
                        pipeline.run_delta(&current).await?
                    }
                };

                current = current.apply(&delta);
                total = total.merge(&delta);
            }

            Ok(total)
        })
    }
}

async fn run_stage(stage: &dyn Stage, state: &AgentState) -> Result<StateDelta> {
    let started = Instant::now();
    info!("Running stage {}", stage.name());

    match stage.run(state).await {
        Ok(delta) => {
            debug!(
                "Stage {} finished in {:?}: {} data key(s), {} message(s)",
                stage.name(),
                started.elapsed(),
                delta.data().len(),
                delta.messages().len()
            );
            Ok(delta)
        }
        Err(e) => {
            error!("Stage {} failed: {}", stage.name(), e);
            Err(match e {
                Error::StageFailed { .. } => e,
                other => Error::StageFailed {
                    stage: stage.name().to_string(),
                    reason: other.to_string(),
                },
            })
        }
    }
}

/// Builder for constructing pipelines
pub struct PipelineBuilder {
    name: String,
    steps: Vec<PipelineStep>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a stage
    pub fn add_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.steps.push(PipelineStep::Stage(stage));
        self
    }

    /// Append a group of independent stages
    pub fn add_parallel(mut self, stages: Vec<Arc<dyn Stage>>) -> Self {
        self.steps.push(PipelineStep::Parallel(stages));
        self
    }

    /// Append a nested pipeline
    pub fn add_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.steps.push(PipelineStep::SubPipeline(Arc::new(pipeline)));
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Result<Pipeline> {
        let has_empty_group = self
            .steps
            .iter()
            .any(|step| matches!(step, PipelineStep::Parallel(stages) if stages.is_empty()));
        if has_empty_group {
            return Err(Error::Generic(format!(
                "Pipeline '{}' has an empty parallel group",
                self.name
            )));
        }

        Ok(Pipeline {
            name: self.name,
            steps: self.steps,
        })
    }
}
