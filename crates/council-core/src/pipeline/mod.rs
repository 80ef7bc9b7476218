//! Three-stage Planner → Worker → Validator pipeline.
//!
//! Each stage validates the data it hands on. A contract violation stops the
//! run and is returned to the caller with the stage that produced it.

pub mod planner;
pub mod validator;
pub mod worker;

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, Instrument};

use crate::domain::{AgentResult, CouncilError, Intent, Result, ResultStatus, TaskSpec};
use crate::meeting::SynthesisResult;
use crate::trace::{with_context, TraceContext};

pub use planner::{CompletionPlanner, Planner, TemplatePlanner};
pub use validator::{assess_criteria, review, validate_result, CriterionCheck};
pub use worker::{SimulatedWorker, Worker};

/// Everything a pipeline run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub trace_id: String,
    pub spec: TaskSpec,
    pub result: AgentResult,
    pub criteria: Vec<CriterionCheck>,
}

impl PipelineReport {
    /// Express the run in the plan/tasks/verdict shape used for tracker comments.
    pub fn as_plan(&self) -> SynthesisResult {
        let tasks = self
            .spec
            .criteria()
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {c}", i + 1))
            .collect::<Vec<_>>();
        let risk_verdict = match self.result.status {
            ResultStatus::Failure => "HIGH — worker reported failure".to_string(),
            _ if self.criteria.iter().any(|c| !c.supported) => {
                "MEDIUM — some acceptance criteria lack evidence".to_string()
            }
            _ => "LOW — all checks passed".to_string(),
        };
        SynthesisResult {
            plan: self.spec.summary.clone(),
            atomic_tasks: if tasks.is_empty() {
                "No acceptance criteria derived.".to_string()
            } else {
                tasks.join("\n")
            },
            risk_verdict,
        }
    }
}

#[derive(Clone)]
pub struct AgentPipeline {
    planner: Arc<dyn Planner>,
    worker: Arc<dyn Worker>,
}

impl AgentPipeline {
    pub fn new(planner: Arc<dyn Planner>, worker: Arc<dyn Worker>) -> Self {
        Self { planner, worker }
    }

    /// Template planner and simulated worker.
    pub fn simulated() -> Self {
        Self::new(Arc::new(TemplatePlanner::new()), Arc::new(SimulatedWorker::new()))
    }

    pub async fn execute(
        &self,
        ctx: &TraceContext,
        intent: Intent,
        description: &str,
        memory_context: &str,
    ) -> Result<PipelineReport> {
        async {
            let spec = with_context(ctx, "Agent: Planner", async {
                let spec = self.planner.plan(intent, description, memory_context).await?;
                spec.validate()
                    .map_err(|e| CouncilError::contract(planner::PLANNER_STAGE, e))?;
                Ok::<_, CouncilError>(spec)
            })
            .await?;

            let worked = with_context(ctx, "Agent: Worker", async {
                let result = self.worker.execute(&spec).await?;
                result
                    .validate()
                    .map_err(|e| CouncilError::contract(worker::WORKER_STAGE, e))?;
                Ok::<_, CouncilError>(result)
            })
            .await?;

            let (result, criteria) =
                with_context(ctx, "Agent: Validator", async { review(&spec, &worked) }).await?;

            info!(
                event = "pipeline.completed",
                trace_id = %ctx.id(),
                status = %result.status
            );
            Ok::<_, CouncilError>(PipelineReport {
                trace_id: ctx.id().to_string(),
                spec,
                result,
                criteria,
            })
        }
        .instrument(ctx.span("Pipeline"))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::Origin;

    #[tokio::test]
    async fn simulated_pipeline_succeeds_with_evidence_for_every_criterion() {
        let ctx = TraceContext::new(Origin::Internal);
        let report = AgentPipeline::simulated()
            .execute(&ctx, Intent::Build, "add dark mode toggle", "")
            .await
            .unwrap();
        assert_eq!(report.result.status, ResultStatus::Success);
        assert!(report.result.summary.ends_with("(Validated)"));
        assert!(report.criteria.iter().all(|c| c.supported));
        assert_eq!(report.trace_id, ctx.id());
        assert!(report.as_plan().risk_verdict.starts_with("LOW"));
    }

    #[tokio::test]
    async fn unknown_intent_surfaces_as_failure_not_error() {
        let ctx = TraceContext::new(Origin::Internal);
        let report = AgentPipeline::simulated()
            .execute(&ctx, Intent::Unknown, "whatever", "")
            .await
            .unwrap();
        assert_eq!(report.result.status, ResultStatus::Failure);
        assert!(report.as_plan().risk_verdict.starts_with("HIGH"));
    }
}
