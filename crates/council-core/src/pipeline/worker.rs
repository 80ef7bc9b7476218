//! Worker stage: carry out a [`TaskSpec`] and report what was done.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::{AgentResult, CouncilError, Intent, ResultStatus, Result, TaskSpec};

pub const WORKER_STAGE: &str = "worker";

#[async_trait]
pub trait Worker: Send + Sync {
    async fn execute(&self, spec: &TaskSpec) -> Result<AgentResult>;
}

/// Worker that performs no side effects and describes the work it would do.
#[derive(Debug, Clone, Default)]
pub struct SimulatedWorker {
    link: Option<String>,
}

impl SimulatedWorker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link reported in the result, e.g. the issue the run was filed under.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

#[async_trait]
impl Worker for SimulatedWorker {
    async fn execute(&self, spec: &TaskSpec) -> Result<AgentResult> {
        if spec.intent == Intent::Unknown {
            warn!(event = "worker.refused", summary = %spec.summary, "intent not actionable");
            let result = AgentResult {
                status: ResultStatus::Failure,
                summary: "Cannot execute a task without a recognised intent.".to_string(),
                actions_taken: vec!["Verified inputs".to_string()],
                links: None,
                next_steps: Some(vec!["Resubmit with a SAFE, BUILD or BUG prefix".to_string()]),
            };
            result
                .validate()
                .map_err(|e| CouncilError::contract(WORKER_STAGE, e))?;
            return Ok(result);
        }

        let mut actions = vec!["Verified inputs".to_string()];
        if let Some(files) = &spec.files {
            actions.extend(files.iter().map(|f| format!("Simulated changes to {f}")));
        } else {
            actions.push("Simulated file changes".to_string());
        }
        if let Some(constraints) = &spec.constraints {
            actions.extend(constraints.iter().map(|c| format!("Respected constraint: {c}")));
        }
        actions.extend(
            spec.criteria()
                .iter()
                .map(|c| format!("Addressed criterion: {c}")),
        );

        let result = AgentResult {
            status: ResultStatus::Success,
            summary: format!("Completed simulated execution for {}.", spec.intent),
            actions_taken: actions,
            links: self.link.clone().map(|l| vec![l]),
            next_steps: Some(vec![
                "Await code review".to_string(),
                "Deploy to staging".to_string(),
            ]),
        };
        result
            .validate()
            .map_err(|e| CouncilError::contract(WORKER_STAGE, e))?;
        info!(
            event = "worker.executed",
            actions = result.actions_taken.len(),
            status = %result.status
        );
        Ok(result)
    }
}
