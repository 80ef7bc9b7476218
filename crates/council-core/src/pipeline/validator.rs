//! Validator stage: check a worker's result against the task's acceptance
//! criteria and stamp the final status.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{AgentResult, CouncilError, ResultStatus, Result, TaskSpec};
use crate::memory::keyword_overlap;

pub const VALIDATOR_STAGE: &str = "validator";

/// Minimum share of a criterion's words that must appear in the actions.
const EVIDENCE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionCheck {
    pub criterion: String,
    pub supported: bool,
}

/// Look for evidence of each criterion in the worker's actions.
pub fn assess_criteria(spec: &TaskSpec, worker_result: &AgentResult) -> Vec<CriterionCheck> {
    let criteria = spec.criteria();
    if criteria.is_empty() {
        warn!(event = "validator.no_criteria", "task carries no acceptance criteria");
        return Vec::new();
    }

    let evidence = worker_result.actions_taken.join("\n");
    criteria
        .iter()
        .map(|criterion| {
            let supported = keyword_overlap(criterion, &evidence) >= EVIDENCE_THRESHOLD;
            if !supported {
                warn!(event = "validator.unsupported", criterion = %criterion);
            }
            CriterionCheck {
                criterion: criterion.clone(),
                supported,
            }
        })
        .collect()
}

/// Produce the final result. Never upgrades a FAILURE.
pub fn validate_result(spec: &TaskSpec, worker_result: &AgentResult) -> Result<AgentResult> {
    review(spec, worker_result).map(|(result, _)| result)
}

/// [`validate_result`] plus the per-criterion checks it was based on.
pub fn review(
    spec: &TaskSpec,
    worker_result: &AgentResult,
) -> Result<(AgentResult, Vec<CriterionCheck>)> {
    let checks = assess_criteria(spec, worker_result);
    let supported = checks.iter().filter(|c| c.supported).count();

    let status = match worker_result.status {
        ResultStatus::Failure => ResultStatus::Failure,
        ResultStatus::Success | ResultStatus::NeedsReview => ResultStatus::Success,
    };

    let mut actions_taken = worker_result.actions_taken.clone();
    actions_taken.push("Sanity checks passed".to_string());
    actions_taken.push("Acceptance criteria verified".to_string());

    let result = AgentResult {
        status,
        summary: format!("{} (Validated)", worker_result.summary),
        actions_taken,
        links: worker_result.links.clone(),
        next_steps: worker_result.next_steps.clone(),
    };
    result
        .validate()
        .map_err(|e| CouncilError::contract(VALIDATOR_STAGE, e))?;

    info!(
        event = "validator.completed",
        status = %result.status,
        criteria = checks.len(),
        supported
    );
    Ok((result, checks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Intent;

    fn worker_result(status: ResultStatus, actions: &[&str]) -> AgentResult {
        AgentResult {
            status,
            summary: "did the work".to_string(),
            actions_taken: actions.iter().map(|a| a.to_string()).collect(),
            links: None,
            next_steps: None,
        }
    }

    #[test]
    fn failure_is_never_upgraded() {
        let spec = TaskSpec::new(Intent::Bug, "fix crash");
        let out = validate_result(&spec, &worker_result(ResultStatus::Failure, &["tried"])).unwrap();
        assert_eq!(out.status, ResultStatus::Failure);
        assert_eq!(out.summary, "did the work (Validated)");
    }

    #[test]
    fn needs_review_becomes_success_and_audit_entries_are_appended() {
        let spec = TaskSpec::new(Intent::Build, "add toggle");
        let out =
            validate_result(&spec, &worker_result(ResultStatus::NeedsReview, &["edited"])).unwrap();
        assert_eq!(out.status, ResultStatus::Success);
        assert_eq!(
            out.actions_taken,
            vec!["edited", "Sanity checks passed", "Acceptance criteria verified"]
        );
    }

    #[test]
    fn criteria_are_checked_against_actions() {
        let mut spec = TaskSpec::new(Intent::Build, "add toggle");
        spec.acceptance_criteria = Some(vec![
            "Toggle state persists".to_string(),
            "Screen reader labels present".to_string(),
        ]);
        let checks = assess_criteria(
            &spec,
            &worker_result(ResultStatus::Success, &["Made toggle state persist across restarts"]),
        );
        assert!(checks[0].supported);
        assert!(!checks[1].supported);
    }

    #[test]
    fn rejects_blank_worker_entries() {
        let spec = TaskSpec::new(Intent::Build, "x");
        let err = validate_result(&spec, &worker_result(ResultStatus::Success, &["  "])).unwrap_err();
        assert!(matches!(
            err,
            CouncilError::Contract {
                stage: VALIDATOR_STAGE,
                ..
            }
        ));
    }
}
