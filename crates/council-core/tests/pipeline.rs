//! Planner → Worker → Validator runs, including contract violations at each
//! stage boundary.

use std::sync::Arc;

use async_trait::async_trait;
use council_core::fakes::{CallTarget, ScriptedCompletion};
use council_core::pipeline::planner::PLANNER_STAGE;
use council_core::pipeline::worker::WORKER_STAGE;
use council_core::{
    AgentPipeline, AgentResult, CompletionPlanner, CouncilError, Intent, Origin, Planner,
    ResultStatus, SchemaError, ServiceError, SimulatedWorker, TaskSpec, TemplatePlanner,
    TraceContext, Worker,
};

/// Worker returning a fixed result regardless of the task.
struct FixedWorker(AgentResult);

#[async_trait]
impl Worker for FixedWorker {
    async fn execute(&self, _spec: &TaskSpec) -> council_core::Result<AgentResult> {
        Ok(self.0.clone())
    }
}

/// Planner that skips its own validation.
struct SloppyPlanner;

#[async_trait]
impl Planner for SloppyPlanner {
    async fn plan(
        &self,
        intent: Intent,
        _description: &str,
        _memory_context: &str,
    ) -> council_core::Result<TaskSpec> {
        Ok(TaskSpec::new(intent, "   "))
    }
}

fn worker_result(status: ResultStatus) -> AgentResult {
    AgentResult {
        status,
        summary: "Worker ran".to_string(),
        actions_taken: vec!["Edited settings screen".to_string()],
        links: Some(vec!["https://example.com/pr/1".to_string()]),
        next_steps: None,
    }
}

#[tokio::test]
async fn test_template_pipeline_end_to_end() {
    let ctx = TraceContext::new(Origin::ChatMessage);
    let pipeline = AgentPipeline::new(
        Arc::new(TemplatePlanner::new()),
        Arc::new(SimulatedWorker::new().with_link("local://issues/3")),
    );

    let report = pipeline
        .execute(&ctx, Intent::Bug, "login crash in src/auth.rs", "")
        .await
        .unwrap();

    assert_eq!(report.spec.intent, Intent::Bug);
    assert_eq!(report.spec.files, Some(vec!["src/auth.rs".to_string()]));
    assert_eq!(report.result.status, ResultStatus::Success);
    assert_eq!(
        report.result.summary,
        "Completed simulated execution for BUG. (Validated)"
    );
    let actions = &report.result.actions_taken;
    assert_eq!(actions[actions.len() - 2], "Sanity checks passed");
    assert_eq!(actions[actions.len() - 1], "Acceptance criteria verified");
    assert_eq!(report.result.links, Some(vec!["local://issues/3".to_string()]));
    assert_eq!(report.criteria.len(), report.spec.criteria().len());
}

#[tokio::test]
async fn test_validator_never_upgrades_worker_failure() {
    let ctx = TraceContext::new(Origin::Internal);
    let pipeline = AgentPipeline::new(
        Arc::new(TemplatePlanner::new()),
        Arc::new(FixedWorker(worker_result(ResultStatus::Failure))),
    );

    let report = pipeline
        .execute(&ctx, Intent::Build, "add toggle", "")
        .await
        .unwrap();

    assert_eq!(report.result.status, ResultStatus::Failure);
    assert_eq!(report.result.summary, "Worker ran (Validated)");
}

#[tokio::test]
async fn test_validator_promotes_needs_review() {
    let ctx = TraceContext::new(Origin::Internal);
    let pipeline = AgentPipeline::new(
        Arc::new(TemplatePlanner::new()),
        Arc::new(FixedWorker(worker_result(ResultStatus::NeedsReview))),
    );

    let report = pipeline
        .execute(&ctx, Intent::Safe, "rotate keys", "")
        .await
        .unwrap();

    assert_eq!(report.result.status, ResultStatus::Success);
    // The worker's actions say nothing about the template criteria; the
    // validator only warns.
    assert!(report.criteria.iter().any(|c| !c.supported));
}

#[tokio::test]
async fn test_invalid_planner_output_stops_the_run() {
    let ctx = TraceContext::new(Origin::Internal);
    let pipeline = AgentPipeline::new(Arc::new(SloppyPlanner), Arc::new(SimulatedWorker::new()));

    let err = pipeline
        .execute(&ctx, Intent::Build, "x", "")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CouncilError::Contract {
            stage: PLANNER_STAGE,
            source: SchemaError::EmptyField { field: "summary" }
        }
    ));
}

#[tokio::test]
async fn test_invalid_worker_output_stops_the_run() {
    let ctx = TraceContext::new(Origin::Internal);
    let mut bad = worker_result(ResultStatus::Success);
    bad.next_steps = Some(vec!["".to_string()]);
    let pipeline = AgentPipeline::new(Arc::new(TemplatePlanner::new()), Arc::new(FixedWorker(bad)));

    let err = pipeline
        .execute(&ctx, Intent::Build, "x", "")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CouncilError::Contract {
            stage: WORKER_STAGE,
            source: SchemaError::BlankEntry {
                field: "next_steps",
                index: 0
            }
        }
    ));
}

#[tokio::test]
async fn test_model_planner_feeds_memory_and_validates_payload() {
    let completion = Arc::new(ScriptedCompletion::new().respond(
        CallTarget::Other,
        r#"{"intent":"BUILD","summary":"Add toggle","repo":"acme/app","acceptance_criteria":["Toggle persists"]}"#,
        120,
    ));
    let ctx = TraceContext::new(Origin::Internal);
    let pipeline = AgentPipeline::new(
        Arc::new(CompletionPlanner::new(completion.clone())),
        Arc::new(SimulatedWorker::new()),
    );

    let report = pipeline
        .execute(
            &ctx,
            Intent::Build,
            "add dark mode toggle",
            "\n\n## Relevant Project Memory\n1. Theme tokens exist",
        )
        .await
        .unwrap();

    assert_eq!(report.spec.repo.as_deref(), Some("acme/app"));
    assert!(report.criteria.iter().all(|c| c.supported));
    assert!(completion.calls()[0]
        .user_prompt
        .contains("1. Theme tokens exist"));
}

#[tokio::test]
async fn test_model_planner_bad_repo_is_contract_error() {
    let completion = Arc::new(ScriptedCompletion::new().respond(
        CallTarget::Other,
        r#"{"intent":"BUILD","summary":"Add toggle","repo":"acme"}"#,
        10,
    ));
    let ctx = TraceContext::new(Origin::Internal);
    let pipeline = AgentPipeline::new(
        Arc::new(CompletionPlanner::new(completion)),
        Arc::new(SimulatedWorker::new()),
    );

    let err = pipeline
        .execute(&ctx, Intent::Build, "x", "")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CouncilError::Contract {
            source: SchemaError::InvalidRepo(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_model_planner_service_failure_propagates() {
    let completion = Arc::new(ScriptedCompletion::new().fail(
        CallTarget::Other,
        ServiceError::Permanent("401 unauthorized".to_string()),
    ));
    let ctx = TraceContext::new(Origin::Internal);
    let pipeline = AgentPipeline::new(
        Arc::new(CompletionPlanner::new(completion)),
        Arc::new(SimulatedWorker::new()),
    );

    let err = pipeline
        .execute(&ctx, Intent::Build, "x", "")
        .await
        .unwrap_err();
    assert!(matches!(err, CouncilError::Service(ServiceError::Permanent(_))));
}
