//! Role step execution: one role, one completion call.
//!
//! The executor never fails. A rejected completion call becomes
//! [`RoleOutcome::Errored`] for that role only, and a failed audit write is
//! reported as [`PersistOutcome::Failed`] on the step report.

use serde::Serialize;
use tracing::{info, warn};

use crate::budget::TokenLedger;
use crate::meeting::outputs::{RoleOutcome, RoleOutputs};
use crate::meeting::prompt::{render_role_prompt, MeetingRequest};
use crate::meeting::roles::MeetingRole;
use crate::services::{CompletionService, MeetingLogEntry, MemoryService, PersistOutcome};
use crate::trace::{with_context, TraceContext};

/// What happened to one role in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleStepReport {
    pub role: MeetingRole,
    pub outcome: RoleOutcome,
    /// `None` when nothing was written (skipped or errored roles).
    pub persisted: Option<PersistOutcome>,
}

/// Runs single role steps against the injected collaborators.
pub struct StepExecutor<'a> {
    completion: &'a dyn CompletionService,
    memory: &'a dyn MemoryService,
}

impl<'a> StepExecutor<'a> {
    pub fn new(completion: &'a dyn CompletionService, memory: &'a dyn MemoryService) -> Self {
        Self { completion, memory }
    }

    /// Mark `role` as skipped without calling the model.
    pub fn skip(&self, role: MeetingRole, outputs: &mut RoleOutputs) -> RoleStepReport {
        warn!(event = "role.skipped", role = %role, "token budget exceeded before role");
        outputs.insert(role, RoleOutcome::Skipped);
        RoleStepReport {
            role,
            outcome: RoleOutcome::Skipped,
            persisted: None,
        }
    }

    /// Assemble the prompt for `role`, call the model, and record the result.
    pub async fn execute(
        &self,
        ctx: &TraceContext,
        request: &MeetingRequest,
        role: MeetingRole,
        base_prompt: &str,
        outputs: &mut RoleOutputs,
        ledger: &mut TokenLedger,
    ) -> RoleStepReport {
        let user_prompt = render_role_prompt(base_prompt, outputs);
        let operation = format!("Role: {role}");
        let response = with_context(
            ctx,
            &operation,
            self.completion
                .complete(role.system_prompt(), &user_prompt, role.max_output_tokens()),
        )
        .await;

        match response {
            Ok(completion) => {
                let outcome = RoleOutcome::Completed {
                    text: completion.text.clone(),
                    tokens: completion.tokens_used,
                };
                outputs.insert(role, outcome.clone());
                ledger.record(role.name(), completion.tokens_used);

                let entry = MeetingLogEntry::new(
                    ctx,
                    request.issue_number,
                    role.name(),
                    completion.text,
                    completion.tokens_used,
                );
                let persisted = PersistOutcome::from(self.memory.persist(entry).await);
                match &persisted {
                    PersistOutcome::Stored => {}
                    PersistOutcome::Failed(reason) => warn!(
                        event = "role.persist_failed",
                        trace_id = %ctx.id(),
                        role = %role,
                        error = %reason,
                    ),
                }

                info!(
                    event = "role.completed",
                    role = %role,
                    tokens = completion.tokens_used,
                );
                RoleStepReport {
                    role,
                    outcome,
                    persisted: Some(persisted),
                }
            }
            Err(e) => {
                let outcome = RoleOutcome::Errored {
                    message: e.to_string(),
                };
                outputs.insert(role, outcome.clone());
                RoleStepReport {
                    role,
                    outcome,
                    persisted: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Intent;
    use crate::fakes::{InMemoryMemory, ScriptedCompletion};
    use crate::services::ServiceError;
    use crate::trace::Origin;

    #[tokio::test]
    async fn test_successful_step_records_usage_and_persists() {
        let completion = ScriptedCompletion::new().with_default("architecture notes", 120);
        let memory = InMemoryMemory::new();
        let executor = StepExecutor::new(&completion, &memory);
        let ctx = TraceContext::new(Origin::Internal);
        let request = MeetingRequest::new(Intent::Build, "x").with_issue(9);
        let mut outputs = RoleOutputs::new();
        let mut ledger = TokenLedger::new();

        let report = executor
            .execute(&ctx, &request, MeetingRole::Architect, "BASE", &mut outputs, &mut ledger)
            .await;

        assert!(report.outcome.is_completed());
        assert_eq!(report.persisted, Some(PersistOutcome::Stored));
        assert_eq!(ledger.total(), 120);
        let stored = memory.persisted();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].role, "Architect");
        assert_eq!(stored[0].issue_number, Some(9));
        assert_eq!(stored[0].trace_id, ctx.id());

        let calls = completion.calls();
        assert_eq!(calls[0].max_output_tokens, 1200);
        assert_eq!(calls[0].user_prompt, "BASE");
    }

    #[tokio::test]
    async fn test_failed_call_stores_error_marker_without_usage() {
        let completion = ScriptedCompletion::new().fail_role(
            MeetingRole::Pm,
            ServiceError::Transient("503 upstream".to_string()),
        );
        let memory = InMemoryMemory::new();
        let executor = StepExecutor::new(&completion, &memory);
        let ctx = TraceContext::new(Origin::Internal);
        let request = MeetingRequest::new(Intent::Bug, "x");
        let mut outputs = RoleOutputs::new();
        let mut ledger = TokenLedger::new();

        let report = executor
            .execute(&ctx, &request, MeetingRole::Pm, "BASE", &mut outputs, &mut ledger)
            .await;

        assert!(report.outcome.is_errored());
        assert_eq!(report.persisted, None);
        assert!(ledger.breakdown().is_empty());
        assert_eq!(
            outputs.rendered_or_missing(MeetingRole::Pm),
            "[Error: transient failure: 503 upstream]"
        );
        assert!(memory.persisted().is_empty());
    }

    #[tokio::test]
    async fn test_persist_failure_does_not_change_outcome() {
        let completion = ScriptedCompletion::new().with_default("qa plan", 50);
        let memory = InMemoryMemory::new().failing_persist("disk full");
        let executor = StepExecutor::new(&completion, &memory);
        let ctx = TraceContext::new(Origin::Internal);
        let request = MeetingRequest::new(Intent::Safe, "x");
        let mut outputs = RoleOutputs::new();
        let mut ledger = TokenLedger::new();

        let report = executor
            .execute(&ctx, &request, MeetingRole::Qa, "BASE", &mut outputs, &mut ledger)
            .await;

        assert!(report.outcome.is_completed());
        assert!(matches!(report.persisted, Some(PersistOutcome::Failed(ref r)) if r.contains("disk full")));
        assert_eq!(ledger.total(), 50);
    }
}
