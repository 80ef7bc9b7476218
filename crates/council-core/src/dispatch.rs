//! Routes one chat line to the engine and renders the reply.
//!
//! A task command opens an issue, runs the selected engine, posts the plan
//! back to the issue and stores a short summary so later runs can retrieve
//! it. Only tracker and contract failures are returned as errors; the memory
//! write is best-effort.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::command::Command;
use crate::domain::{Intent, Result};
use crate::meeting::prompt::render_memory_context;
use crate::meeting::{MeetingOrchestrator, MeetingRequest, SynthesisResult};
use crate::pipeline::AgentPipeline;
use crate::reporting::{
    issue_title, render_help, render_issue_body, render_memory_hits, render_pipeline_reply,
    render_plan_comment,
};
use crate::services::{IssueTracker, MemoryService, PersistOutcome};
use crate::trace::{with_context, TraceContext};
use crate::webhook::{self, DeliveryOutcome};

/// Hits returned by `/memory search`.
pub const MEMORY_SEARCH_LIMIT: usize = 5;

/// Which engine handles task commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    #[default]
    Meeting,
    Pipeline,
}

#[derive(Clone)]
pub struct Dispatcher {
    meeting: MeetingOrchestrator,
    pipeline: AgentPipeline,
    tracker: Arc<dyn IssueTracker>,
    memory: Arc<dyn MemoryService>,
    variant: Variant,
}

impl Dispatcher {
    pub fn new(
        meeting: MeetingOrchestrator,
        pipeline: AgentPipeline,
        tracker: Arc<dyn IssueTracker>,
        memory: Arc<dyn MemoryService>,
    ) -> Self {
        Self {
            meeting,
            pipeline,
            tracker,
            memory,
            variant: Variant::default(),
        }
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Handle one chat line and return the reply text.
    pub async fn handle(&self, ctx: &TraceContext, text: &str) -> Result<String> {
        with_context(ctx, "Chat Message", async {
            match Command::parse(text) {
                Command::Task {
                    intent,
                    description,
                } => self.run_task(ctx, intent, &description).await,
                Command::Status => self.status(ctx).await,
                Command::MemorySearch(query) => self.memory_search(&query).await,
                Command::Help => Ok(render_help()),
                Command::Unknown(_) => Ok(format!("❓ Unknown command.\n\n{}", render_help())),
            }
        })
        .await
    }

    /// Accept a tracker webhook delivery, ignoring ids already seen.
    pub async fn handle_delivery(&self, delivery_id: Option<&str>) -> Result<DeliveryOutcome> {
        Ok(webhook::handle_delivery(self.memory.as_ref(), delivery_id).await?)
    }

    async fn run_task(&self, ctx: &TraceContext, intent: Intent, description: &str) -> Result<String> {
        let labels = vec![intent.as_str().to_ascii_lowercase()];
        let issue = self
            .tracker
            .create_issue(
                ctx,
                &issue_title(intent, description),
                &render_issue_body(intent, description, ctx),
                &labels,
            )
            .await?;
        info!(event = "dispatch.issue_created", issue = issue.number, variant = ?self.variant);

        let (plan, total_tokens, body) = match self.variant {
            Variant::Meeting => {
                let request = MeetingRequest::new(intent, description).with_issue(issue.number);
                let report = self.meeting.run(ctx, &request).await;
                let body = render_plan_comment(&report.synthesis, report.total_tokens);
                (report.synthesis, report.total_tokens, body)
            }
            Variant::Pipeline => {
                let memory_context = self.memory_context(description).await;
                let report = self
                    .pipeline
                    .execute(ctx, intent, description, &memory_context)
                    .await?;
                let body = render_pipeline_reply(intent, description, &report);
                (report.as_plan(), 0, body)
            }
        };

        self.tracker
            .post_result(ctx, issue.number, &plan, total_tokens)
            .await?;

        let saved = self.save_summary(intent, description, &plan, issue.number).await;
        if !saved.is_stored() {
            warn!(event = "dispatch.summary_not_saved", issue = issue.number, outcome = ?saved);
        }

        Ok(format!(
            "📌 Created issue [#{}]({})\n\n{body}",
            issue.number, issue.url
        ))
    }

    async fn save_summary(
        &self,
        intent: Intent,
        description: &str,
        plan: &SynthesisResult,
        issue_number: u64,
    ) -> PersistOutcome {
        let summary = format!(
            "{intent}: {}\nPlan: {}\nRisk: {}",
            description.trim(),
            plan.plan,
            plan.risk_verdict
        );
        self.memory
            .save_summary(&summary, Some(issue_number))
            .await
            .into()
    }

    /// Memory block for the pipeline planner. Empty when retrieval fails.
    async fn memory_context(&self, description: &str) -> String {
        match self
            .memory
            .search(description, self.meeting.config().memory_top_k)
            .await
        {
            Ok(hits) => render_memory_context(&hits),
            Err(e) => {
                warn!(event = "dispatch.memory_unavailable", error = %e);
                String::new()
            }
        }
    }

    async fn status(&self, ctx: &TraceContext) -> Result<String> {
        Ok(match self.tracker.last_issue(ctx).await? {
            Some(issue) => format!(
                "📋 Last issue: [#{}]({})\nStatus: {}",
                issue.number, issue.url, issue.state
            ),
            None => "📋 No issues found.".to_string(),
        })
    }

    async fn memory_search(&self, query: &str) -> Result<String> {
        if query.is_empty() {
            return Ok("❓ Please provide a search query.".to_string());
        }
        let hits = self.memory.search(query, MEMORY_SEARCH_LIMIT).await?;
        Ok(render_memory_hits(query, &hits))
    }
}
