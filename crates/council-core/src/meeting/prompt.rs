//! Prompt assembly for role steps and synthesis.
//!
//! The layouts here are part of the contract with the completion service:
//! section headers are what the model is told to read, so changes to them
//! change model behaviour.

use serde::{Deserialize, Serialize};

use crate::domain::Intent;
use crate::meeting::outputs::RoleOutputs;
use crate::meeting::roles::MeetingRole;
use crate::services::MemorySummary;

/// The command a meeting was convened for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingRequest {
    pub intent: Intent,
    pub description: String,
    /// Tracker issue the plan will be posted to, if one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_number: Option<u64>,
}

impl MeetingRequest {
    pub fn new(intent: Intent, description: impl Into<String>) -> Self {
        Self {
            intent,
            description: description.into(),
            issue_number: None,
        }
    }

    pub fn with_issue(mut self, issue_number: u64) -> Self {
        self.issue_number = Some(issue_number);
        self
    }
}

/// Numbered list of retrieved summaries, or an empty string when there are none.
pub fn render_memory_context(memories: &[MemorySummary]) -> String {
    if memories.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = memories
        .iter()
        .enumerate()
        .map(|(i, m)| format!("{}. {}", i + 1, m.summary))
        .collect();
    format!("\n\n## Relevant Project Memory\n{}", lines.join("\n"))
}

/// Shared request block every role sees.
pub fn render_base_prompt(request: &MeetingRequest, memory_context: &str) -> String {
    format!(
        "**Command type:** {}\n**Request:** {}{}\n\nPlease analyze this request from your role's perspective.",
        request.intent, request.description, memory_context
    )
}

/// Outputs of every role already executed, in execution order.
pub fn render_prior_outputs(outputs: &RoleOutputs) -> String {
    if outputs.is_empty() {
        return String::new();
    }
    let blocks: Vec<String> = outputs
        .iter()
        .map(|(role, outcome)| format!("### {}\n{}", role, outcome.render()))
        .collect();
    format!("\n\n## Prior Agent Outputs\n{}", blocks.join("\n\n"))
}

/// Full user prompt for one role step.
pub fn render_role_prompt(base_prompt: &str, prior: &RoleOutputs) -> String {
    format!("{}{}", base_prompt, render_prior_outputs(prior))
}

/// User prompt for synthesis. Every role is listed, absent ones as `[missing]`.
pub fn render_synthesis_prompt(request: &MeetingRequest, outputs: &RoleOutputs) -> String {
    let all_outputs: Vec<String> = MeetingRole::ORDER
        .iter()
        .map(|role| format!("### {}\n{}", role, outputs.rendered_or_missing(*role)))
        .collect();
    format!(
        "**Command:** {}: {}\n\n## Agent Meeting Outputs\n\n{}",
        request.intent,
        request.description,
        all_outputs.join("\n\n")
    )
}
