//! Planner stage: turn an intent and a description into a [`TaskSpec`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::domain::{CouncilError, Intent, Result, SchemaError, TaskSpec};
use crate::services::CompletionService;

pub const PLANNER_STAGE: &str = "planner";

const SUMMARY_CHARS: usize = 100;

#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, intent: Intent, description: &str, memory_context: &str)
        -> Result<TaskSpec>;
}

/// Deterministic planner that derives a task from the request text alone.
#[derive(Debug, Clone, Default)]
pub struct TemplatePlanner;

impl TemplatePlanner {
    pub fn new() -> Self {
        Self
    }

    fn criteria_for(intent: Intent) -> Vec<String> {
        let mut criteria = vec!["Project builds without errors".to_string()];
        match intent {
            Intent::Bug => criteria.push("Regression test reproduces the reported bug".to_string()),
            Intent::Build => criteria.push("New behaviour is covered by tests".to_string()),
            Intent::Safe | Intent::Unknown => {}
        }
        criteria.push("Meets user request requirements".to_string());
        criteria
    }
}

/// Tokens that look like file paths (`src/app.rs`, `README.md`).
fn path_like_tokens(description: &str) -> Vec<String> {
    description
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '(' | ')' | '`' | '"' | '\'')))
        .filter(|w| {
            let has_ext = w
                .rsplit_once('.')
                .map(|(stem, ext)| {
                    !stem.is_empty()
                        && !ext.is_empty()
                        && ext.len() <= 5
                        && ext.chars().all(|c| c.is_ascii_alphanumeric())
                })
                .unwrap_or(false);
            has_ext || (w.contains('/') && !w.starts_with("http"))
        })
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl Planner for TemplatePlanner {
    async fn plan(
        &self,
        intent: Intent,
        description: &str,
        memory_context: &str,
    ) -> Result<TaskSpec> {
        info!(intent = %intent, context_len = memory_context.len(), "planning from template");
        let excerpt: String = description.trim().chars().take(SUMMARY_CHARS).collect();
        let files = path_like_tokens(description);

        let mut spec = TaskSpec::new(intent, format!("Implementation plan for: {excerpt}"));
        spec.constraints = Some(vec![
            "Must not break existing tests".to_string(),
            "Keep public interfaces backwards compatible".to_string(),
        ]);
        spec.files = (!files.is_empty()).then_some(files);
        spec.acceptance_criteria = Some(Self::criteria_for(intent));
        Ok(spec)
    }
}

/// Instructions for the model-backed planner.
pub const PLANNER_SYSTEM_PROMPT: &str = "You are the planning agent of an engineering team.
Turn the request into a task specification. Respond with a single JSON object and nothing else:
{
  \"intent\": \"SAFE\" | \"BUILD\" | \"BUG\" | \"UNKNOWN\",
  \"summary\": string,
  \"constraints\": [string],
  \"files\": [string],
  \"acceptance_criteria\": [string]
}
Use the intent you are given. Omit fields you cannot derive.";

const PLANNER_MAX_TOKENS: u32 = 800;

/// Planner that asks the completion service for a JSON task spec.
///
/// The payload is parsed and validated before it leaves this stage. A
/// malformed payload is a contract violation, not something to repair.
#[derive(Clone)]
pub struct CompletionPlanner {
    completion: Arc<dyn CompletionService>,
}

impl CompletionPlanner {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }
}

/// The JSON object inside a response: a ```json fence if present, else the
/// outermost braces.
fn extract_json(text: &str) -> &str {
    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text.trim(),
    }
}

#[async_trait]
impl Planner for CompletionPlanner {
    async fn plan(
        &self,
        intent: Intent,
        description: &str,
        memory_context: &str,
    ) -> Result<TaskSpec> {
        let user_prompt = format!("**Intent:** {intent}\n**Request:** {description}{memory_context}");
        let reply = self
            .completion
            .complete(PLANNER_SYSTEM_PROMPT, &user_prompt, PLANNER_MAX_TOKENS)
            .await?;

        let spec = TaskSpec::from_json(extract_json(&reply.text))
            .map_err(|e| CouncilError::contract(PLANNER_STAGE, e))?;
        if spec.intent != intent {
            return Err(CouncilError::contract(
                PLANNER_STAGE,
                SchemaError::IntentMismatch {
                    expected: intent,
                    actual: spec.intent,
                },
            ));
        }
        info!(
            intent = %intent,
            tokens = reply.tokens_used,
            criteria = spec.criteria().len(),
            "planned from model"
        );
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{CallTarget, ScriptedCompletion};

    #[tokio::test]
    async fn template_planner_truncates_summary() {
        let long = "x".repeat(250);
        let spec = TemplatePlanner::new()
            .plan(Intent::Build, &long, "")
            .await
            .unwrap();
        assert_eq!(spec.summary, format!("Implementation plan for: {}", "x".repeat(100)));
        assert!(spec.validate().is_ok());
    }

    #[tokio::test]
    async fn template_planner_picks_up_paths_and_intent_criteria() {
        let spec = TemplatePlanner::new()
            .plan(Intent::Bug, "crash in src/auth/login.rs when token expires", "")
            .await
            .unwrap();
        assert_eq!(spec.files, Some(vec!["src/auth/login.rs".to_string()]));
        assert!(spec
            .criteria()
            .iter()
            .any(|c| c.contains("Regression test")));
    }

    #[test]
    fn path_detection_ignores_prose() {
        assert!(path_like_tokens("add a dark mode toggle. Thanks").is_empty());
        assert_eq!(
            path_like_tokens("update (README.md) and docs/setup"),
            vec!["README.md".to_string(), "docs/setup".to_string()]
        );
    }

    #[test]
    fn extract_json_handles_fences_and_prose() {
        assert_eq!(extract_json("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json("Here you go: {\"a\":1} done"), "{\"a\":1}");
    }

    #[tokio::test]
    async fn completion_planner_parses_model_json() {
        let svc = Arc::new(ScriptedCompletion::new().respond(
            CallTarget::Other,
            "```json\n{\"intent\":\"BUILD\",\"summary\":\"Add toggle\",\"acceptance_criteria\":[\"toggle persists\"]}\n```",
            80,
        ));
        let planner = CompletionPlanner::new(svc.clone());
        let spec = planner
            .plan(Intent::Build, "add dark mode toggle", "")
            .await
            .unwrap();
        assert_eq!(spec.summary, "Add toggle");
        assert_eq!(spec.criteria(), &["toggle persists".to_string()]);
        assert_eq!(svc.calls()[0].system_prompt, PLANNER_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn completion_planner_rejects_malformed_payload() {
        let svc = Arc::new(ScriptedCompletion::new().respond(
            CallTarget::Other,
            "{\"intent\":\"BUILD\"}",
            10,
        ));
        let err = CompletionPlanner::new(svc)
            .plan(Intent::Build, "x", "")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CouncilError::Contract {
                stage: PLANNER_STAGE,
                source: SchemaError::Malformed(_)
            }
        ));
    }

    #[tokio::test]
    async fn completion_planner_rejects_intent_mismatch() {
        let svc = Arc::new(ScriptedCompletion::new().respond(
            CallTarget::Other,
            "{\"intent\":\"SAFE\",\"summary\":\"s\"}",
            10,
        ));
        let err = CompletionPlanner::new(svc)
            .plan(Intent::Bug, "x", "")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CouncilError::Contract {
                source: SchemaError::IntentMismatch { .. },
                ..
            }
        ));
    }
}
