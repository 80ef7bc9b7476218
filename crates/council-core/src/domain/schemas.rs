//! Data contracts exchanged between pipeline stages.
//!
//! Rust's type system already guarantees the *shape* of a [`TaskSpec`] or
//! [`AgentResult`] built in code. What it cannot guarantee is content, and it
//! says nothing about payloads that arrive as JSON from a model. Every stage
//! therefore calls `validate()` on what it produces, and JSON enters only
//! through `from_json`, which parses and validates in one step.

use serde::{Deserialize, Serialize};

use crate::domain::error::SchemaError;

/// The kind of work a command asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Safe,
    Build,
    Bug,
    Unknown,
}

impl Intent {
    /// Map a command prefix to an intent. Matching is case-insensitive.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix.to_ascii_uppercase().as_str() {
            "SAFE" => Some(Intent::Safe),
            "BUILD" => Some(Intent::Build),
            "BUG" => Some(Intent::Bug),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Safe => "SAFE",
            Intent::Build => "BUILD",
            Intent::Bug => "BUG",
            Intent::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UNKNOWN" => Ok(Intent::Unknown),
            other => Intent::from_prefix(other).ok_or_else(|| format!("unknown intent: {s}")),
        }
    }
}

/// Planner output: what should be done and how success is judged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub intent: Intent,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<Vec<String>>,
}

impl TaskSpec {
    pub fn new(intent: Intent, summary: impl Into<String>) -> Self {
        Self {
            intent,
            summary: summary.into(),
            constraints: None,
            repo: None,
            issue: None,
            pr: None,
            files: None,
            acceptance_criteria: None,
        }
    }

    /// Parse a JSON payload and validate it.
    pub fn from_json(raw: &str) -> std::result::Result<Self, SchemaError> {
        let spec: TaskSpec = serde_json::from_str(raw)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> std::result::Result<(), SchemaError> {
        require_text("summary", &self.summary)?;
        require_entries("constraints", self.constraints.as_deref())?;
        require_entries("files", self.files.as_deref())?;
        require_entries("acceptance_criteria", self.acceptance_criteria.as_deref())?;
        if let Some(repo) = &self.repo {
            let mut parts = repo.split('/');
            let valid = matches!(
                (parts.next(), parts.next(), parts.next()),
                (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
            );
            if !valid {
                return Err(SchemaError::InvalidRepo(repo.clone()));
            }
        }
        Ok(())
    }

    /// Acceptance criteria, or an empty slice when none were derived.
    pub fn criteria(&self) -> &[String] {
        self.acceptance_criteria.as_deref().unwrap_or_default()
    }
}

/// Business-level outcome of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    Success,
    Failure,
    NeedsReview,
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResultStatus::Success => "SUCCESS",
            ResultStatus::Failure => "FAILURE",
            ResultStatus::NeedsReview => "NEEDS_REVIEW",
        };
        f.write_str(s)
    }
}

/// Worker output, amended by the validator and returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResult {
    pub status: ResultStatus,
    pub summary: String,
    pub actions_taken: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<Vec<String>>,
}

impl AgentResult {
    pub fn from_json(raw: &str) -> std::result::Result<Self, SchemaError> {
        let result: AgentResult = serde_json::from_str(raw)?;
        result.validate()?;
        Ok(result)
    }

    pub fn validate(&self) -> std::result::Result<(), SchemaError> {
        require_text("summary", &self.summary)?;
        require_entries("actions_taken", Some(&self.actions_taken))?;
        require_entries("links", self.links.as_deref())?;
        require_entries("next_steps", self.next_steps.as_deref())?;
        Ok(())
    }
}

fn require_text(field: &'static str, value: &str) -> std::result::Result<(), SchemaError> {
    if value.trim().is_empty() {
        return Err(SchemaError::EmptyField { field });
    }
    Ok(())
}

fn require_entries(
    field: &'static str,
    entries: Option<&[String]>,
) -> std::result::Result<(), SchemaError> {
    if let Some(entries) = entries {
        if let Some(index) = entries.iter().position(|e| e.trim().is_empty()) {
            return Err(SchemaError::BlankEntry { field, index });
        }
    }
    Ok(())
}
