//! Per-run map of role outcomes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::meeting::roles::MeetingRole;

/// Marker text stored for a role skipped by the budget gate.
pub const SKIPPED_MARKER: &str = "[Skipped: token budget exceeded]";

/// Placeholder used by synthesis for a role absent from the map.
pub const MISSING_MARKER: &str = "[missing]";

/// What one role produced in this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RoleOutcome {
    Completed { text: String, tokens: u64 },
    Skipped,
    Errored { message: String },
}

impl RoleOutcome {
    /// Text seen by later roles and by synthesis.
    pub fn render(&self) -> String {
        match self {
            RoleOutcome::Completed { text, .. } => text.clone(),
            RoleOutcome::Skipped => SKIPPED_MARKER.to_string(),
            RoleOutcome::Errored { message } => format!("[Error: {message}]"),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RoleOutcome::Completed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, RoleOutcome::Skipped)
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, RoleOutcome::Errored { .. })
    }
}

/// Role outcomes for a single run, keyed by role.
///
/// Owned by one run and never shared. Iteration follows execution order
/// because [`MeetingRole`]'s `Ord` does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleOutputs {
    entries: BTreeMap<MeetingRole, RoleOutcome>,
}

impl RoleOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `outcome` for `role`.
    ///
    /// Returns `false` and leaves the map untouched if the role already has an outcome.
    pub fn insert(&mut self, role: MeetingRole, outcome: RoleOutcome) -> bool {
        if self.entries.contains_key(&role) {
            return false;
        }
        self.entries.insert(role, outcome);
        true
    }

    pub fn get(&self, role: MeetingRole) -> Option<&RoleOutcome> {
        self.entries.get(&role)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Outcomes in execution order.
    pub fn iter(&self) -> impl Iterator<Item = (MeetingRole, &RoleOutcome)> {
        self.entries.iter().map(|(role, outcome)| (*role, outcome))
    }

    /// Rendered text for `role`, or [`MISSING_MARKER`].
    pub fn rendered_or_missing(&self, role: MeetingRole) -> String {
        self.get(role)
            .map(RoleOutcome::render)
            .unwrap_or_else(|| MISSING_MARKER.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_markers() {
        assert_eq!(RoleOutcome::Skipped.render(), SKIPPED_MARKER);
        assert_eq!(
            RoleOutcome::Errored {
                message: "timeout".to_string()
            }
            .render(),
            "[Error: timeout]"
        );
        assert_eq!(
            RoleOutcome::Completed {
                text: "body".to_string(),
                tokens: 3
            }
            .render(),
            "body"
        );
    }

    #[test]
    fn test_insert_is_once_per_role() {
        let mut outputs = RoleOutputs::new();
        assert!(outputs.insert(MeetingRole::Qa, RoleOutcome::Skipped));
        assert!(!outputs.insert(
            MeetingRole::Qa,
            RoleOutcome::Errored {
                message: "late".to_string()
            }
        ));
        assert_eq!(outputs.get(MeetingRole::Qa), Some(&RoleOutcome::Skipped));
        assert_eq!(outputs.len(), 1);
    }

    #[test]
    fn test_iteration_follows_role_order() {
        let mut outputs = RoleOutputs::new();
        outputs.insert(MeetingRole::Security, RoleOutcome::Skipped);
        outputs.insert(MeetingRole::Architect, RoleOutcome::Skipped);
        outputs.insert(MeetingRole::Qa, RoleOutcome::Skipped);
        let roles: Vec<MeetingRole> = outputs.iter().map(|(r, _)| r).collect();
        assert_eq!(
            roles,
            vec![MeetingRole::Architect, MeetingRole::Qa, MeetingRole::Security]
        );
    }

    #[test]
    fn test_missing_placeholder() {
        let outputs = RoleOutputs::new();
        assert_eq!(outputs.rendered_or_missing(MeetingRole::Pm), "[missing]");
    }
}
