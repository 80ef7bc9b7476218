//! Chat command parsing.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::Intent;

const MEMORY_SEARCH_PREFIX: &str = "/memory search";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `SAFE: ...`, `BUILD: ...` or `BUG: ...`.
    Task { intent: Intent, description: String },
    Status,
    /// `/memory search <query>`; the query may be empty.
    MemorySearch(String),
    Help,
    Unknown(String),
}

fn task_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)^(SAFE|BUILD|BUG):\s*(.+)$").expect("task pattern is a valid regex")
    })
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();

        if text == "/status" {
            return Command::Status;
        }

        if let Some(rest) = text.strip_prefix(MEMORY_SEARCH_PREFIX) {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                return Command::MemorySearch(rest.trim().to_string());
            }
        }

        if let Some(caps) = task_pattern().captures(text) {
            if let Some(intent) = Intent::from_prefix(&caps[1]) {
                return Command::Task {
                    intent,
                    description: caps[2].trim().to_string(),
                };
            }
        }

        if text.eq_ignore_ascii_case("help") || text.eq_ignore_ascii_case("/help") {
            return Command::Help;
        }

        Command::Unknown(text.to_string())
    }
}
