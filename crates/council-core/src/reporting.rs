//! Markdown renderers for tracker comments and chat replies, plus the JSON
//! report artifact written by the CLI.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::domain::Intent;
use crate::meeting::SynthesisResult;
use crate::pipeline::PipelineReport;
use crate::services::MemorySummary;
use crate::trace::TraceContext;

/// Characters of each memory hit shown in a search reply.
pub const MEMORY_PREVIEW_CHARS: usize = 200;

const TITLE_CHARS: usize = 80;

/// `<TYPE>: <first 80 chars>` title for a new issue.
pub fn issue_title(intent: Intent, description: &str) -> String {
    let head: String = description.trim().chars().take(TITLE_CHARS).collect();
    format!("{intent}: {head}")
}

/// Body of the issue opened for a task command.
pub fn render_issue_body(intent: Intent, description: &str, ctx: &TraceContext) -> String {
    let mut out = String::new();
    out.push_str(&format!("**Type:** {intent}\n\n"));
    out.push_str("## Request\n");
    out.push_str(description.trim());
    out.push_str("\n\n---\n");
    out.push_str(&format!(
        "_Opened via {} · trace `{}`_\n",
        ctx.origin(),
        ctx.id()
    ));
    out
}

/// Comment carrying a synthesized plan.
pub fn render_plan_comment(result: &SynthesisResult, total_tokens: u64) -> String {
    let mut out = String::new();
    out.push_str("## 🧭 Plan\n");
    out.push_str(&result.plan);
    out.push_str("\n\n## ✅ Atomic Tasks\n");
    out.push_str(&result.atomic_tasks);
    out.push_str("\n\n## ⚠️ Risk Verdict\n");
    out.push_str(&result.risk_verdict);
    out.push_str(&format!("\n\n---\n_Tokens used: {total_tokens}_\n"));
    out
}

fn push_list(out: &mut String, heading: &str, items: Option<&[String]>) {
    out.push_str(&format!("\n*{heading}:*\n"));
    match items {
        Some(items) if !items.is_empty() => {
            for item in items {
                out.push_str(&format!("- {item}\n"));
            }
        }
        _ => out.push_str("None\n"),
    }
}

/// Chat reply for a finished pipeline run.
pub fn render_pipeline_reply(intent: Intent, description: &str, report: &PipelineReport) -> String {
    let head: String = description.chars().take(30).collect();
    let mut out = String::new();
    out.push_str(&format!("*{intent}: {head}...*\n\n"));
    out.push_str(&format!("*Intent:* {intent}\n"));
    out.push_str(&format!("*Status:* {}\n", report.result.status));
    out.push_str(&format!("*Trace:* `{}`\n", report.trace_id));
    out.push_str(&format!("\n*Summary:*\n{}\n", report.result.summary));
    push_list(&mut out, "Actions Taken", Some(&report.result.actions_taken));
    push_list(&mut out, "Links", report.result.links.as_deref());
    push_list(&mut out, "Next Steps", report.result.next_steps.as_deref());
    out
}

/// Chat reply for `/memory search`.
pub fn render_memory_hits(query: &str, hits: &[MemorySummary]) -> String {
    if hits.is_empty() {
        return format!("📭 No relevant memories found for \"{query}\".");
    }
    let mut out = String::from("🧠 *Memory Results:*\n");
    for (i, hit) in hits.iter().enumerate() {
        let preview: String = hit.summary.chars().take(MEMORY_PREVIEW_CHARS).collect();
        let source = hit
            .source_issue
            .map(|n| format!("#{n}"))
            .unwrap_or_else(|| "chat".to_string());
        out.push_str(&format!("\n*{}.* [{source}] {preview}", i + 1));
        if hit.summary.chars().count() > MEMORY_PREVIEW_CHARS {
            out.push_str("...");
        }
        out.push('\n');
    }
    out
}

pub fn render_help() -> String {
    "📖 Available commands:\n\
     - `SAFE: <description>`\n\
     - `BUILD: <description>`\n\
     - `BUG: <description>`\n\
     - `/status`\n\
     - `/memory search <query>`"
        .to_string()
}

/// Write any report as pretty JSON.
pub fn write_report_json<T: Serialize>(path: &Path, report: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("serialize report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentResult, ResultStatus, TaskSpec};
    use crate::trace::Origin;
    use chrono::Utc;

    #[test]
    fn issue_title_truncates_to_eighty_chars() {
        let title = issue_title(Intent::Bug, &"y".repeat(120));
        assert_eq!(title, format!("BUG: {}", "y".repeat(80)));
    }

    #[test]
    fn issue_body_carries_trace() {
        let ctx = TraceContext::with_id(Origin::ChatMessage, "t-1");
        let body = render_issue_body(Intent::Safe, " bump deps ", &ctx);
        assert!(body.contains("## Request\nbump deps"));
        assert!(body.contains("trace `t-1`"));
        assert!(body.contains("chat_message"));
    }

    #[test]
    fn plan_comment_render_is_stable() {
        let result = SynthesisResult {
            plan: "Ship it".to_string(),
            atomic_tasks: "- [ ] write code".to_string(),
            risk_verdict: "LOW".to_string(),
        };
        let md = render_plan_comment(&result, 1234);
        assert_eq!(
            md,
            "## 🧭 Plan\nShip it\n\n## ✅ Atomic Tasks\n- [ ] write code\n\n## ⚠️ Risk Verdict\nLOW\n\n---\n_Tokens used: 1234_\n"
        );
    }

    #[test]
    fn pipeline_reply_lists_sections() {
        let report = PipelineReport {
            trace_id: "t-9".to_string(),
            spec: TaskSpec::new(Intent::Build, "plan"),
            result: AgentResult {
                status: ResultStatus::Success,
                summary: "done (Validated)".to_string(),
                actions_taken: vec!["Verified inputs".to_string()],
                links: None,
                next_steps: Some(vec!["Await code review".to_string()]),
            },
            criteria: Vec::new(),
        };
        let reply = render_pipeline_reply(Intent::Build, "add dark mode toggle", &report);
        assert!(reply.contains("*Status:* SUCCESS"));
        assert!(reply.contains("*Trace:* `t-9`"));
        assert!(reply.contains("*Actions Taken:*\n- Verified inputs\n"));
        assert!(reply.contains("*Links:*\nNone\n"));
        assert!(reply.contains("*Next Steps:*\n- Await code review\n"));
    }

    #[test]
    fn memory_hits_are_truncated() {
        let hits = vec![MemorySummary {
            summary: "z".repeat(250),
            source_issue: Some(4),
            score: 1.0,
            created_at: Utc::now(),
        }];
        let reply = render_memory_hits("z", &hits);
        assert!(reply.contains(&format!("*1.* [#4] {}...", "z".repeat(200))));
        assert!(render_memory_hits("q", &[]).contains("No relevant memories"));
    }

    #[test]
    fn report_json_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_report_json(&path, &serde_json::json!({"total_tokens": 5})).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"total_tokens\": 5"));
    }
}
