//! Council CLI
//!
//! The `council` command turns a short request into an engineering plan.
//!
//! ## Commands
//!
//! - `handle`: route one chat line (`BUILD: ...`, `/status`, `/memory search ...`)
//! - `meeting`: run the six-role meeting and print the synthesized plan
//! - `pipeline`: run Planner → Worker → Validator and print the result
//! - `webhook`: accept one tracker webhook delivery, ignoring redeliveries

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use council_core::meeting::prompt::render_memory_context;
use council_core::reporting::{render_pipeline_reply, render_plan_comment, write_report_json};
use council_core::telemetry::{default_level, init_tracing};
use council_core::webhook::{handle_delivery, DeliveryOutcome};
use council_core::{
    AgentPipeline, CompletionPlanner, CompletionService, Dispatcher, GitHubTracker, Intent,
    IssueTracker, LocalMemoryStore, LocalTracker, MeetingConfig, MeetingOrchestrator, MeetingRequest,
    MemoryService, OpenAiClient, Origin, SimulatedWorker, TemplatePlanner, TraceContext,
    UnavailableCompletion, Variant,
};

#[derive(Parser)]
#[command(name = "council")]
#[command(version = council_core::VERSION)]
#[command(about = "Multi-agent planning for engineering requests", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and JSON results
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

/// Service wiring, from flags or the environment.
#[derive(Args, Debug, Clone)]
struct Settings {
    /// API key for the completion service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    openai_api_key: Option<String>,

    /// OpenAI-compatible base URL
    #[arg(
        long,
        env = "OPENAI_BASE_URL",
        default_value = council_core::openai::DEFAULT_BASE_URL,
        global = true
    )]
    openai_base_url: String,

    /// Model used for every completion call
    #[arg(long, env = "LLM_MODEL", default_value = council_core::openai::DEFAULT_MODEL, global = true)]
    model: String,

    /// GitHub token; without it issues are kept in memory
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    github_token: Option<String>,

    /// Target repository as owner/repo
    #[arg(long, env = "GITHUB_REPO", global = true)]
    github_repo: Option<String>,

    /// JSON file mirroring the local memory store
    #[arg(long, env = "COUNCIL_MEMORY_FILE", global = true)]
    memory_file: Option<PathBuf>,

    /// Per-run token cap
    #[arg(long, env = "COUNCIL_TOKEN_BUDGET", default_value_t = council_core::HARD_BUDGET, global = true)]
    token_budget: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle one chat line and print the reply
    Handle {
        /// The chat text, e.g. "BUILD: add dark mode toggle"
        text: String,

        /// Run task commands through the pipeline instead of the meeting
        #[arg(long)]
        pipeline: bool,
    },

    /// Run the six-role meeting for a request
    Meeting {
        /// SAFE, BUILD, BUG or UNKNOWN
        #[arg(short, long)]
        intent: Intent,

        /// Existing issue to post the plan to
        #[arg(long)]
        issue: Option<u64>,

        /// Write the full report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        description: String,
    },

    /// Run Planner → Worker → Validator for a request
    Pipeline {
        /// SAFE, BUILD, BUG or UNKNOWN
        #[arg(short, long)]
        intent: Intent,

        /// Ask the model for the task instead of using the template
        #[arg(long)]
        model_planner: bool,

        /// Write the full report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        description: String,
    },

    /// Accept a tracker webhook delivery
    Webhook {
        /// Delivery id from the X-GitHub-Delivery header
        #[arg(long, env = "GITHUB_DELIVERY")]
        delivery_id: Option<String>,
    },
}

impl Settings {
    fn completion(&self) -> Result<Arc<dyn CompletionService>> {
        let key = self
            .openai_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .context("OPENAI_API_KEY is required for model-backed commands")?;
        Ok(Arc::new(
            OpenAiClient::new(key)
                .with_base_url(&self.openai_base_url)
                .with_model(&self.model),
        ))
    }

    fn memory(&self) -> Result<Arc<dyn MemoryService>> {
        Ok(match &self.memory_file {
            Some(path) => Arc::new(
                LocalMemoryStore::open(path)
                    .with_context(|| format!("Failed to open memory file {:?}", path))?,
            ),
            None => Arc::new(LocalMemoryStore::new()),
        })
    }

    fn tracker(&self) -> Result<Arc<dyn IssueTracker>> {
        match &self.github_token {
            Some(token) => {
                let repo = self
                    .github_repo
                    .as_deref()
                    .context("GITHUB_REPO is required when GITHUB_TOKEN is set")?;
                let tracker = GitHubTracker::new(token.as_str(), repo)
                    .with_context(|| format!("Invalid GITHUB_REPO {repo:?}"))?;
                Ok(Arc::new(tracker))
            }
            None => {
                info!(event = "tracker.local", "GITHUB_TOKEN not set; issues stay local");
                Ok(Arc::new(LocalTracker::new()))
            }
        }
    }

    fn meeting_config(&self) -> MeetingConfig {
        MeetingConfig {
            token_budget: self.token_budget,
            ..MeetingConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json, default_level(cli.verbose));

    match cli.command {
        Commands::Handle { text, pipeline } => cmd_handle(&cli.settings, &text, pipeline).await,
        Commands::Meeting {
            intent,
            issue,
            output,
            description,
        } => {
            cmd_meeting(
                &cli.settings,
                intent,
                issue,
                &description,
                output.as_deref(),
                cli.json,
            )
            .await
        }
        Commands::Pipeline {
            intent,
            model_planner,
            output,
            description,
        } => {
            cmd_pipeline(
                &cli.settings,
                intent,
                model_planner,
                &description,
                output.as_deref(),
                cli.json,
            )
            .await
        }
        Commands::Webhook { delivery_id } => {
            cmd_webhook(&cli.settings, delivery_id.as_deref(), cli.json)
                .await
                .map(|_| ())
        }
    }
}

async fn cmd_handle(settings: &Settings, text: &str, pipeline: bool) -> Result<()> {
    let memory = settings.memory()?;
    let variant = if pipeline {
        Variant::Pipeline
    } else {
        Variant::Meeting
    };
    // Status, memory and help lines never reach the model.
    let completion = settings.completion().unwrap_or_else(|e| {
        if variant == Variant::Meeting {
            warn!(error = %e, "meeting roles will report the model as unavailable");
        }
        Arc::new(UnavailableCompletion::new("OPENAI_API_KEY not set"))
    });
    let meeting = MeetingOrchestrator::new(completion, memory.clone())
        .with_config(settings.meeting_config());
    let dispatcher = Dispatcher::new(meeting, AgentPipeline::simulated(), settings.tracker()?, memory)
        .with_variant(variant);

    let ctx = TraceContext::new(Origin::ChatMessage);
    let reply = dispatcher
        .handle(&ctx, text)
        .await
        .context("Failed to handle message")?;
    println!("{reply}");
    Ok(())
}

async fn cmd_meeting(
    settings: &Settings,
    intent: Intent,
    issue: Option<u64>,
    description: &str,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    let orchestrator = MeetingOrchestrator::new(settings.completion()?, settings.memory()?)
        .with_config(settings.meeting_config());
    let mut request = MeetingRequest::new(intent, description);
    if let Some(n) = issue {
        request = request.with_issue(n);
    }

    let ctx = TraceContext::new(Origin::Internal);
    let report = orchestrator.run(&ctx, &request).await;

    if let Some(n) = issue {
        settings
            .tracker()?
            .post_result(&ctx, n, &report.synthesis, report.total_tokens)
            .await
            .with_context(|| format!("Failed to post plan to issue #{n}"))?;
    }
    if report.fallback_used {
        warn!(trace_id = %report.trace_id, "synthesis fell back after {} passes", report.synthesis_passes);
    }
    if let Some(path) = output {
        write_report_json(path, &report)?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", render_plan_comment(&report.synthesis, report.total_tokens));
        println!("{}", report.usage_summary);
        println!("Trace: {}", report.trace_id);
    }
    Ok(())
}

async fn cmd_pipeline(
    settings: &Settings,
    intent: Intent,
    model_planner: bool,
    description: &str,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    let pipeline = if model_planner {
        AgentPipeline::new(
            Arc::new(CompletionPlanner::new(settings.completion()?)),
            Arc::new(SimulatedWorker::new()),
        )
    } else {
        AgentPipeline::new(Arc::new(TemplatePlanner::new()), Arc::new(SimulatedWorker::new()))
    };

    let memory = settings.memory()?;
    let memory_context = match memory.search(description, MeetingConfig::default().memory_top_k).await {
        Ok(hits) => render_memory_context(&hits),
        Err(e) => {
            warn!(error = %e, "memory search failed; continuing without context");
            String::new()
        }
    };

    let ctx = TraceContext::new(Origin::Internal);
    let report = pipeline
        .execute(&ctx, intent, description, &memory_context)
        .await
        .context("Pipeline run failed")?;

    if let Some(path) = output {
        write_report_json(path, &report)?;
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", render_pipeline_reply(intent, description, &report));
    }
    Ok(())
}

async fn cmd_webhook(
    settings: &Settings,
    delivery_id: Option<&str>,
    json: bool,
) -> Result<DeliveryOutcome> {
    let memory = settings.memory()?;
    let outcome = handle_delivery(memory.as_ref(), delivery_id)
        .await
        .context("Webhook delivery rejected")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if outcome.is_duplicate() {
        println!("Duplicate delivery ignored: {}", outcome.trace_id());
    } else {
        println!("Webhook processed: {}", outcome.trace_id());
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_meeting_with_issue() {
        let cli = Cli::try_parse_from([
            "council",
            "meeting",
            "--intent",
            "build",
            "--issue",
            "12",
            "add dark mode toggle",
        ])
        .unwrap();
        match cli.command {
            Commands::Meeting {
                intent,
                issue,
                description,
                ..
            } => {
                assert_eq!(intent, Intent::Build);
                assert_eq!(issue, Some(12));
                assert_eq!(description, "add dark mode toggle");
            }
            _ => panic!("expected meeting"),
        }
    }

    #[test]
    fn rejects_unknown_intent() {
        assert!(Cli::try_parse_from(["council", "pipeline", "--intent", "deploy", "x"]).is_err());
    }

    #[test]
    fn token_budget_flag_overrides_default() {
        let cli = Cli::try_parse_from([
            "council",
            "--token-budget",
            "1000",
            "handle",
            "/status",
        ])
        .unwrap();
        assert_eq!(cli.settings.meeting_config().token_budget, 1000);
        assert_eq!(cli.settings.meeting_config().max_synthesis_passes, 2);
    }

    #[test]
    fn github_token_requires_repo() {
        let settings = Settings {
            openai_api_key: None,
            openai_base_url: council_core::openai::DEFAULT_BASE_URL.to_string(),
            model: council_core::openai::DEFAULT_MODEL.to_string(),
            github_token: Some("t".to_string()),
            github_repo: None,
            memory_file: None,
            token_budget: 25_000,
        };
        assert!(settings.tracker().is_err());
        assert!(settings.completion().is_err());
    }

    #[tokio::test]
    async fn pipeline_runs_without_model_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("report.json");
        let settings = Settings {
            openai_api_key: None,
            openai_base_url: council_core::openai::DEFAULT_BASE_URL.to_string(),
            model: council_core::openai::DEFAULT_MODEL.to_string(),
            github_token: None,
            github_repo: None,
            memory_file: None,
            token_budget: 25_000,
        };
        cmd_pipeline(&settings, Intent::Bug, false, "crash on login", Some(&out), false)
            .await
            .unwrap();
        let raw = std::fs::read_to_string(&out).unwrap();
        assert!(raw.contains("\"status\": \"SUCCESS\""));
    }

    #[tokio::test]
    async fn webhook_redelivery_is_ignored_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            openai_api_key: None,
            openai_base_url: council_core::openai::DEFAULT_BASE_URL.to_string(),
            model: council_core::openai::DEFAULT_MODEL.to_string(),
            github_token: None,
            github_repo: None,
            memory_file: Some(dir.path().join("memory.json")),
            token_budget: 25_000,
        };

        let first = cmd_webhook(&settings, Some("d-100"), false).await.unwrap();
        let second = cmd_webhook(&settings, Some("d-100"), true).await.unwrap();

        assert!(!first.is_duplicate());
        assert!(second.is_duplicate());
        assert!(cmd_webhook(&settings, None, false).await.is_err());
    }
}
