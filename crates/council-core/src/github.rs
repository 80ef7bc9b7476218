//! GitHub REST adapter for [`IssueTracker`].

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::domain::SchemaError;
use crate::meeting::SynthesisResult;
use crate::reporting::render_plan_comment;
use crate::services::{IssueRef, IssueStatus, IssueTracker, ServiceError, ServiceResult};
use crate::trace::{with_context, TraceContext};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("council/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct IssuePayload {
    number: u64,
    html_url: String,
    #[serde(default)]
    state: String,
}

#[derive(Debug, Clone)]
pub struct GitHubTracker {
    api_base: String,
    token: String,
    owner: String,
    repo: String,
    http: Client,
}

impl GitHubTracker {
    /// `repo` must be `owner/name`.
    pub fn new(token: impl Into<String>, repo: &str) -> Result<Self, SchemaError> {
        let (owner, name) = repo
            .split_once('/')
            .filter(|(o, n)| !o.is_empty() && !n.is_empty() && !n.contains('/'))
            .ok_or_else(|| SchemaError::InvalidRepo(repo.to_string()))?;
        Ok(Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.into(),
            owner: owner.to_string(),
            repo: name.to_string(),
            http: Client::new(),
        })
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn issues_url(&self) -> String {
        format!("{}/repos/{}/{}/issues", self.api_base, self.owner, self.repo)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
    }

    async fn send(&self, req: RequestBuilder) -> ServiceResult<Response> {
        let response = self
            .authorized(req)
            .send()
            .await
            .map_err(|e| ServiceError::Transient(format!("github request failed: {e}")))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response.text().await.unwrap_or_default();
        Err(classify_status(status, &detail))
    }
}

/// 429, 5xx and rate-limited 403s are transient.
fn classify_status(status: StatusCode, detail: &str) -> ServiceError {
    let rate_limited = status == StatusCode::FORBIDDEN && detail.contains("rate limit");
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() || rate_limited {
        ServiceError::Transient(format!("github {status}: {detail}"))
    } else {
        ServiceError::Permanent(format!("github {status}: {detail}"))
    }
}

async fn decode<T: for<'de> Deserialize<'de>>(response: Response) -> ServiceResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| ServiceError::Permanent(format!("unexpected github payload: {e}")))
}

#[async_trait]
impl IssueTracker for GitHubTracker {
    async fn create_issue(
        &self,
        ctx: &TraceContext,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> ServiceResult<IssueRef> {
        with_context(ctx, "GitHub Create Issue", async {
            let req = self
                .http
                .post(self.issues_url())
                .json(&json!({ "title": title, "body": body, "labels": labels }));
            let issue: IssuePayload = decode(self.send(req).await?).await?;
            Ok::<_, ServiceError>(IssueRef {
                number: issue.number,
                url: issue.html_url,
            })
        })
        .await
    }

    async fn post_result(
        &self,
        ctx: &TraceContext,
        issue_number: u64,
        result: &SynthesisResult,
        total_tokens: u64,
    ) -> ServiceResult<()> {
        let operation = format!("GitHub Create Comment [#{issue_number}]");
        with_context(ctx, &operation, async {
            let url = format!("{}/{issue_number}/comments", self.issues_url());
            let body = render_plan_comment(result, total_tokens);
            self.send(self.http.post(url).json(&json!({ "body": body })))
                .await?;
            Ok::<_, ServiceError>(())
        })
        .await
    }

    async fn last_issue(&self, ctx: &TraceContext) -> ServiceResult<Option<IssueStatus>> {
        with_context(ctx, "GitHub Last Issue", async {
            let req = self.http.get(self.issues_url()).query(&[
                ("state", "all"),
                ("sort", "created"),
                ("direction", "desc"),
                ("per_page", "1"),
            ]);
            let issues: Vec<IssuePayload> = decode(self.send(req).await?).await?;
            Ok::<_, ServiceError>(issues.into_iter().next().map(|i| IssueStatus {
                number: i.number,
                url: i.html_url,
                state: i.state,
            }))
        })
        .await
    }
}
