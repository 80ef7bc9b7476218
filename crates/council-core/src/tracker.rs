//! Process-local issue tracker, used when no GitHub token is configured.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::meeting::synthesis::SynthesisResult;
use crate::services::{IssueRef, IssueStatus, IssueTracker, ServiceError, ServiceResult};
use crate::trace::TraceContext;

/// A plan posted as a comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedResult {
    pub issue_number: u64,
    pub result: SynthesisResult,
    pub total_tokens: u64,
    pub trace_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedIssue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

/// Numbers issues from 1 and keeps them, and every posted plan, in memory.
#[derive(Debug, Default)]
pub struct LocalTracker {
    issues: Mutex<Vec<CreatedIssue>>,
    posted: Mutex<Vec<PostedResult>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LocalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issues(&self) -> Vec<CreatedIssue> {
        lock(&self.issues).clone()
    }

    pub fn posted(&self) -> Vec<PostedResult> {
        lock(&self.posted).clone()
    }

    pub fn url_for(number: u64) -> String {
        format!("local://issues/{number}")
    }
}

#[async_trait]
impl IssueTracker for LocalTracker {
    async fn create_issue(
        &self,
        ctx: &TraceContext,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> ServiceResult<IssueRef> {
        let mut issues = lock(&self.issues);
        let number = issues.len() as u64 + 1;
        issues.push(CreatedIssue {
            number,
            title: title.to_string(),
            body: body.to_string(),
            labels: labels.to_vec(),
        });
        debug!(event = "tracker.issue_created", trace_id = %ctx.id(), number);
        Ok(IssueRef {
            number,
            url: Self::url_for(number),
        })
    }

    async fn post_result(
        &self,
        ctx: &TraceContext,
        issue_number: u64,
        result: &SynthesisResult,
        total_tokens: u64,
    ) -> ServiceResult<()> {
        if !lock(&self.issues).iter().any(|i| i.number == issue_number) {
            return Err(ServiceError::Permanent(format!(
                "issue #{issue_number} not found"
            )));
        }
        lock(&self.posted).push(PostedResult {
            issue_number,
            result: result.clone(),
            total_tokens,
            trace_id: ctx.id().to_string(),
        });
        Ok(())
    }

    async fn last_issue(&self, _ctx: &TraceContext) -> ServiceResult<Option<IssueStatus>> {
        Ok(lock(&self.issues).last().map(|i| IssueStatus {
            number: i.number,
            url: Self::url_for(i.number),
            state: "open".to_string(),
        }))
    }
}
