//! Local memory store: keyword-scored retrieval over prior run summaries.
//!
//! Stands in for a vector store when none is configured. Entries live in
//! process memory and, when a snapshot path is given, are mirrored to a JSON
//! file that is loaded at start and rewritten on every insert.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::services::{MeetingLogEntry, MemoryService, MemorySummary, ServiceError, ServiceResult};

/// What a stored entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Final summary of a run; searchable as prompt context.
    Summary,
    /// Raw output of one role; kept for audit only.
    MeetingLog,
    /// Id of a processed webhook delivery.
    Delivery,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMemory {
    pub id: Uuid,
    pub kind: MemoryKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_issue: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fraction of the words in `query` that occur in `haystack`, case-insensitively.
pub(crate) fn keyword_overlap(query: &str, haystack: &str) -> f64 {
    let words: Vec<&str> = query.split_whitespace().collect();
    if words.is_empty() {
        return 0.0;
    }
    let haystack = haystack.to_lowercase();
    let matched = words
        .iter()
        .filter(|w| haystack.contains(&w.to_lowercase()))
        .count();
    matched as f64 / words.len() as f64
}

#[derive(Debug, Default)]
pub struct LocalMemoryStore {
    entries: Mutex<Vec<StoredMemory>>,
    snapshot: Option<PathBuf>,
}

impl LocalMemoryStore {
    /// Purely in-process store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store mirrored to `path`. Existing entries in the file are loaded.
    pub fn open(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("read memory snapshot {:?}", path))?;
            serde_json::from_str::<Vec<StoredMemory>>(&raw)
                .with_context(|| format!("parse memory snapshot {:?}", path))?
        } else {
            Vec::new()
        };
        info!(event = "memory.opened", path = ?path, entries = entries.len());
        Ok(Self {
            entries: Mutex::new(entries),
            snapshot: Some(path.to_path_buf()),
        })
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn entries(&self) -> Vec<StoredMemory> {
        self.entries.lock().await.clone()
    }

    async fn insert(&self, entry: StoredMemory) -> ServiceResult<()> {
        let mut entries = self.entries.lock().await;
        self.push(&mut entries, entry).await
    }

    /// Append `entry`; when the snapshot cannot be written the entry is dropped again.
    async fn push(&self, entries: &mut Vec<StoredMemory>, entry: StoredMemory) -> ServiceResult<()> {
        entries.push(entry);
        if let Some(path) = &self.snapshot {
            if let Err(e) = write_snapshot(path, entries).await {
                entries.pop();
                return Err(e);
            }
        }
        debug!(event = "memory.inserted", total = entries.len());
        Ok(())
    }
}

async fn write_snapshot(path: &Path, entries: &[StoredMemory]) -> ServiceResult<()> {
    let raw = serde_json::to_string_pretty(entries)
        .map_err(|e| ServiceError::Permanent(format!("serialize memory snapshot: {e}")))?;
    tokio::fs::write(path, raw)
        .await
        .map_err(|e| ServiceError::Transient(format!("write {:?}: {e}", path)))
}

#[async_trait]
impl MemoryService for LocalMemoryStore {
    async fn search(&self, query: &str, top_k: usize) -> ServiceResult<Vec<MemorySummary>> {
        let entries = self.entries.lock().await;
        let mut hits: Vec<MemorySummary> = entries
            .iter()
            .filter(|e| e.kind == MemoryKind::Summary)
            .filter_map(|e| {
                let score = keyword_overlap(query, &e.content);
                (score > 0.0).then(|| MemorySummary {
                    summary: e.content.clone(),
                    source_issue: e.source_issue,
                    score,
                    created_at: e.created_at,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn persist(&self, entry: MeetingLogEntry) -> ServiceResult<()> {
        let content = serde_json::to_string(&entry)
            .map_err(|e| ServiceError::Permanent(format!("serialize meeting log: {e}")))?;
        self.insert(StoredMemory {
            id: Uuid::new_v4(),
            kind: MemoryKind::MeetingLog,
            content,
            source_issue: entry.issue_number,
            trace_id: Some(entry.trace_id),
            created_at: entry.recorded_at,
        })
        .await
    }

    async fn save_summary(&self, summary: &str, source_issue: Option<u64>) -> ServiceResult<()> {
        self.insert(StoredMemory {
            id: Uuid::new_v4(),
            kind: MemoryKind::Summary,
            content: summary.to_string(),
            source_issue,
            trace_id: None,
            created_at: Utc::now(),
        })
        .await
    }

    async fn record_delivery(&self, delivery_id: &str) -> ServiceResult<bool> {
        let mut entries = self.entries.lock().await;
        if entries
            .iter()
            .any(|e| e.kind == MemoryKind::Delivery && e.content == delivery_id)
        {
            return Ok(false);
        }
        let entry = StoredMemory {
            id: Uuid::new_v4(),
            kind: MemoryKind::Delivery,
            content: delivery_id.to_string(),
            source_issue: None,
            trace_id: Some(delivery_id.to_string()),
            created_at: Utc::now(),
        };
        self.push(&mut entries, entry).await?;
        Ok(true)
    }
}
