//! Per-run token ledger with a hard cap.
//!
//! The ledger is append-only and owned by a single run. The orchestrator
//! consults [`TokenLedger::is_over_budget`] *before* each role step; usage is
//! only ever added after a call completes.

use serde::{Deserialize, Serialize};
use tracing::info;

/// Default hard cap on cumulative tokens for one run.
pub const HARD_BUDGET: u64 = 25_000;

/// One ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub role: String,
    pub tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLedger {
    entries: Vec<TokenUsage>,
    cap: u64,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::with_cap(HARD_BUDGET)
    }

    pub fn with_cap(cap: u64) -> Self {
        Self {
            entries: Vec::new(),
            cap,
        }
    }

    /// Append usage for `role` and log the running total.
    pub fn record(&mut self, role: impl Into<String>, tokens: u64) {
        let role = role.into();
        self.entries.push(TokenUsage {
            role: role.clone(),
            tokens,
        });
        info!(
            event = "budget.recorded",
            role = %role,
            tokens = tokens,
            running_total = self.total(),
            cap = self.cap,
        );
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|e| e.tokens).sum()
    }

    pub fn cap(&self) -> u64 {
        self.cap
    }

    pub fn is_over_budget(&self) -> bool {
        self.total() >= self.cap
    }

    /// Entries in recording order.
    pub fn breakdown(&self) -> &[TokenUsage] {
        &self.entries
    }

    /// Deterministic per-role breakdown plus a total-versus-cap line.
    pub fn summary(&self) -> String {
        let mut out = String::from("Token usage breakdown:\n");
        for entry in &self.entries {
            out.push_str(&format!("  {}: {}\n", entry.role, entry.tokens));
        }
        out.push_str(&format!("  TOTAL: {} / {}", self.total(), self.cap));
        out
    }
}

impl Default for TokenLedger {
    fn default() -> Self {
        Self::new()
    }
}
