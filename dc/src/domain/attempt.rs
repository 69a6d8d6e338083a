//! Transient values produced during a dispatch batch
//!
//! None of these are persisted beyond the batch; the store only ever sees
//! the final outcome fields written by `complete`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Intent;

/// Normalized output of the conversation analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub intent: Intent,
    pub payment_date: Option<NaiveDate>,
    pub summary: String,
}

impl AnalysisResult {
    /// Fallback result applied when the classifier is unavailable.
    ///
    /// A downstream outage must not strand a claimed record, so the attempt
    /// still completes with this result instead of propagating the error.
    pub fn degraded() -> Self {
        Self {
            intent: Intent::NoResponse,
            payment_date: None,
            summary: String::new(),
        }
    }
}

/// Why a claimed attempt released its record without completing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailReason {
    Unreachable,
    Busy,
    Timeout,
    Cancelled,
}

impl std::fmt::Display for FailReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unreachable => "unreachable",
            Self::Busy => "busy",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Per-batch tallies returned by the dispatcher.
///
/// A batch is not atomic across borrowers; partial completion is the normal
/// outcome, not an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Attempts that reached `Completed` (including degraded analysis)
    pub completed: usize,
    /// Borrowers skipped because the claim was already held
    pub skipped: usize,
    /// Attempts that failed and released their claim
    pub failed: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.failed
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} completed, {} skipped, {} failed",
            self.completed, self.skipped, self.failed
        )
    }
}
