//! Borrower store messages
//!
//! Commands and responses for the actor pattern.

use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::{
    AnalysisResult, BorrowerProfile, BorrowerRecord, CallTurn, Category, FailReason,
};

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// No borrower with this id exists for any owner
    #[error("Borrower not found: {0}")]
    NotFound(String),

    /// The borrower exists but belongs to a different owner
    #[error("Borrower belongs to another owner: {0}")]
    Forbidden(String),

    /// The record was not InProgress for this owner (stale or duplicate
    /// completion/failure); record state is left untouched
    #[error("Record not claimed: {0}")]
    NotClaimed(String),

    /// SQLite-level failure; fatal to the calling batch
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Store channel closed")]
    ChannelClosed,
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Response from store operations
pub type StoreResponse<T> = Result<T, StoreError>;

/// Target of an administrative reset
#[derive(Debug, Clone)]
pub enum ResetTarget {
    One(String),
    All,
}

/// Commands sent to the BorrowerStore actor
#[derive(Debug)]
pub enum StoreCommand {
    Ingest {
        owner_id: String,
        profiles: Vec<BorrowerProfile>,
        reply: oneshot::Sender<StoreResponse<usize>>,
    },
    ListEligible {
        owner_id: String,
        category: Option<Category>,
        reply: oneshot::Sender<StoreResponse<Vec<BorrowerRecord>>>,
    },
    TryClaim {
        owner_id: String,
        borrower_id: String,
        reply: oneshot::Sender<StoreResponse<bool>>,
    },
    Complete {
        owner_id: String,
        borrower_id: String,
        analysis: AnalysisResult,
        follow_up_date: Option<NaiveDate>,
        transcript: Vec<CallTurn>,
        reply: oneshot::Sender<StoreResponse<()>>,
    },
    Fail {
        owner_id: String,
        borrower_id: String,
        reason: FailReason,
        reply: oneshot::Sender<StoreResponse<()>>,
    },
    Reset {
        owner_id: String,
        target: ResetTarget,
        reply: oneshot::Sender<StoreResponse<usize>>,
    },
    Get {
        owner_id: String,
        borrower_id: String,
        reply: oneshot::Sender<StoreResponse<Option<BorrowerRecord>>>,
    },
    Project {
        owner_id: String,
        reply: oneshot::Sender<StoreResponse<Vec<BorrowerRecord>>>,
    },
    Shutdown,
}
