//! Domain types for the call orchestration engine
//!
//! Borrower records, intents, and the transient values that flow between
//! the dispatcher, analyzer, and store.

mod attempt;
mod borrower;

pub use attempt::{AnalysisResult, BatchSummary, FailReason};
pub use borrower::{
    BorrowerProfile, BorrowerRecord, CallStatus, CallTurn, Category, Intent, Language, Speaker,
};
