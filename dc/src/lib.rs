//! Duncall - call orchestration and payment-intent resolution for
//! collections workflows
//!
//! The engine ingests borrower profiles, dispatches bounded-parallel call
//! batches through a telephony boundary, classifies each finished
//! conversation into a payment intent, schedules follow-ups, and projects
//! reports. Records are owner-scoped; claim/complete/fail transitions are
//! atomic in the store.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod report;
pub mod schedule;
pub mod store;
pub mod telephony;

pub use analysis::{Classifier, ClassifierError, ConversationAnalyzer, GroqClassifier};
pub use config::Config;
pub use dispatch::CallDispatcher;
pub use domain::{
    AnalysisResult, BatchSummary, BorrowerProfile, BorrowerRecord, CallStatus, Category, Intent,
    Language,
};
pub use report::ReportProjector;
pub use schedule::follow_up;
pub use store::{BorrowerStore, ResetTarget, StoreError};
pub use telephony::{CallPlacer, PlacementError, Scenario, SimulatedPlacer};
