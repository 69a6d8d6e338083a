//! Telephony boundary
//!
//! The dispatcher only ever talks to a `CallPlacer`. The one built-in
//! implementation is the simulated placer; a real transport would slot in
//! behind the same trait.

mod simulated;

pub use simulated::{Scenario, SimulatedPlacer};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{CallTurn, FailReason, Language};

/// Errors from placing a call
#[derive(Debug, Clone, Error)]
pub enum PlacementError {
    #[error("Number unreachable: {0}")]
    Unreachable(String),

    #[error("Line busy: {0}")]
    Busy(String),

    #[error("Call timed out")]
    Timeout,
}

impl PlacementError {
    /// All placement errors are transient; the dispatcher retries them
    /// before giving up on the attempt.
    pub fn fail_reason(&self) -> FailReason {
        match self {
            Self::Unreachable(_) => FailReason::Unreachable,
            Self::Busy(_) => FailReason::Busy,
            Self::Timeout => FailReason::Timeout,
        }
    }
}

/// Places an outbound call and returns the finished conversation transcript
#[async_trait]
pub trait CallPlacer: Send + Sync {
    async fn place_call(
        &self,
        mobile: &str,
        language: Language,
    ) -> Result<Vec<CallTurn>, PlacementError>;
}

/// Normalize a mobile number for dialing.
///
/// Strips `+`, spaces, and dashes; bare 10-digit Indian mobiles (leading
/// digit 6-9) get the country code prepended. Anything else passes through
/// as cleaned digits.
pub fn normalize_mobile(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '+' | ' ' | '-'))
        .collect();
    if cleaned.len() == 10 && cleaned.starts_with(['6', '7', '8', '9']) {
        format!("91{cleaned}")
    } else {
        cleaned
    }
}

#[cfg(test)]
pub mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    use super::*;
    use crate::domain::Speaker;

    /// Scripted placer for dispatcher tests: pops one queued outcome per
    /// call, falling back to a one-turn transcript once the queue is empty.
    pub struct MockPlacer {
        outcomes: Mutex<VecDeque<Result<Vec<CallTurn>, PlacementError>>>,
        call_count: AtomicUsize,
    }

    impl MockPlacer {
        pub fn new() -> Self {
            Self {
                outcomes: Mutex::new(VecDeque::new()),
                call_count: AtomicUsize::new(0),
            }
        }

        pub fn push(self, outcome: Result<Vec<CallTurn>, PlacementError>) -> Self {
            self.outcomes.lock().unwrap().push_back(outcome);
            self
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        pub fn sample_transcript() -> Vec<CallTurn> {
            vec![
                CallTurn::new(Speaker::Agent, "Hello, this is about your EMI.", Utc::now()),
                CallTurn::new(Speaker::Borrower, "I will pay this week.", Utc::now()),
            ]
        }
    }

    #[async_trait]
    impl CallPlacer for MockPlacer {
        async fn place_call(
            &self,
            _mobile: &str,
            _language: Language,
        ) -> Result<Vec<CallTurn>, PlacementError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Self::sample_transcript()))
        }
    }
}
