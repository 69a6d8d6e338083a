//! Classifier abstraction
//!
//! The dispatcher never sees a provider directly; it goes through
//! `ConversationAnalyzer`, which goes through this trait.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::CallTurn;

/// Errors from conversation classification
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Provider is down or misconfigured; callers degrade instead of aborting
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),

    #[error("Classifier request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// Response arrived but did not contain usable content
    #[error("Invalid classifier response: {0}")]
    InvalidResponse(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClassifierError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::ApiError { status, .. } => {
                matches!(status, 408 | 429) || (500..=599).contains(status)
            }
            _ => false,
        }
    }
}

/// Unvalidated classifier output, exactly as the model returned it.
///
/// Normalization into an `AnalysisResult` happens in the analyzer; keeping
/// the raw strings here means a drifting model shows up in logs verbatim.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawClassification {
    #[serde(rename = "intent")]
    pub intent_label: String,
    #[serde(default)]
    pub payment_date: Option<String>,
    #[serde(default)]
    pub summary: String,
}

/// Classifies a finished conversation transcript
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, transcript: &[CallTurn]) -> Result<RawClassification, ClassifierError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        for status in [408, 429, 500, 502, 503] {
            let err = ClassifierError::ApiError {
                status,
                message: String::new(),
            };
            assert!(err.is_retryable(), "status {status} should be retryable");
        }
        for status in [400, 401, 403, 404, 422] {
            let err = ClassifierError::ApiError {
                status,
                message: String::new(),
            };
            assert!(!err.is_retryable(), "status {status} should not retry");
        }
        assert!(ClassifierError::Timeout.is_retryable());
        assert!(!ClassifierError::Unavailable("down".into()).is_retryable());
        assert!(!ClassifierError::InvalidResponse("empty".into()).is_retryable());
    }

    #[test]
    fn test_raw_classification_tolerates_missing_fields() {
        let raw: RawClassification = serde_json::from_str(r#"{"intent": "Paid"}"#).unwrap();
        assert_eq!(raw.intent_label, "Paid");
        assert_eq!(raw.payment_date, None);
        assert_eq!(raw.summary, "");
    }
}
