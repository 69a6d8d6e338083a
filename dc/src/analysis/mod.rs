//! Conversation analysis
//!
//! Turns a finished transcript into a normalized `AnalysisResult`. The
//! provider-specific HTTP client lives behind the `Classifier` trait; this
//! module owns the normalization rules the rest of the engine depends on.

mod classifier;
mod groq;

pub use classifier::{Classifier, ClassifierError, RawClassification};
pub use groq::GroqClassifier;

#[cfg(test)]
pub use classifier::mock;

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::domain::{AnalysisResult, CallTurn, Intent};

/// Normalizing front-end over a `Classifier`
#[derive(Clone)]
pub struct ConversationAnalyzer {
    classifier: Arc<dyn Classifier>,
}

impl ConversationAnalyzer {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    /// Classify a transcript into an intent, optional payment date, and
    /// summary.
    ///
    /// An empty transcript means nobody spoke; it short-circuits to the
    /// degraded result without a network call. Unknown intent labels map to
    /// `NoResponse`; an absent, `"null"`, or malformed payment date maps to
    /// `None`. Classifier errors propagate so the caller can decide whether
    /// to retry or degrade.
    pub async fn analyze(&self, transcript: &[CallTurn]) -> Result<AnalysisResult, ClassifierError> {
        if transcript.is_empty() {
            debug!("analyze: empty transcript, returning degraded result");
            return Ok(AnalysisResult::degraded());
        }

        let raw = self.classifier.classify(transcript).await?;
        let intent = match Intent::from_label(&raw.intent_label) {
            Some(intent) => intent,
            None => {
                warn!("analyze: unknown intent label {:?}", raw.intent_label);
                Intent::NoResponse
            }
        };
        let payment_date = raw.payment_date.as_deref().and_then(parse_payment_date);
        Ok(AnalysisResult {
            intent,
            payment_date,
            summary: raw.summary,
        })
    }
}

fn parse_payment_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("null")
        || trimmed.eq_ignore_ascii_case("none")
    {
        return None;
    }
    match NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(e) => {
            warn!("parse_payment_date: ignoring {:?}: {}", raw, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockClassifier;
    use super::*;
    use crate::domain::Speaker;
    use chrono::Utc;

    fn transcript() -> Vec<CallTurn> {
        vec![CallTurn::new(
            Speaker::Borrower,
            "I will pay on the 25th",
            Utc::now(),
        )]
    }

    #[tokio::test]
    async fn test_analyze_normalizes_label_and_date() {
        let classifier = MockClassifier::new().push_label(
            "Will Pay",
            Some("2026-02-25"),
            "Borrower committed to pay on the 25th.",
        );
        let analyzer = ConversationAnalyzer::new(Arc::new(classifier));
        let result = analyzer.analyze(&transcript()).await.unwrap();
        assert_eq!(result.intent, Intent::WillPay);
        assert_eq!(result.payment_date, NaiveDate::from_ymd_opt(2026, 2, 25));
        assert_eq!(result.summary, "Borrower committed to pay on the 25th.");
    }

    #[tokio::test]
    async fn test_analyze_unknown_label_becomes_no_response() {
        let classifier = MockClassifier::new().push_label("Wrong Number", None, "Misdial.");
        let analyzer = ConversationAnalyzer::new(Arc::new(classifier));
        let result = analyzer.analyze(&transcript()).await.unwrap();
        assert_eq!(result.intent, Intent::NoResponse);
    }

    #[tokio::test]
    async fn test_analyze_tolerates_bad_dates() {
        for bad in ["null", "none", "", "next friday", "25-02-2026"] {
            let classifier = MockClassifier::new().push_label("Will Pay", Some(bad), "");
            let analyzer = ConversationAnalyzer::new(Arc::new(classifier));
            let result = analyzer.analyze(&transcript()).await.unwrap();
            assert_eq!(result.payment_date, None, "date {bad:?} should be dropped");
        }
    }

    #[tokio::test]
    async fn test_analyze_empty_transcript_skips_classifier() {
        let classifier = Arc::new(MockClassifier::new().push_label("Paid", None, "unused"));
        let analyzer = ConversationAnalyzer::new(classifier.clone());
        let result = analyzer.analyze(&[]).await.unwrap();
        assert_eq!(result, AnalysisResult::degraded());
        assert_eq!(classifier.call_count(), 0);
    }

    #[tokio::test]
    async fn test_analyze_propagates_classifier_errors() {
        let classifier = MockClassifier::new(); // empty queue -> Unavailable
        let analyzer = ConversationAnalyzer::new(Arc::new(classifier));
        let err = analyzer.analyze(&transcript()).await.unwrap_err();
        assert!(matches!(err, ClassifierError::Unavailable(_)));
    }
}
