//! Borrower record and its vocabulary types
//!
//! One `BorrowerRecord` exists per borrower per owning user. Profile fields
//! come from ingestion; lifecycle and outcome fields are driven exclusively
//! through the store's claim/complete/fail/reset operations.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Call lifecycle state of a borrower record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// No attempt in flight; eligible for claiming
    #[default]
    Idle,
    /// Exactly one attempt holds the claim on this record
    InProgress,
    /// A completed attempt wrote the outcome fields
    Completed,
}

impl CallStatus {
    /// Stable string form used in the SQLite column
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Five-way classification of a borrower's stated payment posture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Paid,
    WillPay,
    NeedsExtension,
    Dispute,
    NoResponse,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::WillPay => "will_pay",
            Self::NeedsExtension => "needs_extension",
            Self::Dispute => "dispute",
            Self::NoResponse => "no_response",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "paid" => Some(Self::Paid),
            "will_pay" => Some(Self::WillPay),
            "needs_extension" => Some(Self::NeedsExtension),
            "dispute" => Some(Self::Dispute),
            "no_response" => Some(Self::NoResponse),
            _ => None,
        }
    }

    /// Normalize a free-form classifier label into an intent.
    ///
    /// The classifier is prompted for one of five labels but models drift;
    /// spacing, case, and underscores are tolerated. Unrecognized labels
    /// return `None` and the analyzer maps that to `NoResponse`.
    pub fn from_label(label: &str) -> Option<Self> {
        let norm: String = label
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match norm.as_str() {
            "paid" => Some(Self::Paid),
            "willpay" => Some(Self::WillPay),
            "needsextension" => Some(Self::NeedsExtension),
            "dispute" => Some(Self::Dispute),
            "noresponse" => Some(Self::NoResponse),
            _ => None,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Due-date category assigned at ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    Consistent,
    Inconsistent,
    Overdue,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consistent => "consistent",
            Self::Inconsistent => "inconsistent",
            Self::Overdue => "overdue",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase();
        if lower.contains("inconsistent") {
            Some(Self::Inconsistent)
        } else if lower.contains("overdue") {
            Some(Self::Overdue)
        } else if lower.contains("consistent") {
            Some(Self::Consistent)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Preferred conversation language for a borrower
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    English,
    Hindi,
    Tamil,
}

impl Language {
    /// BCP-47-ish code passed to the telephony/speech services
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en-IN",
            Self::Hindi => "hi-IN",
            Self::Tamil => "ta-IN",
        }
    }

    /// Lenient normalization of ingested language strings.
    ///
    /// Accepts names ("Hindi"), codes ("hi", "hi-IN"), and variants like
    /// "English (UK)". Anything unrecognized falls back to English.
    pub fn normalize(s: &str) -> Self {
        let upper = s.trim().to_uppercase();
        if upper.contains("HINDI") || upper.starts_with("HI") {
            Self::Hindi
        } else if upper.contains("TAMIL") || upper.starts_with("TA") {
            Self::Tamil
        } else {
            Self::English
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::English => "english",
            Self::Hindi => "hindi",
            Self::Tamil => "tamil",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "english" => Some(Self::English),
            "hindi" => Some(Self::Hindi),
            "tamil" => Some(Self::Tamil),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who produced a transcript turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Agent,
    Borrower,
}

/// One turn of a call conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallTurn {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl CallTurn {
    pub fn new(speaker: Speaker, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            speaker,
            text: text.into(),
            timestamp,
        }
    }
}

/// Profile payload accepted at ingestion (one JSON object per borrower)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowerProfile {
    /// Unique within the owning user
    pub id: String,
    pub name: String,
    pub loan_amount: f64,
    pub emi: f64,
    pub mobile: String,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub last_paid: Option<NaiveDate>,
}

/// One borrower record, scoped to an owning user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowerRecord {
    /// Unique within the owner
    pub id: String,
    pub owner_id: String,

    // Profile (refreshed only by re-ingestion)
    pub name: String,
    pub loan_amount: f64,
    pub emi: f64,
    pub mobile: String,
    pub language: Language,
    pub category: Category,
    pub last_paid: Option<NaiveDate>,

    // Lifecycle
    pub call_status: CallStatus,

    // Outcome, populated only by a completed call
    pub intent: Option<Intent>,
    pub follow_up_date: Option<NaiveDate>,
    pub ai_summary: Option<String>,
    pub transcript: Option<Vec<CallTurn>>,

    /// Last mutation timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl BorrowerRecord {
    /// Build a fresh idle record from an ingested profile
    pub fn from_profile(owner_id: impl Into<String>, profile: BorrowerProfile) -> Self {
        Self {
            id: profile.id,
            owner_id: owner_id.into(),
            name: profile.name,
            loan_amount: profile.loan_amount,
            emi: profile.emi,
            mobile: profile.mobile,
            language: profile.language,
            category: profile.category,
            last_paid: profile.last_paid,
            call_status: CallStatus::Idle,
            intent: None,
            follow_up_date: None,
            ai_summary: None,
            transcript: None,
            updated_at: Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_from_label_variants() {
        assert_eq!(Intent::from_label("Will Pay"), Some(Intent::WillPay));
        assert_eq!(Intent::from_label("will_pay"), Some(Intent::WillPay));
        assert_eq!(Intent::from_label("WILLPAY"), Some(Intent::WillPay));
        assert_eq!(Intent::from_label("Needs Extension"), Some(Intent::NeedsExtension));
        assert_eq!(Intent::from_label("  paid "), Some(Intent::Paid));
        assert_eq!(Intent::from_label("No Response"), Some(Intent::NoResponse));
        assert_eq!(Intent::from_label("dispute"), Some(Intent::Dispute));
    }

    #[test]
    fn test_intent_from_label_unrecognized() {
        assert_eq!(Intent::from_label("Stop Calling"), None);
        assert_eq!(Intent::from_label("Abusive Language"), None);
        assert_eq!(Intent::from_label(""), None);
    }

    #[test]
    fn test_call_status_round_trip() {
        for status in [CallStatus::Idle, CallStatus::InProgress, CallStatus::Completed] {
            assert_eq!(CallStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(CallStatus::parse("bogus"), None);
    }

    #[test]
    fn test_language_normalize() {
        assert_eq!(Language::normalize("Hindi"), Language::Hindi);
        assert_eq!(Language::normalize("hi-IN"), Language::Hindi);
        assert_eq!(Language::normalize("TAMIL"), Language::Tamil);
        assert_eq!(Language::normalize("ta"), Language::Tamil);
        assert_eq!(Language::normalize("English (UK)"), Language::English);
        assert_eq!(Language::normalize("klingon"), Language::English);
    }

    #[test]
    fn test_category_parse_is_lenient() {
        assert_eq!(Category::parse("Overdue EMI"), Some(Category::Overdue));
        assert_eq!(Category::parse("inconsistent"), Some(Category::Inconsistent));
        // "inconsistent" contains "consistent"; order matters
        assert_eq!(Category::parse("Consistent"), Some(Category::Consistent));
        assert_eq!(Category::parse("unknown"), None);
    }

    #[test]
    fn test_call_turn_serde_round_trip() {
        let turn = CallTurn::new(Speaker::Borrower, "I will pay tomorrow", Utc::now());
        let json = serde_json::to_string(&turn).unwrap();
        let back: CallTurn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, turn);
    }
}
