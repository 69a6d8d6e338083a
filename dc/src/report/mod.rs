//! Reporting
//!
//! Read-only projections of the borrower table. Snapshots come straight from
//! the store actor, so a report taken during a running batch sees each record
//! either before or after a transition, never mid-write.

use crate::domain::BorrowerRecord;
use crate::store::{BorrowerStore, StoreResponse};

const CSV_HEADER: &str = "id,name,loan_amount,emi,mobile,language,category,last_paid,\
     call_status,intent,follow_up_date,ai_summary,transcript";

/// Owner-scoped read access over the store
#[derive(Clone)]
pub struct ReportProjector {
    store: BorrowerStore,
}

impl ReportProjector {
    pub fn new(store: BorrowerStore) -> Self {
        Self { store }
    }

    /// Snapshot of every record for this owner, ordered by borrower id
    pub async fn project(&self, owner_id: &str) -> StoreResponse<Vec<BorrowerRecord>> {
        self.store.project(owner_id).await
    }
}

/// Render records as CSV with a header row
pub fn to_csv(records: &[BorrowerRecord]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for record in records {
        let transcript_json = record
            .transcript
            .as_ref()
            .and_then(|t| serde_json::to_string(t).ok())
            .unwrap_or_default();
        let fields = [
            record.id.clone(),
            record.name.clone(),
            record.loan_amount.to_string(),
            record.emi.to_string(),
            record.mobile.clone(),
            record.language.to_string(),
            record.category.to_string(),
            record
                .last_paid
                .map(|d| d.to_string())
                .unwrap_or_default(),
            record.call_status.to_string(),
            record
                .intent
                .map(|i| i.to_string())
                .unwrap_or_default(),
            record
                .follow_up_date
                .map(|d| d.to_string())
                .unwrap_or_default(),
            record.ai_summary.clone().unwrap_or_default(),
            transcript_json,
        ];
        let row: Vec<String> = fields.iter().map(|f| csv_escape(f)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// RFC 4180 quoting: wrap fields containing commas, quotes, or newlines
fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BorrowerProfile, CallStatus, Category, Intent, Language};
    use chrono::NaiveDate;

    fn record(id: &str, name: &str) -> BorrowerRecord {
        BorrowerRecord::from_profile(
            "u1",
            BorrowerProfile {
                id: id.to_string(),
                name: name.to_string(),
                loan_amount: 100_000.0,
                emi: 5_000.0,
                mobile: "9876543210".to_string(),
                language: Language::English,
                category: Category::Consistent,
                last_paid: None,
            },
        )
    }

    #[test]
    fn test_to_csv_basic_rows() {
        let mut completed = record("b1", "Asha");
        completed.call_status = CallStatus::Completed;
        completed.intent = Some(Intent::WillPay);
        completed.follow_up_date = NaiveDate::from_ymd_opt(2026, 2, 25);
        completed.ai_summary = Some("Will pay on the 25th".to_string());

        let csv = to_csv(&[completed, record("b2", "Ravi")]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,name,"));
        assert!(lines[1].contains("will_pay"));
        assert!(lines[1].contains("2026-02-25"));
        assert!(lines[2].starts_with("b2,Ravi,"));
        // empty optionals render as empty fields, not "None"
        assert!(lines[2].contains(",idle,,,"));
    }

    #[test]
    fn test_csv_escaping() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn test_to_csv_quotes_summary_with_commas() {
        let mut rec = record("b1", "Asha");
        rec.ai_summary = Some("Disputed, claims loan closed".to_string());
        let csv = to_csv(&[rec]);
        assert!(csv.contains("\"Disputed, claims loan closed\""));
    }
}
