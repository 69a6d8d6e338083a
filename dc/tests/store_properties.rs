//! Property tests for borrower store state transitions.
//!
//! Random operation sequences over a small set of borrowers and two owners,
//! asserting after every mutation that the lifecycle/outcome relationship
//! holds: an intent exists exactly on completed records, a follow-up is
//! absent exactly when the borrower paid, records are never deleted, and
//! owners never see each other's rows.

use chrono::Utc;
use proptest::prelude::*;

use duncall::domain::{BorrowerProfile, CallStatus, Category, FailReason, Intent, Language};
use duncall::schedule::follow_up;
use duncall::store::{BorrowerStore, ResetTarget};
use duncall::AnalysisResult;

const OWNERS: [&str; 2] = ["owner-a", "owner-b"];
const BORROWERS: [&str; 3] = ["b1", "b2", "b3"];
const INTENTS: [Intent; 5] = [
    Intent::Paid,
    Intent::WillPay,
    Intent::NeedsExtension,
    Intent::Dispute,
    Intent::NoResponse,
];

fn profile(id: &str) -> BorrowerProfile {
    BorrowerProfile {
        id: id.to_string(),
        name: format!("Borrower {id}"),
        loan_amount: 50_000.0,
        emi: 2_500.0,
        mobile: "9876543210".to_string(),
        language: Language::English,
        category: Category::Consistent,
        last_paid: None,
    }
}

async fn apply_op(store: &BorrowerStore, op: u8, owner: &str, id: &str, intent: Intent) {
    match op {
        0 => {
            store.ingest(owner, vec![profile(id)]).await.unwrap();
        }
        1 => {
            // allowed to return false; never errors
            store.try_claim(owner, id).await.unwrap();
        }
        2 => {
            let analysis = AnalysisResult {
                intent,
                payment_date: None,
                summary: "test".to_string(),
            };
            let date = follow_up(intent, None, Utc::now().date_naive());
            // NotClaimed / NotFound are legitimate outcomes here
            let _ = store.complete(owner, id, analysis, date, vec![]).await;
        }
        3 => {
            let _ = store.fail(owner, id, FailReason::Unreachable).await;
        }
        4 => {
            let _ = store.reset(owner, ResetTarget::One(id.to_string())).await;
        }
        _ => {
            store.reset(owner, ResetTarget::All).await.unwrap();
        }
    }
}

async fn check_invariants(store: &BorrowerStore) -> Result<(), TestCaseError> {
    for owner in OWNERS {
        let records = store.project(owner).await.unwrap();
        for record in records {
            prop_assert_eq!(record.owner_id.as_str(), owner, "owner isolation violated");
            prop_assert_eq!(
                record.intent.is_some(),
                record.call_status == CallStatus::Completed,
                "intent must exist exactly on completed records ({})",
                record.id
            );
            if record.call_status == CallStatus::Completed {
                prop_assert_eq!(
                    record.follow_up_date.is_none(),
                    record.intent == Some(Intent::Paid),
                    "follow-up must be absent exactly for paid borrowers ({})",
                    record.id
                );
            } else {
                prop_assert_eq!(record.follow_up_date, None);
                prop_assert_eq!(record.ai_summary, None);
            }
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_random_operation_sequences_hold_invariants(
        ops in proptest::collection::vec((0..6u8, 0..2usize, 0..3usize, 0..5usize), 1..40)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let store = BorrowerStore::open_in_memory().unwrap();
            // seed every borrower for both owners so most ops hit real rows
            for owner in OWNERS {
                let profiles = BORROWERS.iter().map(|id| profile(id)).collect();
                store.ingest(owner, profiles).await.unwrap();
            }

            for (op, owner_idx, borrower_idx, intent_idx) in ops {
                apply_op(
                    &store,
                    op,
                    OWNERS[owner_idx],
                    BORROWERS[borrower_idx],
                    INTENTS[intent_idx],
                )
                .await;
                check_invariants(&store).await?;
            }

            // records are never deleted
            for owner in OWNERS {
                let records = store.project(owner).await.unwrap();
                prop_assert_eq!(records.len(), BORROWERS.len());
            }
            Ok(())
        })?;
    }

    #[test]
    fn test_follow_up_is_deterministic(
        intent_idx in 0..5usize,
        with_date in any::<bool>(),
        day_offset in 0..3650u64,
    ) {
        let call_date = chrono::NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .checked_add_days(chrono::Days::new(day_offset))
            .unwrap();
        let payment_date = with_date.then(|| call_date.succ_opt().unwrap());
        let intent = INTENTS[intent_idx];

        let first = follow_up(intent, payment_date, call_date);
        let second = follow_up(intent, payment_date, call_date);
        prop_assert_eq!(first, second);

        match intent {
            Intent::Paid => prop_assert_eq!(first, None),
            _ => prop_assert!(first.is_some()),
        }
    }
}
