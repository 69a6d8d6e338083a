//! Follow-up scheduling
//!
//! Pure date arithmetic keyed on the classified intent. The dispatcher calls
//! this once per completed attempt; nothing here touches the store or clock.

use chrono::{Days, NaiveDate};

use crate::domain::Intent;

/// Compute the follow-up date for a completed call.
///
/// A borrower-stated payment date always wins for the intents that can carry
/// one. Otherwise the grace period depends on the intent: promises get three
/// days, disputes get a week for the back office to review, and unresponsive
/// calls are retried the next day. A settled account needs no follow-up.
pub fn follow_up(
    intent: Intent,
    payment_date: Option<NaiveDate>,
    call_date: NaiveDate,
) -> Option<NaiveDate> {
    match intent {
        Intent::Paid => None,
        Intent::WillPay | Intent::NeedsExtension => {
            payment_date.or_else(|| call_date.checked_add_days(Days::new(3)))
        }
        Intent::Dispute => call_date.checked_add_days(Days::new(7)),
        Intent::NoResponse => call_date.checked_add_days(Days::new(1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_paid_never_schedules() {
        let call = date(2025, 8, 10);
        assert_eq!(follow_up(Intent::Paid, None, call), None);
        // even a stated date is ignored once the account is settled
        assert_eq!(follow_up(Intent::Paid, Some(date(2025, 8, 20)), call), None);
    }

    #[test]
    fn test_promise_uses_stated_date() {
        let call = date(2025, 8, 10);
        let stated = Some(date(2025, 8, 25));
        assert_eq!(follow_up(Intent::WillPay, stated, call), stated);
        assert_eq!(follow_up(Intent::NeedsExtension, stated, call), stated);
    }

    #[test]
    fn test_promise_without_date_gets_three_days() {
        let call = date(2025, 8, 10);
        assert_eq!(
            follow_up(Intent::WillPay, None, call),
            Some(date(2025, 8, 13))
        );
        assert_eq!(
            follow_up(Intent::NeedsExtension, None, call),
            Some(date(2025, 8, 13))
        );
    }

    #[test]
    fn test_dispute_gets_a_week() {
        let call = date(2025, 8, 10);
        assert_eq!(
            follow_up(Intent::Dispute, None, call),
            Some(date(2025, 8, 17))
        );
        // dispute cannot carry a payment date, so a stray one is ignored
        assert_eq!(
            follow_up(Intent::Dispute, Some(date(2025, 9, 1)), call),
            Some(date(2025, 8, 17))
        );
    }

    #[test]
    fn test_no_response_retries_next_day() {
        let call = date(2025, 8, 10);
        assert_eq!(
            follow_up(Intent::NoResponse, None, call),
            Some(date(2025, 8, 11))
        );
    }

    #[test]
    fn test_offsets_cross_month_boundary() {
        assert_eq!(
            follow_up(Intent::WillPay, None, date(2025, 8, 30)),
            Some(date(2025, 9, 2))
        );
        assert_eq!(
            follow_up(Intent::Dispute, None, date(2025, 12, 28)),
            Some(date(2026, 1, 4))
        );
        assert_eq!(
            follow_up(Intent::NoResponse, None, date(2024, 2, 28)),
            Some(date(2024, 2, 29))
        );
    }
}
