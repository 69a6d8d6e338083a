//! Simulated call placer
//!
//! Produces canned borrower conversations so the full pipeline (dispatch,
//! analysis, scheduling, reporting) can run without a telephony provider.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::Rng;
use tracing::debug;

use super::{CallPlacer, PlacementError};
use crate::domain::{CallTurn, Language, Speaker};

/// Which canned conversation a simulated call plays out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Paid,
    WillPay,
    NeedsExtension,
    Dispute,
    NoResponse,
}

impl Scenario {
    const ALL: [Scenario; 5] = [
        Scenario::Paid,
        Scenario::WillPay,
        Scenario::NeedsExtension,
        Scenario::Dispute,
        Scenario::NoResponse,
    ];

    /// Parse a config-file scenario name
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "paid" => Some(Self::Paid),
            "will-pay" => Some(Self::WillPay),
            "needs-extension" => Some(Self::NeedsExtension),
            "dispute" => Some(Self::Dispute),
            "no-response" => Some(Self::NoResponse),
            _ => None,
        }
    }

    fn script(&self) -> &'static [(Speaker, &'static str)] {
        match self {
            Scenario::Paid => &[
                (Speaker::Agent, "Hello, I am calling about your loan EMI that was due this month."),
                (Speaker::Borrower, "I already paid it two days ago through the app."),
                (Speaker::Agent, "Thank you, I can see the payment reflecting now. Have a good day."),
            ],
            Scenario::WillPay => &[
                (Speaker::Agent, "Hello, I am calling about your pending loan EMI."),
                (Speaker::Borrower, "Yes, I know. My salary comes on Friday, I will pay it then."),
                (Speaker::Agent, "Noted, we will expect the payment by Friday. Thank you."),
            ],
            Scenario::NeedsExtension => &[
                (Speaker::Agent, "Hello, your loan EMI is overdue. Can you make the payment today?"),
                (Speaker::Borrower, "I had a medical emergency. I need two more weeks to arrange the money."),
                (Speaker::Agent, "I understand. I will note the extension request for review."),
            ],
            Scenario::Dispute => &[
                (Speaker::Agent, "Hello, I am calling about your overdue EMI of this month."),
                (Speaker::Borrower, "This is wrong, I closed this loan last year. Stop calling me about it."),
                (Speaker::Agent, "I am sorry for the confusion. I will raise this with our back office."),
            ],
            Scenario::NoResponse => &[
                (Speaker::Agent, "Hello, I am calling about your loan EMI. Can you hear me?"),
                (Speaker::Agent, "Hello? This call is regarding your pending payment."),
            ],
        }
    }
}

/// Plays a fixed or randomly drawn scenario, with jittered timing and an
/// optional injected failure rate
pub struct SimulatedPlacer {
    scenario: Option<Scenario>,
    failure_rate: f64,
}

impl SimulatedPlacer {
    pub fn new(scenario: Option<Scenario>) -> Self {
        Self {
            scenario,
            failure_rate: 0.0,
        }
    }

    /// Fraction of calls (0.0 to 1.0) that fail with Unreachable or Busy
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }
}

#[async_trait]
impl CallPlacer for SimulatedPlacer {
    async fn place_call(
        &self,
        mobile: &str,
        _language: Language,
    ) -> Result<Vec<CallTurn>, PlacementError> {
        // draw everything up front; the rng is not held across awaits
        let (scenario, delay_ms, failure) = {
            let mut rng = rand::rng();
            let scenario = self
                .scenario
                .unwrap_or_else(|| Scenario::ALL[rng.random_range(0..Scenario::ALL.len())]);
            let failure = if self.failure_rate > 0.0 && rng.random_bool(self.failure_rate) {
                Some(if rng.random_bool(0.5) {
                    PlacementError::Unreachable(mobile.to_string())
                } else {
                    PlacementError::Busy(mobile.to_string())
                })
            } else {
                None
            };
            (scenario, rng.random_range(30..120u64), failure)
        };

        tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;

        if let Some(err) = failure {
            debug!("place_call: simulated failure for {}: {}", mobile, err);
            return Err(err);
        }

        debug!("place_call: simulated {:?} call to {}", scenario, mobile);
        let mut at = Utc::now();
        let transcript = scenario
            .script()
            .iter()
            .map(|(speaker, text)| {
                at += Duration::seconds(4);
                CallTurn::new(*speaker, *text, at)
            })
            .collect();
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_scenario_plays_its_script() {
        let placer = SimulatedPlacer::new(Some(Scenario::Dispute));
        let transcript = placer
            .place_call("919876543210", Language::English)
            .await
            .unwrap();
        assert_eq!(transcript.len(), 3);
        assert!(transcript[1].text.contains("closed this loan"));
    }

    #[tokio::test]
    async fn test_timestamps_are_monotonic() {
        let placer = SimulatedPlacer::new(Some(Scenario::WillPay));
        let transcript = placer
            .place_call("919876543210", Language::Hindi)
            .await
            .unwrap();
        for pair in transcript.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn test_full_failure_rate_always_fails() {
        let placer = SimulatedPlacer::new(Some(Scenario::Paid)).with_failure_rate(1.0);
        let result = placer.place_call("919876543210", Language::English).await;
        assert!(matches!(
            result,
            Err(PlacementError::Unreachable(_) | PlacementError::Busy(_))
        ));
    }
}
