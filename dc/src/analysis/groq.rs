//! Groq classifier
//!
//! OpenAI-compatible chat-completions call with strict-JSON output. Bounded
//! retry with exponential backoff on transient failures; everything else
//! surfaces immediately.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::classifier::{Classifier, ClassifierError, RawClassification};
use crate::domain::{CallTurn, Speaker};

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;
const REQUEST_TIMEOUT_SECS: u64 = 30;

const SYSTEM_PROMPT: &str = "You are an analyst for a loan collections team. You are given the \
transcript of a phone call between a collections agent and a borrower. Respond with a single \
JSON object and nothing else, with exactly these keys: \"intent\" (one of \"Paid\", \
\"Will Pay\", \"Needs Extension\", \"Dispute\", \"No Response\"), \"payment_date\" (the date \
the borrower committed to pay, in YYYY-MM-DD, or null if none was stated), and \"summary\" \
(one or two sentences describing the outcome of the call).";

/// Classifier backed by Groq's chat-completions endpoint
pub struct GroqClassifier {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GroqClassifier {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn render_transcript(transcript: &[CallTurn]) -> String {
        let mut out = String::new();
        for turn in transcript {
            let who = match turn.speaker {
                Speaker::Agent => "Agent",
                Speaker::Borrower => "Borrower",
            };
            out.push_str(who);
            out.push_str(": ");
            out.push_str(&turn.text);
            out.push('\n');
        }
        out
    }

    async fn send_request(&self, transcript: &[CallTurn]) -> Result<RawClassification, ClassifierError> {
        let user_prompt = format!(
            "Today's date is {}.\n\nCall transcript:\n{}",
            Utc::now().date_naive(),
            Self::render_transcript(transcript),
        );
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt },
            ],
            "temperature": 0.2,
            "response_format": { "type": "json_object" },
        });

        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!("send_request: POST {} model={}", url, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::Timeout
                } else {
                    ClassifierError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClassifierError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let chat: ChatResponse = response.json().await.map_err(ClassifierError::Network)?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ClassifierError::InvalidResponse("no choices in response".into()))?;

        let raw: RawClassification = serde_json::from_str(strip_code_fences(content))?;
        Ok(raw)
    }
}

#[async_trait]
impl Classifier for GroqClassifier {
    async fn classify(&self, transcript: &[CallTurn]) -> Result<RawClassification, ClassifierError> {
        let mut backoff_ms = INITIAL_BACKOFF_MS;
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                debug!("classify: retry {} after {}ms", attempt, backoff_ms);
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2;
            }
            match self.send_request(transcript).await {
                Ok(raw) => return Ok(raw),
                Err(e) if e.is_retryable() => {
                    warn!("classify: transient error (attempt {}): {}", attempt + 1, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| ClassifierError::Unavailable("retries exhausted".into())))
    }
}

/// Strict-JSON mode still occasionally wraps output in markdown fences
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}
