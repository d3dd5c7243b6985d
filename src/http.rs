//! JSON-over-HTTP helper shared by the embedding and generation providers.
//!
//! Retry strategy:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors (including timeouts) → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Result};
use std::time::Duration;

/// Build a client whose every request is bounded by `timeout_secs`.
pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Sleep before retry number `attempt` (1-based).
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt - 1).min(5))
}

/// Longest a single [`post_json`] call can take: every attempt running to
/// the client timeout plus the backoff sleeps between attempts.
pub fn retry_budget(timeout_secs: u64, max_retries: u32) -> Duration {
    let attempts = max_retries.saturating_add(1);
    let per_request = Duration::from_secs(timeout_secs).saturating_mul(attempts);
    (1..=max_retries)
        .map(backoff_delay)
        .fold(per_request, |total, delay| total.saturating_add(delay))
}

/// How a request authenticates.
#[derive(Debug, Clone, Copy)]
pub enum Auth<'a> {
    None,
    /// `Authorization: Bearer <token>` (OpenAI).
    Bearer(&'a str),
    /// `x-goog-api-key: <key>` (Gemini).
    GoogleKey(&'a str),
}

/// POST `body` to `url` and decode the JSON response, retrying transient
/// failures up to `max_retries` times.
///
/// `label` names the service in error messages (e.g. `"Gemini"`).
pub async fn post_json(
    client: &reqwest::Client,
    url: &str,
    auth: Auth<'_>,
    body: &serde_json::Value,
    max_retries: u32,
    label: &str,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            tracing::debug!(service = label, attempt, ?delay, "retrying request");
            tokio::time::sleep(delay).await;
        }

        let mut request = client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        match auth {
            Auth::None => {}
            Auth::Bearer(token) => {
                request = request.header("Authorization", format!("Bearer {}", token));
            }
            Auth::GoogleKey(key) => {
                request = request.header("x-goog-api-key", key);
            }
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response.json().await.map_err(|e| {
                        anyhow!("{} returned invalid JSON: {}", label, e.without_url())
                    });
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow!("{} API error {}: {}", label, status, body_text));
                    continue;
                }

                bail!("{} API error {}: {}", label, status, body_text);
            }
            // The URL is dropped so nothing it carries reaches replies or logs.
            Err(e) => {
                last_err = Some(anyhow!("{} request failed: {}", label, e.without_url()));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("{} request failed after retries", label)))
}

/// Strip a trailing slash so paths can be appended with `format!`.
pub fn base_url(url: &str) -> &str {
    url.trim_end_matches('/')
}
