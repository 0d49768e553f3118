//! Outbound failure alerts
//!
//! Best-effort, fire-and-forget webhook notifications for handler
//! failures. Delivery problems are logged and swallowed; a run of
//! consecutive failures is suppressed past a configurable count to avoid
//! alert storms, and the counter resets on the next success.

use alloy_primitives::B256;
use serde_json::json;
use tracing::{debug, warn};

/// Default consecutive-failure count after which alerts are suppressed.
pub const DEFAULT_SUPPRESS_AFTER: u32 = 5;

/// Everything an alert carries about a failed handler invocation.
#[derive(Debug, Clone)]
pub struct HandlerFailure {
    pub tx_hash: B256,
    pub action: String,
    /// Block timestamp, Unix epoch seconds
    pub timestamp: u64,
    pub error: String,
}

/// Webhook alert sender with consecutive-failure suppression.
pub struct Notifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
    suppress_after: u32,
    consecutive_failures: u32,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>, suppress_after: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
            suppress_after,
            consecutive_failures: 0,
        }
    }

    /// A notifier that never delivers; keeps call sites unconditional.
    pub fn disabled() -> Self {
        Self::new(None, DEFAULT_SUPPRESS_AFTER)
    }

    /// Reset the suppression counter after a successful block.
    pub fn record_success(&mut self) {
        if self.consecutive_failures > 0 {
            debug!(
                "Recovered after {} consecutive failures",
                self.consecutive_failures
            );
        }
        self.consecutive_failures = 0;
    }

    /// Count a failure; true while alerts should still be delivered.
    fn register_failure(&mut self) -> bool {
        self.consecutive_failures += 1;
        self.consecutive_failures <= self.suppress_after
    }

    /// Send a failure alert, best effort.
    pub async fn notify_failure(&mut self, failure: &HandlerFailure) {
        if !self.register_failure() {
            debug!(
                "Suppressing alert for {} after {} consecutive failures",
                failure.action, self.consecutive_failures
            );
            return;
        }
        let Some(url) = self.webhook_url.clone() else {
            return;
        };
        let payload = json!({
            "text": format!(
                "indexer handler failed: action={} tx=0x{:x} block_time={} error={}",
                failure.action, failure.tx_hash, failure.timestamp, failure.error
            )
        });
        match self.client.post(&url).json(&payload).send().await {
            Ok(_) => debug!("Delivered failure alert for {}", failure.action),
            Err(err) => warn!("Failed to deliver alert: {}", err),
        }
    }
}
