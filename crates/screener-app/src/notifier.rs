use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use screener_core::{Notifier, ScreenError};
use screener_orchestrator::RunReport;

/// Posts the run digest to a chat webhook. An empty URL disables delivery.
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
}

impl WebhookNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            client: Client::new(),
            webhook_url,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, digest: &str) -> Result<(), ScreenError> {
        if self.webhook_url.is_empty() {
            tracing::debug!("webhook not configured, skipping notification");
            return Ok(());
        }

        let payload = json!({
            "content": digest,
            "username": "MarketSift Screener",
        });

        self.client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ScreenError::Collaborator(format!("webhook: {e}")))?;

        tracing::debug!("notification sent");
        Ok(())
    }
}

/// Human-readable digest of a run for the notification channel.
pub fn build_digest(report: &RunReport) -> String {
    let mut lines = vec![format!(
        "**Screening run** — {} finalists from {} symbols ({} filtered, {} skipped)",
        report.candidates.len(),
        report.universe_size,
        report.filtered_out,
        report.skipped.len()
    )];

    for (rank, candidate) in report.candidates.iter().enumerate() {
        let price = candidate
            .metrics
            .price
            .map(|p| format!("${p:.2}"))
            .unwrap_or_else(|| "n/a".to_string());
        lines.push(format!(
            "{}. {} — score {:.2}, {}",
            rank + 1,
            candidate.symbol,
            candidate.score,
            price
        ));
    }

    if report.candidates.is_empty() {
        lines.push("No candidates matched the profile today.".to_string());
    }

    lines.join("\n")
}
