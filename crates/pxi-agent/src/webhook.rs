use reqwest::Client;
use serde_json::json;
use std::time::Duration;

/// Regime-transition webhook. Failures are logged and swallowed; a
/// webhook outage never affects regime storage.
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
    enabled: bool,
}

impl WebhookNotifier {
    pub fn new(webhook_url: String, enabled: bool) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, webhook_url, enabled }
    }

    pub async fn send_text(&self, text: &str) {
        if !self.enabled || self.webhook_url.is_empty() {
            tracing::debug!("Alert webhook not configured, skipping notification");
            return;
        }

        let payload = json!({ "text": text });
        match self.client.post(&self.webhook_url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("Webhook notification sent");
            }
            Ok(response) => {
                tracing::warn!("Webhook returned HTTP {}", response.status());
            }
            Err(e) => {
                tracing::warn!("Webhook POST failed: {}", e);
            }
        }
    }
}
