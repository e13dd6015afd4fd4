use std::time::Duration;

use async_trait::async_trait;
use nexus_core::error::truncate_body;
use nexus_scheduler::{LogNotifier, Notifier, SchedulerError, TeardownReminder};
use serde_json::json;
use tracing::{info, warn};

/// Logs the reminder, then POSTs it as JSON to a webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, reminder: &TeardownReminder) -> nexus_scheduler::Result<()> {
        LogNotifier.notify(reminder).await?;

        let body = json!({
            "event": "teardown.reminder",
            "message": reminder.message(),
            "reminder": reminder,
        });
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SchedulerError::Notify(e.to_string()))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            let text = truncate_body(&text, 200);
            warn!(status, body = %text, "reminder webhook rejected");
            return Err(SchedulerError::Notify(format!("webhook returned {status}: {text}")));
        }
        info!(status, "reminder delivered to webhook");
        Ok(())
    }
}
