//! Outbound report delivery
//!
//! Reports are handed to a [`NotifySink`]; the webhook implementation posts
//! a JSON payload with the rendered markdown inline and the raw event files
//! attached. Delivery failures are returned to the caller, which logs them
//! and moves on: a missed delivery never interrupts sampling, and the files
//! on disk remain the source of truth.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use tracing::{error, info, instrument};

use crate::config::NotifyConfig;

/// A file shipped alongside a report message.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content: String,
}

#[async_trait]
pub trait NotifySink: Send + Sync {
    async fn send(
        &self,
        subject: &str,
        body: &str,
        attachments: &[Attachment],
    ) -> anyhow::Result<()>;
}

/// Posts reports to a configured HTTP webhook.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: Client,
    config: NotifyConfig,
}

impl WebhookSink {
    pub fn new(config: NotifyConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl NotifySink for WebhookSink {
    #[instrument(skip(self, body, attachments), fields(subject))]
    async fn send(
        &self,
        subject: &str,
        body: &str,
        attachments: &[Attachment],
    ) -> anyhow::Result<()> {
        let payload = json!({
            "subject": subject,
            "body": body,
            "timestamp": Utc::now().to_rfc3339(),
            "attachments": attachments
                .iter()
                .map(|a| json!({ "filename": a.filename, "content": a.content }))
                .collect::<Vec<_>>(),
        });

        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if response.status().is_success() {
            info!("report delivered to webhook");
            Ok(())
        } else {
            let status = response.status();
            error!("webhook delivery failed with status: {status}");
            anyhow::bail!("webhook returned {status}")
        }
    }
}
