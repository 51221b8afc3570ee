//! Optional LLM-backed report enrichment
//!
//! When configured, the daily summary is sent to an OpenAI-compatible chat
//! completions endpoint for a short tuning commentary. The advisor is a
//! best-effort extra: any failure here degrades the report to its plain
//! form, it never blocks delivery.

use anyhow::Context;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::config::AdvisorConfig;

const SYSTEM_PROMPT: &str = "You are a MySQL performance engineer. Given a daily \
summary of CPU and memory incidents on a production database host, point out \
likely causes and concrete tuning steps. Be brief and specific.";

#[derive(Debug, Clone)]
pub struct AiAdvisor {
    client: Client,
    config: AdvisorConfig,
}

impl AiAdvisor {
    pub fn new(config: AdvisorConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Request a commentary for the rendered summary.
    #[instrument(skip_all)]
    pub async fn advise(&self, summary: &str) -> anyhow::Result<String> {
        let payload = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": summary },
            ],
        });

        let mut request = self.client.post(&self.config.api_url).json(&payload);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .context("advisor endpoint unreachable")?
            .error_for_status()
            .context("advisor endpoint rejected the request")?;

        let body: Value = response
            .json()
            .await
            .context("advisor response is not JSON")?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .context("advisor response has no message content")?
            .trim()
            .to_string();

        info!("advisor returned {} characters", content.len());
        Ok(content)
    }
}
