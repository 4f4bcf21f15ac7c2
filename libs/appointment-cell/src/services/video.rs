use anyhow::{anyhow, Result};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;

/// Issues video consultation session links against a Cloudflare-Realtime
/// style HTTP API once an appointment is confirmed. Returns `Ok(None)` when
/// the integration is not configured.
pub struct VideoService {
    client: Client,
    app_id: String,
    api_token: String,
    base_url: String,
}

impl VideoService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            app_id: config.video_app_id.clone(),
            api_token: config.video_api_token.clone(),
            base_url: config.video_base_url.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.app_id.is_empty() && !self.api_token.is_empty() && !self.base_url.is_empty()
    }

    pub async fn create_session_link(&self, appointment_id: Uuid) -> Result<Option<String>> {
        if !self.is_configured() {
            debug!("Video service not configured, skipping session creation");
            return Ok(None);
        }

        let url = format!("{}/apps/{}/sessions/new", self.base_url, self.app_id);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .header("Content-Type", "application/json")
            .json(&json!({ "reference": appointment_id }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Video API error ({}): {}", status, text));
        }

        let body: Value = response.json().await?;
        let session_id = body["session_id"]
            .as_str()
            .ok_or_else(|| anyhow!("Video API response missing session_id"))?;

        let link = format!("{}/apps/{}/sessions/{}", self.base_url, self.app_id, session_id);
        info!("Video session created for appointment {}", appointment_id);
        Ok(Some(link))
    }
}
