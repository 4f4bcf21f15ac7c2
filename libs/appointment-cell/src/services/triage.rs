use anyhow::{anyhow, Result};
use reqwest::{header, Client, Method};
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::Appointment;

/// AI symptom triage of the booking reason. Writes an advisory JSON blob to
/// the appointment's `triage` side channel for a clinician to review; the
/// booking invariants never depend on it.
pub struct TriageService {
    openai_api_key: String,
    supabase: SupabaseClient,
    http_client: Client,
}

impl TriageService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            openai_api_key: config.openai_api_key.clone(),
            supabase: SupabaseClient::new(config),
            http_client: Client::new(),
        }
    }

    pub async fn analyze_and_attach(
        &self,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<()> {
        if self.openai_api_key.is_empty() {
            debug!("Triage service not configured, skipping analysis");
            return Ok(());
        }

        let analysis = self.analyze_reason(&appointment.reason).await?;

        let update = json!({
            "triage": analysis,
            "updated_at": chrono::Utc::now().to_rfc3339()
        });
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);

        let _: Vec<Value> = self
            .supabase
            .request(Method::PATCH, &path, Some(auth_token), Some(update))
            .await
            .map_err(|e| anyhow!("Failed to attach triage analysis: {}", e))?;

        info!("Triage analysis attached to appointment {}", appointment.id);
        Ok(())
    }

    async fn analyze_reason(&self, reason: &str) -> Result<Value> {
        let prompt = json!({
            "model": "gpt-4o",
            "messages": [
                {
                    "role": "system",
                    "content": "You are a telemedicine triage assistant. Given a patient's \
                                stated reason for booking, respond with a JSON object with \
                                keys: severity (one of low, moderate, high), summary (one \
                                sentence), recommended_action (one sentence). Do not diagnose."
                },
                {
                    "role": "user",
                    "content": reason
                }
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.2
        });

        let response = self
            .http_client
            .post("https://api.openai.com/v1/chat/completions")
            .header(header::AUTHORIZATION, format!("Bearer {}", self.openai_api_key))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&prompt)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Triage API error ({}): {}", status, text));
        }

        let body: Value = response.json().await?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("Triage response missing content"))?;

        let mut analysis: Value = serde_json::from_str(content)
            .map_err(|e| anyhow!("Triage response is not valid JSON: {}", e))?;

        // Minimal schema check so garbage never lands on the record
        for key in ["severity", "summary", "recommended_action"] {
            if !analysis[key].is_string() {
                return Err(anyhow!("Triage response missing '{}'", key));
            }
        }

        if let Some(obj) = analysis.as_object_mut() {
            obj.insert("requires_review".to_string(), json!(true));
        }

        Ok(analysis)
    }
}
