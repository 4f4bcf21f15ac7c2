use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use shared_config::AppConfig;

use crate::models::Appointment;

/// Transactional email over a simple HTTP API. Strictly best-effort: the
/// caller logs failures and moves on.
pub struct NotificationService {
    client: Client,
    api_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct EmailPayload {
    to_addr: String,
    subject: String,
    html_body: String,
}

impl NotificationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_url: config.email_api_url.clone(),
            api_key: config.email_api_key.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_url.is_empty() && !self.api_key.is_empty()
    }

    pub async fn booking_received(&self, appointment: &Appointment, recipient: &str) -> Result<()> {
        let subject = "Your appointment request was received";
        let body = format!(
            "<p>Your appointment with {} on {} is awaiting confirmation.</p>",
            appointment.doctor_name,
            appointment.schedule.format("%A %e %B at %H:%M")
        );
        self.send(recipient, subject, &body).await
    }

    pub async fn appointment_scheduled(
        &self,
        appointment: &Appointment,
        recipient: &str,
    ) -> Result<()> {
        let subject = "Your appointment is confirmed";
        let mut body = format!(
            "<p>Your appointment with {} on {} has been confirmed.</p>",
            appointment.doctor_name,
            appointment.schedule.format("%A %e %B at %H:%M")
        );
        if let Some(link) = &appointment.video_link {
            body.push_str(&format!("<p>Join the consultation: <a href=\"{0}\">{0}</a></p>", link));
        }
        self.send(recipient, subject, &body).await
    }

    pub async fn appointment_cancelled(
        &self,
        appointment: &Appointment,
        recipient: &str,
    ) -> Result<()> {
        let subject = "Your appointment was cancelled";
        let reason = appointment
            .cancellation_reason
            .as_deref()
            .unwrap_or("No reason was given");
        let body = format!(
            "<p>Your appointment with {} on {} was cancelled.</p><p>{}</p>",
            appointment.doctor_name,
            appointment.schedule.format("%A %e %B at %H:%M"),
            reason
        );
        self.send(recipient, subject, &body).await
    }

    async fn send(&self, recipient: &str, subject: &str, html_body: &str) -> Result<()> {
        if !self.is_configured() {
            debug!("Email service not configured, skipping notification");
            return Ok(());
        }

        let payload = EmailPayload {
            to_addr: recipient.to_string(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Email service failed ({}): {}", status, text));
        }

        debug!("Notification email sent to {}", recipient);
        Ok(())
    }
}
