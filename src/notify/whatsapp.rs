use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::composer::{ChannelKind, Notification};
use super::Notifier;
use crate::core::WhatsAppConfig;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";
/// Twilio rejects message bodies longer than this.
const MAX_BODY_CHARS: usize = 1600;

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
}

/// WhatsApp delivery through the Twilio Messages API. The channel is plain
/// text; the first listing image is passed as `MediaUrl`.
pub struct WhatsAppNotifier {
    client: Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
    from: String,
    to: String,
}

impl WhatsAppNotifier {
    pub fn new(config: &WhatsAppConfig) -> Self {
        Self::with_api_base(config, TWILIO_API_BASE)
    }

    pub fn with_api_base(config: &WhatsAppConfig, api_base: &str) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from: config.from_number.clone(),
            to: format!("whatsapp:{}", config.phone_number),
        }
    }

    fn form(&self, notification: &Notification) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("From", self.from.clone()),
            ("To", self.to.clone()),
            ("Body", truncate_body(&notification.body.plain)),
        ];
        if let Some(image) = notification.images.first() {
            form.push(("MediaUrl", image.url.clone()));
        }
        form
    }
}

fn truncate_body(text: &str) -> String {
    if text.chars().count() <= MAX_BODY_CHARS {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(MAX_BODY_CHARS - 1).collect();
    truncated.push('…');
    truncated
}

#[async_trait]
impl Notifier for WhatsAppNotifier {
    fn channel(&self) -> ChannelKind {
        ChannelKind::WhatsApp
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        let url = format!("{}/Accounts/{}/Messages.json", self.api_base, self.account_sid);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&self.form(notification))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Twilio request failed: {} - {}",
                status,
                error_text
            ));
        }

        let message: MessageResponse = response
            .json()
            .await
            .context("Failed to parse Twilio response")?;
        tracing::info!("✅ WhatsApp message sent: {}", message.sid);
        Ok(())
    }
}
