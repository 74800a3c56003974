use crate::config::WhatsAppConfig;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::log::{debug, error};

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    messaging_product: &'static str,
    to: &'a str,

    #[serde(rename = "type")]
    message_type: &'static str,

    text: SendMessageText<'a>,
}

#[derive(Serialize)]
struct SendMessageText<'a> {
    body: &'a str,
}

/// Delivers one text reply to an end user. The boolean is the only signal
/// the pipeline uses to decide whether to record usage.
#[async_trait]
pub trait TextDispatcher: Send + Sync {
    async fn send_text(&self, to: &str, body: &str) -> bool;
}

pub struct WhatsAppDispatcher {
    config: WhatsAppConfig,
    client: Client,
}
impl WhatsAppDispatcher {
    pub fn new(config: WhatsAppConfig) -> Result<Self> {
        let client = Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl TextDispatcher for WhatsAppDispatcher {
    /// Every failure class (timeout, transport error, non-2xx) becomes
    /// `false`; nothing propagates past this call.
    async fn send_text(&self, to: &str, body: &str) -> bool {
        let url = format!(
            "{}/{}/messages",
            self.config.api_base, self.config.phone_number_id
        );
        let request_body = SendMessageRequest {
            messaging_product: "whatsapp",
            to,
            message_type: "text",
            text: SendMessageText { body },
        };

        let response = match self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.access_token),
            )
            .json(&request_body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to reach WhatsApp send API: {e}");
                return false;
            }
        };

        if response.status().is_success() {
            debug!("Sent WhatsApp reply to {to}");
            true
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("WhatsApp send API error: {status} - {error_text}");
            false
        }
    }
}
