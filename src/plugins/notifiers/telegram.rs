use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::config::TelegramConfig;
use crate::plugins::traits::{MessageChannel, MessageReceipt, RecipientId};
use crate::utils::error::{AppError, ChannelError};

/// Telegram Bot API `sendMessage` over HTTPS, HTML parse mode.
pub struct TelegramChannel {
    client: Client,
    api_base: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    result: Option<SentMessage>,
    error_code: Option<u16>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()?;

        Ok(Self::with_client(client, &config.api_base, &config.bot_token))
    }

    pub fn with_client(client: Client, api_base: &str, token: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

#[async_trait]
impl MessageChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_message(
        &self,
        recipient: RecipientId,
        text: &str,
    ) -> Result<MessageReceipt, ChannelError> {
        let payload = json!({
            "chat_id": recipient,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let response = self
            .client
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        // Error bodies are best effort; the status alone still classifies
        let body = response.json::<ApiResponse>().await.ok();

        match body {
            Some(ApiResponse { ok: true, result: Some(sent), .. }) if status.is_success() => {
                debug!(recipient, message_id = sent.message_id, "Telegram message sent");
                Ok(MessageReceipt { message_id: sent.message_id })
            }
            other => Err(classify_response(status, other)),
        }
    }
}

fn classify_transport(err: reqwest::Error) -> ChannelError {
    // The request URL embeds the bot token
    let err = err.without_url();
    if err.is_timeout() {
        ChannelError::Timeout
    } else {
        ChannelError::Network(err.to_string())
    }
}

fn classify_response(status: StatusCode, body: Option<ApiResponse>) -> ChannelError {
    let code = body
        .as_ref()
        .and_then(|b| b.error_code)
        .and_then(|c| StatusCode::from_u16(c).ok())
        .filter(|_| status.is_success())
        .unwrap_or(status);
    let description = body
        .as_ref()
        .and_then(|b| b.description.clone())
        .unwrap_or_else(|| code.canonical_reason().unwrap_or("unknown error").to_string());
    let retry_after = body
        .as_ref()
        .and_then(|b| b.parameters.as_ref())
        .and_then(|p| p.retry_after);

    match code {
        StatusCode::TOO_MANY_REQUESTS => ChannelError::RateLimited {
            retry_after: Duration::from_secs(retry_after.unwrap_or(1)),
        },
        StatusCode::FORBIDDEN => ChannelError::Blocked(description),
        code if code.is_server_error() => ChannelError::Server {
            status: code.as_u16(),
            description,
        },
        code => ChannelError::Rejected {
            status: code.as_u16(),
            description,
        },
    }
}
