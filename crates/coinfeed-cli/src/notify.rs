//! Telegram delivery for alert text.

use std::sync::Arc;
use std::time::Duration;

use coinfeed_core::{HttpClient, HttpRequest, ReqwestHttpClient};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.telegram.org";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("missing Telegram credentials: {0}")]
    MissingCredentials(String),
    #[error("message content must not be empty")]
    EmptyMessage,
    #[error("Telegram request failed: {0}")]
    Transport(String),
    #[error("Telegram rejected the message (status {status}): {description}")]
    Rejected { status: u16, description: String },
    #[error(transparent)]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TelegramReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Posts messages to one chat through the Bot API.
#[derive(Clone)]
pub struct TelegramNotifier {
    http_client: Arc<dyn HttpClient>,
    token: String,
    chat_id: String,
    base_url: String,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("chat_id", &self.chat_id)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Result<Self, NotifyError> {
        let token = token.into().trim().to_owned();
        let chat_id = chat_id.into().trim().to_owned();

        let mut missing = Vec::new();
        if token.is_empty() {
            missing.push("bot token");
        }
        if chat_id.is_empty() {
            missing.push("chat id");
        }
        if !missing.is_empty() {
            return Err(NotifyError::MissingCredentials(missing.join(", ")));
        }

        Ok(Self {
            http_client: Arc::new(ReqwestHttpClient::new()),
            token,
            chat_id,
            base_url: DEFAULT_BASE_URL.to_owned(),
        })
    }

    /// Resolves credentials from explicit overrides, then the environment.
    pub fn from_overrides(
        token: Option<&str>,
        chat_id: Option<&str>,
    ) -> Result<Self, NotifyError> {
        let token = token
            .map(str::to_owned)
            .or_else(|| first_env(&["COINFEED_TELEGRAM_BOT_TOKEN", "TELEGRAM_BOT_TOKEN"]));
        let chat_id = chat_id
            .map(str::to_owned)
            .or_else(|| first_env(&["COINFEED_TELEGRAM_CHAT_ID", "TELEGRAM_CHAT_ID"]));

        match (token, chat_id) {
            (Some(token), Some(chat_id)) => Self::new(token, chat_id),
            (token, chat_id) => {
                let mut missing = Vec::new();
                if token.is_none() {
                    missing.push("TELEGRAM_BOT_TOKEN");
                }
                if chat_id.is_none() {
                    missing.push("TELEGRAM_CHAT_ID");
                }
                Err(NotifyError::MissingCredentials(missing.join(", ")))
            }
        }
    }

    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = http_client;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub async fn send(&self, text: &str, parse_mode: Option<&str>) -> Result<(), NotifyError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(NotifyError::EmptyMessage);
        }

        let body = serde_json::to_string(&SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: parse_mode.filter(|mode| !mode.is_empty()),
        })?;
        let request = HttpRequest::post(format!("{}/bot{}/sendMessage", self.base_url, self.token))
            .with_json_body(body)
            .with_timeout(SEND_TIMEOUT);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|error| NotifyError::Transport(error.message().to_owned()))?;

        let reply = serde_json::from_str::<TelegramReply>(&response.body).ok();
        let accepted = response.is_success() && reply.as_ref().map_or(true, |reply| reply.ok);
        if !accepted {
            let description = reply
                .and_then(|reply| reply.description)
                .unwrap_or_else(|| String::from("no description"));
            return Err(NotifyError::Rejected {
                status: response.status,
                description,
            });
        }

        debug!(chat_id = %self.chat_id, chars = text.chars().count(), "telegram message sent");
        Ok(())
    }
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|value| value.trim().to_owned())
        .find(|value| !value.is_empty())
}
