//! HTTP transport for the bridge REST API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;

use super::Transport;
use crate::config::Settings;
use crate::core::Message;
use crate::error::{Error, Result};

/// Client for `GET /api/messages` and `POST /api/message`.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    username: String,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        token: Option<&str>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| Error::Config(format!("invalid bridge token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings.base_url(),
            settings.username.clone(),
            settings.token.as_deref(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn poll(&self) -> Result<Vec<Message>> {
        let response = self
            .client
            .get(format!("{}/api/messages", self.base_url))
            .send()
            .await?
            .error_for_status()?;

        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        // Decode entries one by one so a single bad entry does not cost the batch.
        let entries: Vec<serde_json::Value> = serde_json::from_slice(&body)?;
        let messages: Vec<Message> = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<Message>(entry.clone()) {
                Ok(message) => Some(message),
                Err(e) => {
                    tracing::warn!("skipping malformed message {}: {}", entry, e);
                    None
                }
            })
            .collect();
        if !messages.is_empty() {
            tracing::debug!("received {} message(s)", messages.len());
        }
        Ok(messages)
    }

    async fn send(&self, mut message: Message) -> Result<()> {
        if message.username.as_deref().map_or(true, str::is_empty) {
            message.username = Some(self.username.clone());
        }
        tracing::debug!("sending: {:?}", message);

        let response = self
            .client
            .post(format!("{}/api/message", self.base_url))
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "bridge rejected message with status {}",
                status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let transport = HttpTransport::new("http://localhost:4242/", "bot", None).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:4242");
    }

    #[test]
    fn test_bad_token_rejected() {
        assert!(HttpTransport::new("http://localhost", "bot", Some("bad\ntoken")).is_err());
    }

    #[test]
    fn test_from_settings() {
        let settings = Settings {
            username: "cord".to_string(),
            port: 5000,
            ..Default::default()
        };
        let transport = HttpTransport::from_settings(&settings).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:5000");
    }
}
