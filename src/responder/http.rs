//! HTTP chat responder
//!
//! Wire format of the companion backend:
//! `POST {base}/api/chat/{session_id}` with `{"text": ...}`, answered by a JSON
//! object carrying `ai_response`. Any other shape is a failed request.

use super::ResponderError;
use crate::runtime::ChatResponder;
use crate::session::SessionId;
use super::endpoint;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct HttpResponder {
    client: Client,
    base_url: Url,
}

impl HttpResponder {
    /// `timeout: None` leaves requests unbounded; a hung backend keeps the
    /// chat controller waiting.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ResponderError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ResponderError::malformed(format!("Invalid backend URL: {e}")))?;
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ResponderError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    fn chat_url(&self, session: &SessionId) -> Result<Url, ResponderError> {
        endpoint(&self.base_url, &["api", "chat", session.as_str()])
    }

    /// Check `GET /health`. Only used for a startup warning.
    pub async fn health(&self) -> bool {
        let Ok(url) = endpoint(&self.base_url, &["health"]) else {
            return false;
        };
        let Ok(response) = self.client.get(url).send().await else {
            return false;
        };
        if !response.status().is_success() {
            return false;
        }
        response
            .json::<HealthResponse>()
            .await
            .is_ok_and(|h| h.status == "healthy")
    }

    fn classify_transport(e: &reqwest::Error) -> ResponderError {
        if e.is_timeout() {
            ResponderError::timeout(format!("Request timeout: {e}"))
        } else if e.is_connect() {
            ResponderError::network(format!("Connection failed: {e}"))
        } else {
            ResponderError::network(format!("Request failed: {e}"))
        }
    }
}

#[async_trait]
impl ChatResponder for HttpResponder {
    async fn respond(&self, session: &SessionId, text: &str) -> Result<String, ResponderError> {
        let response = self
            .client
            .post(self.chat_url(session)?)
            .json(&ChatRequest { text })
            .send()
            .await
            .map_err(|e| Self::classify_transport(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Self::classify_transport(&e))?;

        if !status.is_success() {
            return Err(ResponderError::status(
                status.as_u16(),
                format!("HTTP {status}: {body}"),
            ));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            ResponderError::malformed(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Ok(parsed.ai_response)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    ai_response: String,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}
