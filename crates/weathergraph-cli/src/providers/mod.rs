use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::Value;
use thiserror::Error;

use crate::config::CLIENT_USER_AGENT;

pub mod open_meteo;

/// Blocking GET that yields the decoded JSON body.
pub trait JsonFetcher {
    fn get_json(&self, url: &str) -> Result<Value, ProviderError>;
}

impl<T: JsonFetcher + ?Sized> JsonFetcher for &T {
    fn get_json(&self, url: &str) -> Result<Value, ProviderError> {
        (**self).get_json(url)
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(CLIENT_USER_AGENT)
            .build()
            .map_err(|error| ProviderError::Transport(error.to_string()))?;

        Ok(Self { client })
    }
}

impl JsonFetcher for HttpClient {
    fn get_json(&self, url: &str) -> Result<Value, ProviderError> {
        tracing::debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|error| ProviderError::Transport(error.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|error| ProviderError::Transport(error.to_string()))?;

        decode_response(status, &body)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request failed ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
    #[error("location not found: {0}")]
    NotFound(String),
}

/// Only a 200 counts as success; anything else is reported with its status.
fn decode_response(status: StatusCode, body: &str) -> Result<Value, ProviderError> {
    if status != StatusCode::OK {
        let message = extract_error_message(body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
        return Err(ProviderError::Http {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(body)
        .map_err(|error| ProviderError::InvalidResponse(format!("json body: {error}")))
}

fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let from_json = serde_json::from_str::<Value>(trimmed)
        .ok()
        .and_then(|json| {
            ["reason", "message", "error", "detail"]
                .into_iter()
                .filter_map(|key| json.get(key).and_then(Value::as_str))
                .map(str::trim)
                .find(|message| !message.is_empty())
                .map(ToOwned::to_owned)
        });

    from_json.or_else(|| Some(trimmed.to_string()))
}
