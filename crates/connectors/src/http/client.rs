use crate::error::AdapterError;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use tracing::debug;

/// Upstream error bodies are truncated to this many characters.
const MAX_ERROR_BODY: usize = 500;

/// Thin wrapper over `reqwest::Client` that maps transport and status
/// failures into `AdapterError`.
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, AdapterError> {
        let inner = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("seller-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AdapterError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self { inner })
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.inner.get(url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.inner.post(url)
    }

    /// Sends the request and parses the body as JSON. An empty body reads as `null`.
    pub async fn send_json(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<serde_json::Value, AdapterError> {
        let body = self.send_bytes(endpoint, request).await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_slice(&body).map_err(|e| AdapterError::decode(endpoint, e.to_string()))
    }

    pub async fn send_bytes(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<Bytes, AdapterError> {
        let response = request
            .send()
            .await
            .map_err(|e| network_error(endpoint, e))?;
        let response = check_status(endpoint, response).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| network_error(endpoint, e))?;
        debug!(endpoint, bytes = body.len(), "Response received");
        Ok(body)
    }
}

async fn check_status(endpoint: &str, response: Response) -> Result<Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(AdapterError::Http {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body: truncate(&body, MAX_ERROR_BODY),
    })
}

fn network_error(endpoint: &str, err: reqwest::Error) -> AdapterError {
    if let Some(status) = err.status() {
        return AdapterError::Http {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body: err.to_string(),
        };
    }
    if err.is_decode() || err.is_builder() {
        return AdapterError::decode(endpoint, err.to_string());
    }
    AdapterError::Network {
        endpoint: endpoint.to_string(),
        message: err.to_string(),
        timeout: err.is_timeout(),
    }
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
