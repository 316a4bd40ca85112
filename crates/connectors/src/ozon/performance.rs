use crate::{
    error::AdapterError,
    http::{client::HttpClient, json::array_at},
    ozon::seller::non_empty,
};
use bytes::Bytes;
use chrono::NaiveDate;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, info};

pub const DEFAULT_PERFORMANCE_URL: &str = "https://api-performance.ozon.ru";
pub const RUNNING_STATE: &str = "CAMPAIGN_STATE_RUNNING";

const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(1800);
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

#[derive(Debug)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Raw client for the Ozon Performance (advertising) API.
///
/// Holds client credentials and exchanges them for a bearer token on
/// demand, reusing it until shortly before expiry.
#[derive(Debug)]
pub struct OzonPerformanceClient {
    http: HttpClient,
    client_id: String,
    client_secret: String,
    base_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl OzonPerformanceClient {
    pub fn new(
        http: HttpClient,
        client_id: Option<&str>,
        client_secret: Option<&str>,
        base_url: &str,
    ) -> Result<Self, AdapterError> {
        Ok(Self {
            http,
            client_id: non_empty(client_id, "OZON_PERF_CLIENT_ID")?,
            client_secret: non_empty(client_secret, "OZON_PERF_CLIENT_SECRET")?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        })
    }

    pub async fn access_token(&self) -> Result<String, AdapterError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.value.clone());
        }

        let url = format!("{}/api/client/token", self.base_url);
        let request = self.http.post(&url).json(&json!({
            "client_id": self.client_id,
            "client_secret": self.client_secret,
            "grant_type": "client_credentials",
        }));
        let body = self.http.send_json("ozon_performance_token", request).await?;

        let value = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::decode("ozon_performance_token", "no access_token"))?
            .to_string();
        let ttl = body
            .get("expires_in")
            .and_then(Value::as_u64)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_TTL);

        info!(ttl_secs = ttl.as_secs(), "Obtained performance API token");
        *cached = Some(CachedToken {
            value: value.clone(),
            refresh_at: Instant::now() + ttl.saturating_sub(TOKEN_REFRESH_MARGIN),
        });
        Ok(value)
    }

    /// Ids of campaigns in the running state, in the order the API lists them.
    pub async fn running_campaigns(&self) -> Result<Vec<String>, AdapterError> {
        let url = format!("{}/api/client/campaign", self.base_url);
        let request = self.authorized(self.http.get(&url)).await?;
        let body = self.http.send_json("ozon_campaigns", request).await?;
        let campaigns = array_at("ozon_campaigns", &body, &["list"])?;

        let ids: Vec<String> = campaigns
            .iter()
            .filter(|c| c.get("state").and_then(Value::as_str) == Some(RUNNING_STATE))
            .filter_map(|c| match c.get("id") {
                Some(Value::String(id)) => Some(id.clone()),
                Some(Value::Number(id)) => Some(id.to_string()),
                _ => None,
            })
            .collect();

        debug!(total = campaigns.len(), running = ids.len(), "Listed campaigns");
        Ok(ids)
    }

    /// Requests an asynchronous statistics report and returns its UUID.
    pub async fn request_report(
        &self,
        campaigns: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<String, AdapterError> {
        let url = format!("{}/api/client/statistics", self.base_url);
        let request = self
            .authorized(self.http.post(&url))
            .await?
            .json(&report_request_body(campaigns, start, end));
        let body = self.http.send_json("ozon_report_request", request).await?;

        body.get("UUID")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AdapterError::decode("ozon_report_request", "no UUID in response"))
    }

    /// Current state string of a report (`NOT_STARTED`, `IN_PROGRESS`, `OK`, `ERROR`, ...).
    pub async fn report_state(&self, uuid: &str) -> Result<String, AdapterError> {
        let url = format!("{}/api/client/statistics/{}", self.base_url, uuid);
        let request = self.authorized(self.http.get(&url)).await?;
        let body = self.http.send_json("ozon_report_status", request).await?;

        body.get("state")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AdapterError::decode("ozon_report_status", "no state in response"))
    }

    pub async fn download_report(&self, uuid: &str) -> Result<Bytes, AdapterError> {
        let url = format!("{}/api/client/statistics/report", self.base_url);
        let request = self
            .authorized(self.http.get(&url))
            .await?
            .query(&[("UUID", uuid)]);
        self.http.send_bytes("ozon_report_download", request).await
    }

    async fn authorized(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, AdapterError> {
        let token = self.access_token().await?;
        Ok(request.bearer_auth(token))
    }
}

pub fn report_request_body(campaigns: &[String], start: NaiveDate, end: NaiveDate) -> Value {
    json!({
        "campaigns": campaigns,
        "from": format!("{}T00:00:00Z", start.format("%Y-%m-%d")),
        "to": format!("{}T23:59:59Z", end.format("%Y-%m-%d")),
        "groupBy": "DATE",
    })
}
