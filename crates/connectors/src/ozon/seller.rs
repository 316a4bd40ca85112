use crate::{
    error::AdapterError,
    http::{client::HttpClient, json::array_at},
};
use chrono::NaiveDate;
use serde_json::{Value, json};

pub const DEFAULT_SELLER_URL: &str = "https://api-seller.ozon.ru";
pub const ANALYTICS_PAGE_LIMIT: usize = 1000;

/// Metric names requested from the analytics endpoint. Responses return
/// `metrics[]` in this exact order.
pub const ANALYTICS_METRICS: [&str; 13] = [
    "revenue",
    "ordered_units",
    "hits_view_search",
    "hits_view_pdp",
    "hits_view",
    "hits_tocart_search",
    "hits_tocart_pdp",
    "hits_tocart",
    "session_view_search",
    "session_view_pdp",
    "session_view",
    "delivered_units",
    "position_category",
];

#[derive(Debug, Clone)]
pub struct OzonSellerClient {
    http: HttpClient,
    client_id: String,
    api_key: String,
    base_url: String,
}

impl OzonSellerClient {
    pub fn new(
        http: HttpClient,
        client_id: Option<&str>,
        api_key: Option<&str>,
        base_url: &str,
    ) -> Result<Self, AdapterError> {
        let client_id = non_empty(client_id, "OZON_CLIENT_ID")?;
        let api_key = non_empty(api_key, "OZON_API_KEY")?;
        Ok(Self {
            http,
            client_id,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// One page of per-day, per-SKU analytics rows.
    pub async fn analytics(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Value>, AdapterError> {
        let url = format!("{}/v1/analytics/data", self.base_url);
        let request = self
            .http
            .post(&url)
            .header("Client-Id", &self.client_id)
            .header("Api-Key", &self.api_key)
            .json(&analytics_body(start, end, offset, limit));
        let body = self.http.send_json("ozon_analytics", request).await?;
        array_at("ozon_analytics", &body, &["result", "data"])
    }
}

pub fn analytics_body(start: NaiveDate, end: NaiveDate, offset: usize, limit: usize) -> Value {
    json!({
        "date_from": start.format("%Y-%m-%d").to_string(),
        "date_to": end.format("%Y-%m-%d").to_string(),
        "metrics": ANALYTICS_METRICS,
        "dimension": ["day", "sku"],
        "limit": limit,
        "offset": offset,
    })
}

pub(crate) fn non_empty(value: Option<&str>, name: &str) -> Result<String, AdapterError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AdapterError::MissingCredential(name.to_string()))
}
