use crate::{
    error::AdapterError,
    http::{client::HttpClient, json::array_at},
    wildberries::requests,
};
use chrono::NaiveDate;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct WbEndpoints {
    pub advert: String,
    pub analytics: String,
    pub statistics: String,
    pub common: String,
}

impl Default for WbEndpoints {
    fn default() -> Self {
        Self {
            advert: "https://advert-api.wildberries.ru".to_string(),
            analytics: "https://seller-analytics-api.wildberries.ru".to_string(),
            statistics: "https://statistics-api.wildberries.ru".to_string(),
            common: "https://common-api.wildberries.ru".to_string(),
        }
    }
}

/// Raw client for the Wildberries seller APIs. No retry or pacing here;
/// callers wrap each call.
#[derive(Debug, Clone)]
pub struct WbClient {
    http: HttpClient,
    token: String,
    endpoints: WbEndpoints,
}

impl WbClient {
    pub fn new(
        http: HttpClient,
        token: Option<&str>,
        endpoints: WbEndpoints,
    ) -> Result<Self, AdapterError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AdapterError::MissingCredential("WB_KEY".to_string()))?;

        Ok(Self {
            http,
            token: token.to_string(),
            endpoints,
        })
    }

    pub async fn adverts(&self) -> Result<Vec<Value>, AdapterError> {
        let url = format!("{}/api/advert/v2/adverts", self.endpoints.advert);
        let body = self.get_json("adverts", &url, &[]).await?;
        array_at("adverts", &body, &["adverts"])
    }

    pub async fn commission(&self) -> Result<Vec<Value>, AdapterError> {
        let url = format!("{}/api/v1/tariffs/commission", self.endpoints.common);
        let body = self
            .get_json("tariffs_commission", &url, &[("locale", "ru".to_string())])
            .await?;
        array_at("tariffs_commission", &body, &["report"])
    }

    pub async fn sales_funnel(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Value>, AdapterError> {
        let url = format!(
            "{}/api/analytics/v3/sales-funnel/products",
            self.endpoints.analytics
        );
        let body = self
            .post_json("sales_funnel", &url, &requests::sales_funnel(start, end))
            .await?;
        array_at("sales_funnel", &body, &["data", "products"])
    }

    pub async fn orders(&self, day: NaiveDate) -> Result<Vec<Value>, AdapterError> {
        let url = format!("{}/api/v1/supplier/orders", self.endpoints.statistics);
        let query = [("dateFrom", requests::day(day)), ("flag", "1".to_string())];
        let body = self.get_json("orders", &url, &query).await?;
        array_at("orders", &body, &[])
    }

    pub async fn fullstats(
        &self,
        advert_ids: &[i64],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Value>, AdapterError> {
        let url = format!("{}/adv/v3/fullstats", self.endpoints.advert);
        let query = requests::fullstats_query(advert_ids, start, end);
        let body = self.get_json("fullstats", &url, &query).await?;
        array_at("fullstats", &body, &[])
    }

    /// One page of search-report groups.
    pub async fn search_report(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Value>, AdapterError> {
        let url = format!("{}/api/v2/search-report/report", self.endpoints.analytics);
        let body = self
            .post_json(
                "search_report",
                &url,
                &requests::search_report(start, end, offset, limit),
            )
            .await?;
        array_at("search_report", &body, &["data", "groups"])
    }

    pub async fn search_texts(
        &self,
        nm_ids: &[i64],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Value>, AdapterError> {
        let url = format!(
            "{}/api/v2/search-report/product/search-texts",
            self.endpoints.analytics
        );
        let body = self
            .post_json(
                "search_texts",
                &url,
                &requests::search_texts(nm_ids, start, end),
            )
            .await?;
        array_at("search_texts", &body, &["data", "items"])
    }

    pub async fn normquery_stats(
        &self,
        pairs: &[(i64, i64)],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Value>, AdapterError> {
        let url = format!("{}/adv/v0/normquery/stats", self.endpoints.advert);
        let body = self
            .post_json(
                "normquery_stats",
                &url,
                &requests::normquery_stats(pairs, start, end),
            )
            .await?;
        array_at("normquery_stats", &body, &["stats"])
    }

    async fn get_json(
        &self,
        endpoint: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Value, AdapterError> {
        let request = self
            .http
            .get(url)
            .header("Authorization", &self.token)
            .query(query);
        self.http.send_json(endpoint, request).await
    }

    async fn post_json(&self, endpoint: &str, url: &str, body: &Value) -> Result<Value, AdapterError> {
        let request = self
            .http
            .post(url)
            .header("Authorization", &self.token)
            .json(body);
        self.http.send_json(endpoint, request).await
    }
}
