use crate::{
    error::AdapterError,
    http::{client::HttpClient, json::array_at},
};
use model::{
    core::value::{FieldValue, Value},
    records::{
        query::{Filter, SelectQuery},
        row::{RowData, union_columns},
    },
};

/// Table access over a PostgREST endpoint (`<base>/rest/v1/<table>`).
#[derive(Debug, Clone)]
pub struct PostgrestAdapter {
    http: HttpClient,
    base_url: String,
    key: String,
}

impl PostgrestAdapter {
    pub fn new(http: HttpClient, base_url: &str, key: Option<&str>) -> Result<Self, AdapterError> {
        let base_url = base_url.trim().trim_end_matches('/');
        let local = base_url.starts_with("http://localhost") || base_url.starts_with("http://127.0.0.1");
        if !base_url.starts_with("https://") && !local {
            return Err(AdapterError::InvalidConfig(format!(
                "warehouse URL must start with https://, got '{base_url}'"
            )));
        }
        let key = key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AdapterError::MissingCredential("SUPABASE_SERVICE_ROLE_KEY".into()))?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            key: key.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    pub async fn upsert(
        &self,
        table: &str,
        rows: &[RowData],
        key_columns: &[&str],
    ) -> Result<(), AdapterError> {
        if rows.is_empty() {
            return Ok(());
        }

        // Bulk inserts require every object to carry the same keys.
        let columns = union_columns(rows);
        let payload: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| {
                let object = columns
                    .iter()
                    .map(|c| (c.clone(), row.get_value(c).to_json()))
                    .collect::<serde_json::Map<_, _>>();
                serde_json::Value::Object(object)
            })
            .collect();

        let request = self
            .http
            .post(&self.table_url(table))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .query(&[("on_conflict", key_columns.join(","))])
            .json(&payload);

        self.http.send_bytes(&endpoint(table), request).await?;
        Ok(())
    }

    pub async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<RowData>, AdapterError> {
        let request = self
            .http
            .get(&self.table_url(table))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .query(&query_params(query));

        let body = self.http.send_json(&endpoint(table), request).await?;
        let records = array_at(&endpoint(table), &body, &[])?;

        records
            .iter()
            .map(|record| match record {
                serde_json::Value::Object(map) => Ok(RowData::new(
                    table,
                    map.iter()
                        .map(|(k, v)| FieldValue::new(k.as_str(), Value::from_json(v)))
                        .collect(),
                )),
                other => Err(AdapterError::decode(
                    &endpoint(table),
                    format!("expected row object, got {other}"),
                )),
            })
            .collect()
    }
}

fn endpoint(table: &str) -> String {
    format!("warehouse:{table}")
}

/// PostgREST query string for a select: `select=`, one filter per column,
/// `order=` and `limit=`.
pub fn query_params(query: &SelectQuery) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let select = if query.columns.is_empty() {
        "*".to_string()
    } else {
        query.columns.join(",")
    };
    params.push(("select".to_string(), select));

    for filter in &query.filters {
        let expr = match filter {
            Filter::Eq(_, value) => format!("eq.{}", value.to_literal()),
            Filter::In(_, values) => {
                let list = values
                    .iter()
                    .map(Value::to_literal)
                    .collect::<Vec<_>>()
                    .join(",");
                format!("in.({list})")
            }
        };
        params.push((filter.column().to_string(), expr));
    }

    if !query.order_by.is_empty() {
        let order = query
            .order_by
            .iter()
            .map(|c| format!("{c}.asc"))
            .collect::<Vec<_>>()
            .join(",");
        params.push(("order".to_string(), order));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }

    params
}
