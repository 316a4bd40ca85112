//! Request bodies for the Wildberries report endpoints.

use chrono::NaiveDate;
use serde_json::{Value, json};

pub const SEARCH_REPORT_PAGE_LIMIT: usize = 1000;
pub const SEARCH_TEXTS_TOP: usize = 30;

pub fn day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn sales_funnel(start: NaiveDate, end: NaiveDate) -> Value {
    json!({
        "selectedPeriod": { "start": day(start), "end": day(end) }
    })
}

pub fn search_report(start: NaiveDate, end: NaiveDate, offset: usize, limit: usize) -> Value {
    json!({
        "currentPeriod": { "start": day(start), "end": day(end) },
        "positionCluster": "all",
        "orderBy": { "field": "avgPosition", "mode": "asc" },
        "limit": limit,
        "offset": offset,
    })
}

pub fn search_texts(nm_ids: &[i64], start: NaiveDate, end: NaiveDate) -> Value {
    json!({
        "currentPeriod": { "start": day(start), "end": day(end) },
        "nmIds": nm_ids,
        "topOrderBy": "openToCart",
        "includeSubstitutedSKUs": true,
        "includeSearchTexts": true,
        "orderBy": { "field": "avgPosition", "mode": "asc" },
        "limit": SEARCH_TEXTS_TOP,
    })
}

pub fn normquery_stats(pairs: &[(i64, i64)], start: NaiveDate, end: NaiveDate) -> Value {
    let items: Vec<Value> = pairs
        .iter()
        .map(|(advert_id, nm_id)| json!({ "advert_id": advert_id, "nm_id": nm_id }))
        .collect();
    json!({ "from": day(start), "to": day(end), "items": items })
}

pub fn fullstats_query(ids: &[i64], start: NaiveDate, end: NaiveDate) -> Vec<(&'static str, String)> {
    let ids = ids
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",");
    vec![("ids", ids), ("beginDate", day(start)), ("endDate", day(end))]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    #[test]
    fn search_report_body_carries_paging() {
        let body = search_report(date(18), date(18), 2000, 1000);
        assert_eq!(body["offset"], 2000);
        assert_eq!(body["limit"], 1000);
        assert_eq!(body["currentPeriod"]["start"], "2026-01-18");
        assert_eq!(body["positionCluster"], "all");
    }

    #[test]
    fn normquery_body_lists_pairs_in_order() {
        let body = normquery_stats(&[(1, 10), (2, 20)], date(17), date(18));
        assert_eq!(body["items"][1]["advert_id"], 2);
        assert_eq!(body["items"][1]["nm_id"], 20);
        assert_eq!(body["from"], "2026-01-17");
    }

    #[test]
    fn fullstats_ids_are_comma_joined() {
        let query = fullstats_query(&[5, 6, 7], date(1), date(2));
        assert_eq!(query[0], ("ids", "5,6,7".to_string()));
        assert_eq!(query[2], ("endDate", "2026-01-02".to_string()));
    }
}
