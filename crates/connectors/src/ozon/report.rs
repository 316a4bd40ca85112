//! Decoding of downloaded performance reports.
//!
//! A report is either a single CSV or a ZIP archive with one CSV per
//! campaign. Each CSV opens with a title line naming the campaign
//! (`№ 123456, период 16.01.2026-18.01.2026`), followed by a `;`-separated
//! header and data lines. A trailing `Всего` line holds totals.

use crate::error::AdapterError;
use serde_json::{Map, Value};
use std::io::{Cursor, Read};
use tracing::warn;

const ENDPOINT: &str = "ozon_report_download";
const TOTALS_MARKER: &str = "Всего";

#[derive(Debug, Clone, PartialEq)]
pub struct CampaignReport {
    pub campaign_id: Option<String>,
    pub rows: Vec<Value>,
}

pub fn decode_report(payload: &[u8]) -> Result<Vec<CampaignReport>, AdapterError> {
    if payload.starts_with(b"PK") {
        return decode_archive(payload);
    }
    let text = decode_text(payload)?;
    Ok(vec![decode_csv(&text)?])
}

fn decode_archive(payload: &[u8]) -> Result<Vec<CampaignReport>, AdapterError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(payload))
        .map_err(|e| AdapterError::decode(ENDPOINT, format!("invalid zip archive: {e}")))?;

    let mut reports = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|e| AdapterError::decode(ENDPOINT, format!("zip entry {index}: {e}")))?;
        if file.is_dir() || !file.name().to_ascii_lowercase().ends_with(".csv") {
            continue;
        }

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| AdapterError::decode(ENDPOINT, format!("zip entry {index}: {e}")))?;
        let text = decode_text(&bytes)?;
        reports.push(decode_csv(&text)?);
    }

    Ok(reports)
}

fn decode_text(bytes: &[u8]) -> Result<String, AdapterError> {
    let text = String::from_utf8(bytes.to_vec())
        .map_err(|e| AdapterError::decode(ENDPOINT, format!("report is not UTF-8: {e}")))?;
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

pub fn decode_csv(text: &str) -> Result<CampaignReport, AdapterError> {
    let mut campaign_id = None;
    let mut body = text;

    if let Some((first, rest)) = text.split_once('\n')
        && first.contains('№')
    {
        campaign_id = parse_campaign_id(first);
        body = rest;
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AdapterError::decode(ENDPOINT, format!("report header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(line, error = %e, "Skipping unreadable report line");
                continue;
            }
        };
        if record.iter().next().is_some_and(|c| c.starts_with(TOTALS_MARKER)) {
            continue;
        }
        if record.iter().all(str::is_empty) {
            continue;
        }

        let mut row: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), Value::String(v.to_string())))
            .collect();
        if let Some(id) = &campaign_id {
            row.insert("campaign_id".to_string(), Value::String(id.clone()));
        }
        rows.push(Value::Object(row));
    }

    Ok(CampaignReport { campaign_id, rows })
}

fn parse_campaign_id(title: &str) -> Option<String> {
    let (_, after) = title.split_once('№')?;
    let digits: String = after
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    (!digits.is_empty()).then_some(digits)
}
