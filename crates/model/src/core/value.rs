use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single normalized cell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i64),
    Decimal(Decimal),
    String(String),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Null,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DataType {
    Int,
    Decimal,
    String,
    Boolean,
    Date,
    Timestamp,
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Decimal(v) if v.fract().is_zero() => v.to_i64(),
            Value::String(v) => v.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int(v) => Some(Decimal::from(*v)),
            Value::Decimal(v) => Some(*v),
            Value::String(v) => v.trim().parse::<Decimal>().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(v) => Some(*v),
            Value::Timestamp(v) => Some(v.date_naive()),
            Value::String(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::Int(_) => DataType::Int,
            Value::Decimal(_) => DataType::Decimal,
            Value::String(_) => DataType::String,
            Value::Boolean(_) => DataType::Boolean,
            Value::Date(_) => DataType::Date,
            Value::Timestamp(_) => DataType::Timestamp,
            Value::Null => DataType::Null,
        }
    }

    /// JSON form used by REST warehouses. Decimals are emitted as numbers.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Int(v) => serde_json::Value::from(*v),
            Value::Decimal(v) => v
                .to_f64()
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(v.to_string())),
            Value::String(v) => serde_json::Value::String(v.clone()),
            Value::Boolean(v) => serde_json::Value::Bool(*v),
            Value::Date(v) => serde_json::Value::String(v.format("%Y-%m-%d").to_string()),
            Value::Timestamp(v) => {
                serde_json::Value::String(v.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            Value::Null => serde_json::Value::Null,
        }
    }

    /// Best-effort conversion from a JSON scalar returned by a warehouse read.
    pub fn from_json(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n
                    .to_string()
                    .parse::<Decimal>()
                    .map(Value::Decimal)
                    .unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        }
    }

    /// Textual form used as a query-string literal (`in.(9,11)`, `eq.2026-01-18`).
    pub fn to_literal(&self) -> String {
        match self {
            Value::Int(v) => v.to_string(),
            Value::Decimal(v) => v.to_string(),
            Value::String(v) => v.clone(),
            Value::Boolean(v) => v.to_string(),
            Value::Date(v) => v.format("%Y-%m-%d").to_string(),
            Value::Timestamp(v) => v.to_rfc3339_opts(SecondsFormat::Secs, true),
            Value::Null => "null".to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(v) => write!(f, "'{v}'"),
            Value::Null => write!(f, "NULL"),
            other => write!(f, "{}", other.to_literal()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldValue {
    pub name: String,
    pub value: Value,
}

impl FieldValue {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn data_type(&self) -> DataType {
        self.value.data_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn decimals_serialize_as_json_numbers() {
        let v = Value::Decimal(Decimal::from_str("12.50").unwrap());
        assert_eq!(v.to_json(), serde_json::json!(12.5));
    }

    #[test]
    fn dates_serialize_as_iso_strings() {
        let d = NaiveDate::from_ymd_opt(2026, 1, 18).unwrap();
        assert_eq!(Value::Date(d).to_json(), serde_json::json!("2026-01-18"));
        assert_eq!(Value::Date(d).to_literal(), "2026-01-18");
    }

    #[test]
    fn from_json_prefers_integers() {
        assert_eq!(Value::from_json(&serde_json::json!(42)), Value::Int(42));
        assert_eq!(
            Value::from_json(&serde_json::json!(1.25)),
            Value::Decimal(Decimal::from_str("1.25").unwrap())
        );
        assert_eq!(Value::from_json(&serde_json::Value::Null), Value::Null);
    }

    #[test]
    fn integral_decimal_reads_as_i64() {
        assert_eq!(Value::Decimal(Decimal::from(9)).as_i64(), Some(9));
        assert_eq!(
            Value::Decimal(Decimal::from_str("9.5").unwrap()).as_i64(),
            None
        );
        assert_eq!(Value::String(" 11 ".into()).as_i64(), Some(11));
    }
}
