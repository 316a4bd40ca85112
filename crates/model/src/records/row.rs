use crate::core::value::{FieldValue, Value};
use serde::{Deserialize, Serialize};

/// A normalized row bound for one warehouse table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RowData {
    pub entity: String,
    pub field_values: Vec<FieldValue>,
}

impl RowData {
    pub fn new(entity: &str, field_values: Vec<FieldValue>) -> Self {
        RowData {
            entity: entity.to_string(),
            field_values,
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.field_values
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(field))
    }

    pub fn get_value(&self, field: &str) -> Value {
        self.get(field)
            .map(|f| f.value.clone())
            .unwrap_or(Value::Null)
    }

    /// Sets a column, replacing an existing value of the same name.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        let value = value.into();
        match self
            .field_values
            .iter_mut()
            .find(|f| f.name.eq_ignore_ascii_case(field))
        {
            Some(existing) => existing.value = value,
            None => self.field_values.push(FieldValue::new(field, value)),
        }
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.field_values.iter().map(|f| f.name.as_str())
    }

    /// Values of `key_columns` in order, or `None` when any of them is absent or null.
    pub fn key_values(&self, key_columns: &[&str]) -> Option<Vec<Value>> {
        key_columns
            .iter()
            .map(|col| match self.get(col) {
                Some(field) if !field.value.is_null() => Some(field.value.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn has_key(&self, key_columns: &[&str]) -> bool {
        self.key_values(key_columns).is_some()
    }

    /// Values for `columns` in order; absent columns read as `Null`.
    pub fn values_for(&self, columns: &[String]) -> Vec<Value> {
        columns.iter().map(|c| self.get_value(c)).collect()
    }

    /// JSON object form, used as the REST upsert payload.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .field_values
            .iter()
            .map(|f| (f.name.clone(), f.value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

/// Union of the column names of `rows`, in first-seen order.
pub fn union_columns(rows: &[RowData]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for name in row.columns() {
            if !columns.iter().any(|c| c.eq_ignore_ascii_case(name)) {
                columns.push(name.to_string());
            }
        }
    }
    columns
}
