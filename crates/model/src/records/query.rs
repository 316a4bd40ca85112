use crate::core::value::Value;
use serde::{Deserialize, Serialize};

/// Predicate supported by the warehouse read surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(col, _) | Filter::In(col, _) => col,
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Filter::Eq(_, expected) => expected == value,
            Filter::In(_, options) => options.contains(value),
        }
    }
}

/// `select(filter, order, limit)` over a single table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectQuery {
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub order_by: Vec<String>,
    pub limit: Option<usize>,
}

impl SelectQuery {
    pub fn columns(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, column: &str) -> Self {
        self.order_by.push(column.to_string());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
