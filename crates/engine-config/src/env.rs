use crate::error::ConfigError;
use std::{collections::HashMap, fmt::Display, str::FromStr};

/// Snapshot of configuration variables. Blank values read as unset.
#[derive(Debug, Clone, Default)]
pub struct EnvVars {
    vars: HashMap<String, String>,
}

impl EnvVars {
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Self {
        Self { vars: vars.clone() }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn get_owned(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            Some(raw) => raw
                .parse()
                .map_err(|e: T::Err| ConfigError::invalid(key, raw, e.to_string())),
            None => Ok(default),
        }
    }

    pub fn flag_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            Some(raw) => parse_flag(raw)
                .ok_or_else(|| ConfigError::invalid(key, raw, "expected true/false, 1/0, yes/no or on/off")),
            None => Ok(default),
        }
    }

    /// Comma-separated list; an unset variable yields `default`.
    pub fn list_or<T>(&self, key: &str, default: &[T]) -> Result<Vec<T>, ConfigError>
    where
        T: FromStr + Clone,
        T::Err: Display,
    {
        let Some(raw) = self.get(key) else {
            return Ok(default.to_vec());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| {
                item.parse()
                    .map_err(|e: T::Err| ConfigError::invalid(key, raw, e.to_string()))
            })
            .collect()
    }
}

pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
