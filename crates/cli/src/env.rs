use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::CliError;

/// Process environment with a `.env` file merged underneath it.
///
/// Variables already present in the process environment always win over
/// the file.
#[derive(Debug, Clone)]
pub struct EnvManager {
    vars: HashMap<String, String>,
}

impl EnvManager {
    pub fn new() -> Self {
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }

    /// Loads `path` if it exists. A missing file is only an error when
    /// `required` is set.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P, required: bool) -> Result<bool, CliError> {
        let path = path.as_ref();
        if !path.exists() && !required {
            return Ok(false);
        }
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::EnvFile(format!("failed to read {}: {e}", path.display()))
        })?;

        self.parse_env_content(&content)?;
        Ok(true)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn all(&self) -> &HashMap<String, String> {
        &self.vars
    }

    fn parse_env_content(&mut self, content: &str) -> Result<(), CliError> {
        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line = line.strip_prefix("export ").unwrap_or(line);
            let Some((key, value)) = line.split_once('=') else {
                return Err(CliError::EnvFile(format!(
                    "malformed line {} (expected KEY=VALUE)",
                    line_num + 1
                )));
            };

            let key = key.trim();
            if key.is_empty() {
                return Err(CliError::EnvFile(format!("empty key at line {}", line_num + 1)));
            }

            self.vars
                .entry(key.to_string())
                .or_insert_with(|| Self::unquote_value(value));
        }

        Ok(())
    }

    fn unquote_value(value: &str) -> String {
        let value = value.trim();

        for quote in ['"', '\''] {
            if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
                return value[1..value.len() - 1].to_string();
            }
        }

        // Unquoted values may carry a trailing comment.
        match value.find(" #") {
            Some(pos) => value[..pos].trim_end().to_string(),
            None => value.to_string(),
        }
    }
}

impl Default for EnvManager {
    fn default() -> Self {
        Self::new()
    }
}
