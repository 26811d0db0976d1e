use crate::query::SearchBudget;
use crate::scoring::Bm25Params;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub bm25: Bm25Params,
    /// Highlighter window, in index tokens.
    pub snippet_window: usize,
    /// Larger extracted texts are refused.
    pub max_content_bytes: u64,
    /// Vocabulary comparisons between two fuzzy cancellation checks.
    pub fuzzy_check_interval: usize,
    pub fuzzy_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bm25: Bm25Params::default(),
            snippet_window: 30,
            max_content_bytes: 10 * 1024 * 1024,
            fuzzy_check_interval: 256,
            fuzzy_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    /// Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn fuzzy_budget(&self) -> SearchBudget {
        match self.fuzzy_timeout_ms {
            Some(ms) => SearchBudget::with_timeout(Duration::from_millis(ms)),
            None => SearchBudget::unlimited(),
        }
    }
}
