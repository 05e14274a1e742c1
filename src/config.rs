//! Pipeline configuration.
//!
//! Defaults reproduce the column layout of the drugs / PubMed / clinical trials
//! exports. A JSON file may override any part of it; missing keys keep defaults.

use crate::error::{DrugGraphError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Ordering of the distinct `journals` list of a graph entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalOrder {
    /// Order of first appearance among the drug's journal mentions
    #[default]
    FirstSeen,
    /// Lexicographic by journal name
    Alphabetical,
}

/// Accepted header names for each canonical column of a table.
///
/// Headers are compared trimmed and lowercased; the first alias present in a
/// row with a non-null value wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnAliases {
    pub id: Vec<String>,
    pub name: Vec<String>,
    pub title: Vec<String>,
    pub date: Vec<String>,
    pub journal: Vec<String>,
}

impl Default for ColumnAliases {
    fn default() -> Self {
        Self {
            id: strings(&["id", "atccode"]),
            name: strings(&["drug", "name"]),
            title: strings(&["title", "scientific_title"]),
            date: strings(&["date"]),
            journal: strings(&["journal"]),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub columns: ColumnAliases,
    pub journal_order: JournalOrder,
    /// Match publications in parallel partitions (needs the `parallel` feature)
    pub parallel_matching: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            columns: ColumnAliases::default(),
            journal_order: JournalOrder::FirstSeen,
            parallel_matching: cfg!(feature = "parallel"),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content).map_err(|e| {
            DrugGraphError::Config(format!("Invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        info!(path = %path.display(), "Loaded pipeline config");
        Ok(config)
    }

    /// Every canonical column needs at least one alias.
    pub fn validate(&self) -> Result<()> {
        let columns = [
            ("id", &self.columns.id),
            ("name", &self.columns.name),
            ("title", &self.columns.title),
            ("date", &self.columns.date),
            ("journal", &self.columns.journal),
        ];
        for (column, aliases) in columns {
            if aliases.iter().all(|a| a.trim().is_empty()) {
                return Err(DrugGraphError::Config(format!(
                    "column `{}` has no aliases",
                    column
                )));
            }
        }
        Ok(())
    }
}
