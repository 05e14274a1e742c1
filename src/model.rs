//! Core entities: raw input rows, normalized drugs and publications, mentions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A raw cell as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Number(serde_json::Number),
    Text(String),
}

impl RawValue {
    /// Render the cell as text. Whole floats lose their fractional part
    /// (`1.0` → `1`); nulls yield `None`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Null => None,
            RawValue::Text(s) => Some(s.clone()),
            RawValue::Number(n) => Some(render_number(n)),
        }
    }
}

fn render_number(n: &serde_json::Number) -> String {
    if let Some(f) = n.as_f64().filter(|_| n.is_f64()) {
        if f.fract() == 0.0 && f.abs() < 1e15 {
            return format!("{}", f as i64);
        }
    }
    n.to_string()
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<i64> for RawValue {
    fn from(n: i64) -> Self {
        RawValue::Number(n.into())
    }
}

impl From<f64> for RawValue {
    fn from(f: f64) -> Self {
        serde_json::Number::from_f64(f)
            .map(RawValue::Number)
            .unwrap_or(RawValue::Null)
    }
}

/// One raw input row: column name → cell.
pub type RawRow = BTreeMap<String, RawValue>;

/// Build a raw row from `(column, value)` pairs.
pub fn raw_row<K, V, I>(cells: I) -> RawRow
where
    K: Into<String>,
    V: Into<RawValue>,
    I: IntoIterator<Item = (K, V)>,
{
    cells
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Source table a publication came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceKind {
    /// Journal article (PubMed)
    Article,
    /// Clinical trial registry entry
    Trial,
}

impl SourceKind {
    /// Table name used in diagnostics.
    pub fn table_name(&self) -> &'static str {
        match self {
            SourceKind::Article => "journal_publications",
            SourceKind::Trial => "clinical_trials",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Article => f.write_str("ARTICLE"),
            SourceKind::Trial => f.write_str("TRIAL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Drug {
    pub id: String,
    pub name: String,
}

/// A normalized journal article or clinical trial.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Publication {
    pub kind: SourceKind,
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
    pub journal: String,
}

impl Publication {
    /// Publication as it appears inside a graph entry.
    pub fn to_record(&self) -> PublicationRecord {
        PublicationRecord {
            id: self.id.clone(),
            title: self.title.clone(),
            date: self.date,
            journal: self.journal.clone(),
        }
    }
}

/// Mention entry of the artifact: `{id, title, date, journal}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
    pub journal: String,
}

/// A drug's name found in a publication title.
///
/// `position` indexes the normalized publication table the mention was
/// computed against. Field order is the canonical sort order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mention {
    pub kind: SourceKind,
    pub position: usize,
    pub drug_id: String,
    pub publication_id: String,
}

/// The three normalized tables handed to the matcher.
#[derive(Debug, Clone, Default)]
pub struct NormalizedTables {
    pub drugs: Vec<Drug>,
    pub journal_publications: Vec<Publication>,
    pub clinical_trials: Vec<Publication>,
}

impl NormalizedTables {
    /// Articles followed by trials, each in input order.
    pub fn publications(&self) -> Vec<Publication> {
        self.journal_publications
            .iter()
            .chain(self.clinical_trials.iter())
            .cloned()
            .collect()
    }
}
