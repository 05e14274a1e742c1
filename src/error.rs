//! Error types for rustdruggraph.
//!
//! Two layers live here. [`DrugGraphError`] is returned for problems that stop a
//! run. Everything recoverable (a bad row, a dangling mention) is recorded in a
//! [`Diagnostics`] log instead so a single bad record never aborts a batch.

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Main error type for rustdruggraph operations.
#[derive(Debug, Error)]
pub enum DrugGraphError {
    /// A required input table was not supplied at all
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reading/writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Unsupported input file format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Result type alias using `DrugGraphError`
pub type Result<T> = std::result::Result<T, DrugGraphError>;

/// Why a single raw row could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("MALFORMED_DATE: cannot parse {0:?}")]
    MalformedDate(String),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),
}

/// Category of a recoverable problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticKind {
    /// Unparsable date or missing required field; the row was dropped
    MalformedRow,
    /// A mention referenced a drug or publication absent from its table
    DanglingReference,
    /// Zero drugs or zero publications were supplied
    EmptyInput,
    /// A drug name or title was empty and skipped during matching
    EmptyText,
    /// Two rows share a primary id but differ in content
    DuplicateId,
}

impl DiagnosticKind {
    pub const ALL: [DiagnosticKind; 5] = [
        DiagnosticKind::MalformedRow,
        DiagnosticKind::DanglingReference,
        DiagnosticKind::EmptyInput,
        DiagnosticKind::EmptyText,
        DiagnosticKind::DuplicateId,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::MalformedRow => "MALFORMED_ROW",
            DiagnosticKind::DanglingReference => "DANGLING_REFERENCE",
            DiagnosticKind::EmptyInput => "EMPTY_INPUT",
            DiagnosticKind::EmptyText => "EMPTY_TEXT",
            DiagnosticKind::DuplicateId => "DUPLICATE_ID",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Table the problem came from (`drugs`, `journal_publications`, ...)
    pub table: String,
    /// Zero-based input row, when the problem is tied to one
    pub row: Option<usize>,
    pub message: String,
}

/// Per-run diagnostics log.
///
/// Every entry is also emitted as a `warn!` event when pushed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        kind: DiagnosticKind,
        table: &str,
        row: Option<usize>,
        message: impl Into<String>,
    ) {
        let message = message.into();
        warn!(kind = %kind, table = table, row = ?row, "{}", message);
        self.entries.push(Diagnostic {
            kind,
            table: table.to_string(),
            row,
            message,
        });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Append another log, keeping order.
    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }
}
