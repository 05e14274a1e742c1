//! Record normalization.
//!
//! Turns raw rows from the drugs, journal publication and clinical trial tables
//! into [`Drug`] and [`Publication`] values. Text is cleaned, dates are parsed
//! into calendar dates, identical rows are collapsed, and rows that cannot be
//! used are dropped with a `MALFORMED_ROW` diagnostic.

use crate::config::ColumnAliases;
use crate::error::{DiagnosticKind, Diagnostics, RowError};
use crate::model::{Drug, Publication, RawRow, RawValue, SourceKind};
use chrono::NaiveDate;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Table name used in diagnostics for the drug table.
pub const DRUGS_TABLE: &str = "drugs";

/// Date layouts tried in order. Slash dates are month-first when ambiguous.
/// `%B` also accepts abbreviated month names (`Jan`).
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d %B %Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
];

/// Layouts accepted for the leading date part of a date-time value.
const DATETIME_PREFIX_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Literal escaped bytes left behind by a lossy export, e.g. `\xc3\xb1`.
#[allow(clippy::unwrap_used)] // constant pattern
fn escaped_byte_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:\\\\x|\\x)[0-9a-fA-F]{2} ?").unwrap())
}

/// Clean a free-text cell.
///
/// Removes escaped byte artifacts, repairs UTF-8 text that was decoded as
/// Latin-1 / Windows-1252, maps Unicode spaces to ASCII space, drops invisible
/// characters and collapses whitespace. Text that cannot be repaired is kept.
pub fn clean_text(input: &str) -> String {
    let without_escapes = escaped_byte_regex().replace_all(input, "");
    let repaired = repair_mojibake(&without_escapes).unwrap_or_else(|| without_escapes.into_owned());

    let visible: String = repaired
        .chars()
        .filter_map(|c| match c {
            '\u{00A0}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}' => {
                Some(' ')
            }
            '\u{200B}'..='\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}' => None,
            c if c.is_control() && !c.is_whitespace() => None,
            c => Some(c),
        })
        .collect();

    visible.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Re-encode text as Windows-1252 and decode it as UTF-8.
///
/// Returns `None` when the text shows no mojibake marker or does not round-trip
/// into valid UTF-8, so legitimate accented text is left alone.
fn repair_mojibake(text: &str) -> Option<String> {
    if !text.contains(['Ã', 'Â', 'â', 'Ð', 'Ñ']) {
        return None;
    }

    let mut bytes = Vec::with_capacity(text.len());
    for c in text.chars() {
        bytes.push(cp1252_byte(c)?);
    }

    let decoded = String::from_utf8(bytes).ok()?;
    (decoded != text).then_some(decoded)
}

fn cp1252_byte(c: char) -> Option<u8> {
    let code = c as u32;
    if code <= 0xFF {
        return u8::try_from(code).ok();
    }
    let byte = match c {
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

/// Parse a date cell into a calendar date.
pub fn parse_date(input: &str) -> Result<NaiveDate, RowError> {
    let value = clean_text(input);

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&value, format) {
            return Ok(date);
        }
    }

    // Date-time values such as `2020-01-01 00:00:00` or `2020-01-01T08:00:00Z`
    if let Some(prefix) = value.split(['T', ' ']).next().filter(|p| p.len() < value.len()) {
        for format in DATETIME_PREFIX_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(prefix, format) {
                return Ok(date);
            }
        }
    }

    Err(RowError::MalformedDate(value))
}

/// Case- and whitespace-insensitive view over a raw row.
struct RowView<'a> {
    cells: BTreeMap<String, &'a RawValue>,
}

impl<'a> RowView<'a> {
    fn new(row: &'a RawRow) -> Self {
        let mut cells = BTreeMap::new();
        for (key, value) in row {
            cells.entry(key.trim().to_lowercase()).or_insert(value);
        }
        Self { cells }
    }

    /// Cleaned text of the first alias holding a non-empty value.
    fn text(&self, aliases: &[String]) -> Option<String> {
        aliases
            .iter()
            .filter_map(|alias| self.cells.get(&alias.trim().to_lowercase()))
            .filter_map(|value| value.as_text())
            .map(|raw| clean_text(&raw))
            .find(|text| !text.is_empty())
    }
}

/// Deterministic id for a publication row without one.
pub fn derive_publication_id(title: &str, date: NaiveDate, journal: &str) -> String {
    let key = format!("{},{},{}", title, date, journal);
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, key.as_bytes()).to_string()
}

fn drug_from_row(row: &RawRow, columns: &ColumnAliases) -> Result<Drug, RowError> {
    let view = RowView::new(row);
    let id = view.text(&columns.id).ok_or(RowError::MissingField("id"))?;
    let name = view.text(&columns.name).ok_or(RowError::MissingField("drug"))?;
    Ok(Drug { id, name })
}

fn publication_from_row(
    row: &RawRow,
    kind: SourceKind,
    columns: &ColumnAliases,
) -> Result<Publication, RowError> {
    let view = RowView::new(row);
    let title = view.text(&columns.title).ok_or(RowError::MissingField("title"))?;
    let journal = view
        .text(&columns.journal)
        .ok_or(RowError::MissingField("journal"))?;
    let raw_date = view.text(&columns.date).ok_or(RowError::MissingField("date"))?;
    let date = parse_date(&raw_date)?;

    let id = match view.text(&columns.id) {
        Some(id) => id,
        None => {
            let derived = derive_publication_id(&title, date, &journal);
            debug!(kind = %kind, id = %derived, "Derived id for row without one");
            derived
        }
    };

    Ok(Publication {
        kind,
        id,
        title,
        date,
        journal,
    })
}

/// Keep the first of each set of identical rows, preserving order.
fn dedup_identical<T: Clone + Eq + std::hash::Hash>(items: Vec<T>) -> (Vec<T>, usize) {
    let mut seen = HashSet::with_capacity(items.len());
    let before = items.len();
    let kept: Vec<T> = items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}

/// Normalize the drug table.
pub fn normalize_drugs(
    rows: &[RawRow],
    columns: &ColumnAliases,
    diagnostics: &mut Diagnostics,
) -> Vec<Drug> {
    let mut drugs = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        match drug_from_row(row, columns) {
            Ok(drug) => drugs.push(drug),
            Err(e) => diagnostics.push(
                DiagnosticKind::MalformedRow,
                DRUGS_TABLE,
                Some(idx),
                e.to_string(),
            ),
        }
    }

    let (drugs, duplicates) = dedup_identical(drugs);
    info!(
        table = DRUGS_TABLE,
        input = rows.len(),
        kept = drugs.len(),
        duplicates = duplicates,
        "Normalized table"
    );
    drugs
}

/// Normalize a journal publication or clinical trial table.
pub fn normalize_publications(
    rows: &[RawRow],
    kind: SourceKind,
    columns: &ColumnAliases,
    diagnostics: &mut Diagnostics,
) -> Vec<Publication> {
    let table = kind.table_name();
    let mut publications = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        match publication_from_row(row, kind, columns) {
            Ok(publication) => publications.push(publication),
            Err(e) => {
                diagnostics.push(DiagnosticKind::MalformedRow, table, Some(idx), e.to_string())
            }
        }
    }

    let (publications, duplicates) = dedup_identical(publications);
    info!(
        table = table,
        input = rows.len(),
        kept = publications.len(),
        duplicates = duplicates,
        "Normalized table"
    );
    publications
}
