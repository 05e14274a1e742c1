//! Local file access for the command-line runner.
//!
//! Reads raw tables from CSV or JSON files and writes the graph artifact. None of
//! this is used by the pipeline itself, which only sees in-memory rows.

use crate::config::JournalOrder;
use crate::error::{DiagnosticKind, Diagnostics, DrugGraphError, Result};
use crate::graph::Graph;
use crate::model::{RawRow, RawValue, SourceKind};
use crate::normalize::DRUGS_TABLE;
use crate::pipeline::RawTables;
use crate::serialize::{parse_artifact, write_artifact};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Input file format, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Json,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("csv") => Ok(TableFormat::Csv),
            Some("json") => Ok(TableFormat::Json),
            _ => Err(DrugGraphError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Read CSV rows. Empty cells become nulls; records whose field count differs
/// from the header are dropped as `MALFORMED_ROW`. Invalid UTF-8 is decoded
/// lossily so one badly encoded cell never loses the rest of the table.
pub fn read_csv<R: Read>(reader: R, table: &str, diagnostics: &mut Diagnostics) -> Result<Vec<RawRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .byte_headers()?
        .iter()
        .map(|h| String::from_utf8_lossy(h).trim_start_matches('\u{FEFF}').to_string())
        .collect();

    let mut rows: Vec<RawRow> = Vec::new();
    for (idx, record) in csv_reader.byte_records().enumerate() {
        let record = record?;
        if record.len() != headers.len() {
            diagnostics.push(
                DiagnosticKind::MalformedRow,
                table,
                Some(idx),
                format!("expected {} fields, found {}", headers.len(), record.len()),
            );
            continue;
        }

        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| {
                let cell = String::from_utf8_lossy(cell);
                if matches!(cell, Cow::Owned(_)) {
                    debug!(table = table, row = idx, column = %header, "Replaced invalid UTF-8 in cell");
                }
                let value = if cell.trim().is_empty() {
                    RawValue::Null
                } else {
                    RawValue::Text(cell.into_owned())
                };
                (header.clone(), value)
            })
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

/// Drop commas directly before a closing `]` or `}`, outside string literals.
fn strip_trailing_commas(json: &str) -> Cow<'_, str> {
    let mut out = String::with_capacity(json.len());
    let mut pending_comma: Option<String> = None;
    let mut in_string = false;
    let mut escaped = false;
    let mut changed = false;

    for c in json.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        if let Some(buffer) = pending_comma.as_mut() {
            if c.is_whitespace() {
                buffer.push(c);
                continue;
            }
            let buffer = pending_comma.take().unwrap_or_default();
            if c == ']' || c == '}' {
                out.push_str(&buffer[1..]);
                changed = true;
            } else {
                out.push_str(&buffer);
            }
        }

        match c {
            ',' => pending_comma = Some(String::from(",")),
            '"' => {
                in_string = true;
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    if let Some(buffer) = pending_comma {
        out.push_str(&buffer);
    }

    if changed {
        Cow::Owned(out)
    } else {
        Cow::Borrowed(json)
    }
}

fn json_cell(value: serde_json::Value) -> RawValue {
    match value {
        serde_json::Value::Null => RawValue::Null,
        serde_json::Value::String(s) => RawValue::Text(s),
        serde_json::Value::Number(n) => RawValue::Number(n),
        other => RawValue::Text(other.to_string()),
    }
}

/// Read a JSON array of row objects. Trailing commas are tolerated and
/// non-object elements are dropped as `MALFORMED_ROW`.
pub fn read_json(content: &str, table: &str, diagnostics: &mut Diagnostics) -> Result<Vec<RawRow>> {
    let lenient = strip_trailing_commas(content);
    if matches!(lenient, Cow::Owned(_)) {
        warn!(table = table, "Removed trailing commas from JSON input");
    }

    let value: serde_json::Value = serde_json::from_str(&lenient)?;
    let serde_json::Value::Array(items) = value else {
        return Err(DrugGraphError::UnsupportedFormat(format!(
            "{}: expected a JSON array of rows",
            table
        )));
    };

    let mut rows: Vec<RawRow> = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        match item {
            serde_json::Value::Object(map) => {
                rows.push(map.into_iter().map(|(k, v)| (k, json_cell(v))).collect());
            }
            other => diagnostics.push(
                DiagnosticKind::MalformedRow,
                table,
                Some(idx),
                format!("expected an object, found {}", other),
            ),
        }
    }
    Ok(rows)
}

/// Read one table file.
pub fn read_table(path: &Path, table: &str, diagnostics: &mut Diagnostics) -> Result<Vec<RawRow>> {
    let rows = match TableFormat::from_path(path)? {
        TableFormat::Csv => read_csv(BufReader::new(File::open(path)?), table, diagnostics)?,
        TableFormat::Json => {
            let bytes = std::fs::read(path)?;
            read_json(&String::from_utf8_lossy(&bytes), table, diagnostics)?
        }
    };
    info!(path = %path.display(), table = table, rows = rows.len(), "Loaded table");
    Ok(rows)
}

/// Read several files of the same table and concatenate them in order.
pub fn read_merged(paths: &[PathBuf], table: &str, diagnostics: &mut Diagnostics) -> Result<Vec<RawRow>> {
    let mut merged = Vec::new();
    for path in paths {
        merged.extend(read_table(path, table, diagnostics)?);
    }
    if paths.len() > 1 {
        info!(table = table, files = paths.len(), rows = merged.len(), "Merged table files");
    }
    Ok(merged)
}

/// Load the three input tables. A missing drug path leaves `drugs` unset.
pub fn load_tables(
    drugs: Option<&Path>,
    journal_publications: &[PathBuf],
    clinical_trials: &[PathBuf],
    diagnostics: &mut Diagnostics,
) -> Result<RawTables> {
    let drugs = match drugs {
        Some(path) => Some(read_table(path, DRUGS_TABLE, diagnostics)?),
        None => None,
    };
    Ok(RawTables {
        drugs,
        journal_publications: read_merged(
            journal_publications,
            SourceKind::Article.table_name(),
            diagnostics,
        )?,
        clinical_trials: read_merged(clinical_trials, SourceKind::Trial.table_name(), diagnostics)?,
    })
}

/// Write the graph artifact.
///
/// An existing file is kept unless `overwrite` is set; returns whether the file
/// was written.
pub fn save_artifact(path: &Path, graph: &Graph, overwrite: bool) -> Result<bool> {
    if path.exists() && !overwrite {
        warn!(path = %path.display(), "Artifact already exists, pass --overwrite to replace it");
        return Ok(false);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    write_artifact(graph, BufWriter::new(File::create(path)?))?;
    info!(path = %path.display(), drugs = graph.len(), "Artifact written");
    Ok(true)
}

/// Read a previously written artifact.
pub fn load_artifact(path: &Path, journal_order: JournalOrder) -> Result<Graph> {
    let content = std::fs::read_to_string(path)?;
    parse_artifact(&content, journal_order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::pipeline::run;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_format_from_extension() {
        assert_eq!(TableFormat::from_path(Path::new("a/drugs.CSV")).unwrap(), TableFormat::Csv);
        assert_eq!(TableFormat::from_path(Path::new("pubmed.json")).unwrap(), TableFormat::Json);
        assert!(TableFormat::from_path(Path::new("pubmed.xml")).is_err());
    }

    #[test]
    fn test_read_csv_nulls_and_ragged_rows() -> Result<()> {
        let data = "\u{FEFF}id,title,date,journal\n,Some title,2020-01-01,J\n2,too,many,fields,here\n";
        let mut diagnostics = Diagnostics::new();
        let rows = read_csv(data.as_bytes(), "journal_publications", &mut diagnostics)?;

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], RawValue::Null);
        assert_eq!(rows[0]["title"], RawValue::from("Some title"));
        assert_eq!(diagnostics.count(DiagnosticKind::MalformedRow), 1);
        Ok(())
    }

    #[test]
    fn test_read_csv_invalid_utf8_keeps_other_rows() -> Result<()> {
        let mut data = b"id,title,date,journal\n1,Aspirin first,2020-01-01,NEJM\n2,Bad ".to_vec();
        data.extend_from_slice(&[0xC3, 0x28]);
        data.extend_from_slice(b" title,2020-01-02,NEJM\n3,Aspirin last,2020-01-03,NEJM\n");
        let mut diagnostics = Diagnostics::new();
        let rows = read_csv(data.as_slice(), "journal_publications", &mut diagnostics)?;

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["title"], RawValue::from("Aspirin first"));
        assert_eq!(rows[1]["title"], RawValue::from("Bad \u{FFFD}( title"));
        assert_eq!(rows[2]["id"], RawValue::from("3"));
        assert!(diagnostics.is_empty());
        Ok(())
    }

    #[test]
    fn test_read_table_json_invalid_utf8() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("pubmed.json");
        let mut data = br#"[{"id": 1, "title": "Caf"#.to_vec();
        data.push(0xE9);
        data.extend_from_slice(br#" and aspirin", "date": "2020-01-01", "journal": "NEJM"},]"#);
        std::fs::write(&path, data)?;

        let rows = read_table(&path, "journal_publications", &mut Diagnostics::new())?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], RawValue::from("Caf\u{FFFD} and aspirin"));
        Ok(())
    }

    #[test]
    fn test_strip_trailing_commas() {
        assert_eq!(strip_trailing_commas("[1, 2,\n]"), "[1, 2\n]");
        assert_eq!(strip_trailing_commas(r#"{"a": "x,]",}"#), r#"{"a": "x,]"}"#);
        assert!(matches!(strip_trailing_commas("[1, 2]"), Cow::Borrowed(_)));
        assert_eq!(strip_trailing_commas(r#"["say \"hi\",", 3,]"#), r#"["say \"hi\",", 3]"#);
    }

    #[test]
    fn test_read_json_lenient() -> Result<()> {
        let data = r#"[
  {"id": 9, "title": "Gold nanoparticles", "date": "01/01/2020", "journal": "Journal of photochemistry"},
  {"id": "", "title": "Time to epinephrine treatment", "date": "01/03/2020", "journal": "The journal of allergy"},
  42,
]"#;
        let mut diagnostics = Diagnostics::new();
        let rows = read_json(data, "journal_publications", &mut diagnostics)?;

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"].as_text(), Some("9".to_string()));
        assert_eq!(diagnostics.count(DiagnosticKind::MalformedRow), 1);
        Ok(())
    }

    #[test]
    fn test_read_json_rejects_non_array() {
        let err = read_json(r#"{"id": 1}"#, "journal_publications", &mut Diagnostics::new()).unwrap_err();
        assert!(matches!(err, DrugGraphError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_load_merge_run_and_save() -> Result<()> {
        let dir = tempdir()?;
        let drugs = dir.path().join("drugs.csv");
        let pubmed_csv = dir.path().join("pubmed.csv");
        let pubmed_json = dir.path().join("pubmed.json");
        let trials = dir.path().join("clinical_trials.csv");

        std::fs::write(&drugs, "atccode,drug\nA01AD,EPINEPHRINE\nV03AB,ETHANOL\n")?;
        std::fs::write(
            &pubmed_csv,
            "id,title,date,journal\n7,The High Cost of Epinephrine Autoinjectors,02/01/2020,The journal of allergy\n",
        )?;
        std::fs::write(
            &pubmed_json,
            r#"[{"id": 8, "title": "Time to epinephrine treatment", "date": "2020-01-03", "journal": "The journal of allergy"},]"#,
        )?;
        std::fs::write(
            &trials,
            "id,scientific_title,date,journal\nNCT04188184,Tranexamic Acid Versus Epinephrine,27 April 2020,Journal of emergency nursing\n",
        )?;

        let mut diagnostics = Diagnostics::new();
        let raw = load_tables(
            Some(&drugs),
            &[pubmed_csv, pubmed_json],
            &[trials],
            &mut diagnostics,
        )?;
        assert_eq!(raw.journal_publications.len(), 2);

        let output = run(&raw, &PipelineConfig::default())?;
        let entry = output.graph.get("A01AD").unwrap();
        assert_eq!(entry.journal_mentions.len(), 2);
        assert_eq!(entry.journal_mentions[1].id, "8");
        assert_eq!(entry.trial_mentions.len(), 1);

        let artifact = dir.path().join("out").join("drug_graph.json");
        assert!(save_artifact(&artifact, &output.graph, false)?);
        assert!(!save_artifact(&artifact, &output.graph, false)?);
        assert!(save_artifact(&artifact, &output.graph, true)?);

        let reloaded = load_artifact(&artifact, JournalOrder::FirstSeen)?;
        assert_eq!(reloaded, output.graph);
        Ok(())
    }

    #[test]
    fn test_save_keeps_existing_file() -> Result<()> {
        let mut existing = NamedTempFile::new()?;
        write!(existing, "keep me")?;

        let graph = Graph::new(JournalOrder::FirstSeen);
        assert!(!save_artifact(existing.path(), &graph, false)?);
        assert_eq!(std::fs::read_to_string(existing.path())?, "keep me");
        Ok(())
    }

    #[test]
    fn test_missing_drug_path_leaves_table_unset() -> Result<()> {
        let raw = load_tables(None, &[], &[], &mut Diagnostics::new())?;
        assert!(raw.drugs.is_none());
        Ok(())
    }
}
