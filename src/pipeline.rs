//! The single synchronous call chain:
//! normalize → match → assemble.
//!
//! All inputs are passed in; nothing is read from or written to process state.

use crate::config::PipelineConfig;
use crate::error::{DiagnosticKind, Diagnostics, DrugGraphError, Result};
use crate::graph::{assemble, Graph};
use crate::matcher::match_mentions;
use crate::model::{Mention, NormalizedTables, RawRow, SourceKind};
use crate::normalize::{normalize_drugs, normalize_publications, DRUGS_TABLE};
use tracing::info;

/// Raw rows of the three input tables.
///
/// `drugs` is `None` when the drug table was not supplied at all, which is the
/// one input problem that stops a run.
#[derive(Debug, Clone, Default)]
pub struct RawTables {
    pub drugs: Option<Vec<RawRow>>,
    pub journal_publications: Vec<RawRow>,
    pub clinical_trials: Vec<RawRow>,
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub tables: NormalizedTables,
    pub mentions: Vec<Mention>,
    pub graph: Graph,
    pub diagnostics: Diagnostics,
}

/// Normalize the three raw tables.
pub fn normalize_tables(
    raw: &RawTables,
    config: &PipelineConfig,
    diagnostics: &mut Diagnostics,
) -> Result<NormalizedTables> {
    let drug_rows = raw
        .drugs
        .as_ref()
        .ok_or_else(|| DrugGraphError::MissingInput("drugs table".to_string()))?;

    let columns = &config.columns;
    Ok(NormalizedTables {
        drugs: normalize_drugs(drug_rows, columns, diagnostics),
        journal_publications: normalize_publications(
            &raw.journal_publications,
            SourceKind::Article,
            columns,
            diagnostics,
        ),
        clinical_trials: normalize_publications(
            &raw.clinical_trials,
            SourceKind::Trial,
            columns,
            diagnostics,
        ),
    })
}

/// Run the whole pipeline over one set of raw tables.
pub fn run(raw: &RawTables, config: &PipelineConfig) -> Result<PipelineOutput> {
    let mut diagnostics = Diagnostics::new();
    let tables = normalize_tables(raw, config, &mut diagnostics)?;

    if tables.drugs.is_empty() {
        diagnostics.push(DiagnosticKind::EmptyInput, DRUGS_TABLE, None, "no usable drug rows");
    }
    if tables.journal_publications.is_empty() && tables.clinical_trials.is_empty() {
        diagnostics.push(
            DiagnosticKind::EmptyInput,
            "publications",
            None,
            "no usable journal publication or clinical trial rows",
        );
    }

    let publications = tables.publications();
    let mentions = match_mentions(
        &tables.drugs,
        &publications,
        config.parallel_matching,
        &mut diagnostics,
    );
    let graph = assemble(
        &tables.drugs,
        &publications,
        &mentions,
        config.journal_order,
        &mut diagnostics,
    );

    info!(
        drugs = tables.drugs.len(),
        journal_publications = tables.journal_publications.len(),
        clinical_trials = tables.clinical_trials.len(),
        mentions = mentions.len(),
        diagnostics = diagnostics.len(),
        "Pipeline complete"
    );

    Ok(PipelineOutput {
        tables,
        mentions,
        graph,
        diagnostics,
    })
}
