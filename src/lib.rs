//! # rustdruggraph
//!
//! Batch pipeline that links drugs to the journal articles and clinical trials
//! whose titles mention them, and writes the result as a JSON graph keyed by drug.
//!
//! ## Modules
//!
//! - [`normalize`] - Row cleaning, date parsing and required-field checks
//! - [`matcher`] - Whole-token drug name matching
//! - [`graph`] - Per-drug grouping of mentions
//! - [`serialize`] - JSON artifact and the two aggregate queries
//! - [`pipeline`] - normalize → match → assemble
//! - [`store`] - CSV/JSON file loading and artifact writing
//! - [`config`] - Pipeline configuration
//! - [`error`] - Error types and run diagnostics
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rustdruggraph::{pipeline, serialize, store, Diagnostics, PipelineConfig};
//! use std::path::{Path, PathBuf};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut diagnostics = Diagnostics::new();
//!     let raw = store::load_tables(
//!         Some(Path::new("data/drugs.csv")),
//!         &[PathBuf::from("data/pubmed.csv")],
//!         &[PathBuf::from("data/clinical_trials.csv")],
//!         &mut diagnostics,
//!     )?;
//!     let output = pipeline::run(&raw, &PipelineConfig::default())?;
//!     println!("{}", serialize::serialize(&output.graph)?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod serialize;
pub mod store;

pub use config::{ColumnAliases, JournalOrder, PipelineConfig};
pub use error::{Diagnostic, DiagnosticKind, Diagnostics, DrugGraphError, Result, RowError};
pub use graph::{assemble, DrugEntry, Graph};
pub use model::{Drug, Mention, NormalizedTables, Publication, PublicationRecord, RawRow, RawValue, SourceKind};
pub use pipeline::{run, PipelineOutput, RawTables};
pub use serialize::{drugs_mentioned_only_outside_journals, journal_with_most_distinct_drugs};
