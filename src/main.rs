//! rustdruggraph - drug mention graph builder
//!
//! Links drugs to the journal articles and clinical trials that mention them and
//! writes a JSON graph keyed by drug.
//!
//! ## Usage
//!
//! ### Build
//! ```bash
//! rustdruggraph build --drugs data/drugs.csv \
//!     --pubmed data/pubmed.csv --pubmed data/pubmed.json \
//!     --trials data/clinical_trials.csv --output output/drug_graph.json
//! ```
//!
//! ### Query
//! ```bash
//! rustdruggraph query output/drug_graph.json --top-journal
//! ```

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rustdruggraph::{
    pipeline, serialize, store, DiagnosticKind, Diagnostics, JournalOrder, PipelineConfig,
    PipelineOutput, SourceKind,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Drug mention graph builder
#[derive(Parser)]
#[command(name = "rustdruggraph")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the drug graph from input tables
    Build {
        /// Drug table (CSV or JSON)
        #[arg(long)]
        drugs: Option<PathBuf>,

        /// Journal publication table, repeat to merge several files
        #[arg(long)]
        pubmed: Vec<PathBuf>,

        /// Clinical trial table, repeat to merge several files
        #[arg(long)]
        trials: Vec<PathBuf>,

        /// Artifact path
        #[arg(short, long, default_value = "./output/drug_graph.json")]
        output: PathBuf,

        /// Pipeline configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Replace an existing artifact
        #[arg(long)]
        overwrite: bool,

        /// Write the diagnostics log to this JSON file
        #[arg(long)]
        diagnostics: Option<PathBuf>,

        /// Write the flat mention table to this CSV file
        #[arg(long)]
        mentions: Option<PathBuf>,
    },

    /// Run the aggregate queries over a stored artifact
    Query {
        /// Artifact path
        artifact: PathBuf,

        /// Journal mentioning the most distinct drugs
        #[arg(long)]
        top_journal: bool,

        /// Drugs mentioned only by clinical trials
        #[arg(long)]
        trial_only: bool,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if cli.log_json {
        fmt().json().with_env_filter(filter).with_target(true).init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .init();
    }

    match cli.command {
        Commands::Build {
            drugs,
            pubmed,
            trials,
            output,
            config,
            overwrite,
            diagnostics,
            mentions,
        } => run_build(BuildArgs {
            drugs,
            pubmed,
            trials,
            output,
            config,
            overwrite,
            diagnostics,
            mentions,
        }),
        Commands::Query {
            artifact,
            top_journal,
            trial_only,
        } => run_query(&artifact, top_journal, trial_only),
    }
}

// ============================================================================
// Build
// ============================================================================

struct BuildArgs {
    drugs: Option<PathBuf>,
    pubmed: Vec<PathBuf>,
    trials: Vec<PathBuf>,
    output: PathBuf,
    config: Option<PathBuf>,
    overwrite: bool,
    diagnostics: Option<PathBuf>,
    mentions: Option<PathBuf>,
}

fn run_build(args: BuildArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => PipelineConfig::from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    println!("\n--- Stage 1: Loading Tables ---");
    let mut diagnostics = Diagnostics::new();
    let raw = store::load_tables(args.drugs.as_deref(), &args.pubmed, &args.trials, &mut diagnostics)
        .context("Failed to load input tables")?;
    println!(
        "Loaded {} drug rows, {} journal publication rows, {} clinical trial rows",
        raw.drugs.as_ref().map_or(0, Vec::len),
        raw.journal_publications.len(),
        raw.clinical_trials.len()
    );

    println!("\n--- Stage 2: Building Graph ---");
    let PipelineOutput {
        tables,
        mentions,
        graph,
        diagnostics: run_diagnostics,
    } = pipeline::run(&raw, &config).context("Pipeline failed")?;
    diagnostics.extend(run_diagnostics);

    let mentioned = graph.iter().filter(|(_, entry)| entry.has_mentions()).count();
    println!(
        "Graph: {} drugs ({} mentioned), {} mentions",
        graph.len(),
        mentioned,
        mentions.len()
    );

    println!("\n--- Stage 3: Writing Outputs ---");
    if store::save_artifact(&args.output, &graph, args.overwrite)
        .with_context(|| format!("Failed to write artifact {}", args.output.display()))?
    {
        println!("Saved: {:?}", args.output);
    } else {
        println!("Kept existing artifact {:?} (use --overwrite to replace)", args.output);
    }

    if let Some(path) = &args.mentions {
        let publications = tables.publications();
        let rows: Vec<MentionRow<'_>> = mentions
            .iter()
            .filter_map(|m| {
                publications.get(m.position).map(|p| MentionRow {
                    kind: m.kind,
                    drug_id: &m.drug_id,
                    publication_id: &m.publication_id,
                    journal: &p.journal,
                    date: p.date,
                })
            })
            .collect();
        save_csv(path, &rows)?;
    }

    if let Some(path) = &args.diagnostics {
        let json = serde_json::to_string_pretty(&diagnostics).context("Failed to serialize diagnostics")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write diagnostics {}", path.display()))?;
        println!("Saved: {:?}", path);
    }

    print_diagnostics(&diagnostics);
    info!(drugs = graph.len(), diagnostics = diagnostics.len(), "Build finished");
    Ok(())
}

#[derive(Serialize)]
struct MentionRow<'a> {
    kind: SourceKind,
    drug_id: &'a str,
    publication_id: &'a str,
    journal: &'a str,
    date: NaiveDate,
}

fn save_csv<T: Serialize>(path: &Path, data: &[T]) -> Result<()> {
    if data.is_empty() {
        println!("No data to save to {:?}", path);
        return Ok(());
    }

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context("Failed to create CSV writer")?;

    for item in data {
        wtr.serialize(item).context("Failed to write CSV record")?;
    }

    wtr.flush().context("Failed to flush CSV")?;
    println!("Saved: {:?}", path);
    Ok(())
}

fn print_diagnostics(diagnostics: &Diagnostics) {
    if diagnostics.is_empty() {
        println!("\nNo diagnostics.");
        return;
    }

    println!("\n--- Diagnostics: {} ---", diagnostics.len());
    for kind in DiagnosticKind::ALL {
        let count = diagnostics.count(kind);
        if count > 0 {
            println!("  {:<20} {}", kind.as_str(), count);
        }
    }
}

// ============================================================================
// Query
// ============================================================================

fn run_query(artifact: &Path, top_journal: bool, trial_only: bool) -> Result<()> {
    let graph = store::load_artifact(artifact, JournalOrder::default())
        .with_context(|| format!("Failed to read artifact {}", artifact.display()))?;
    info!(path = %artifact.display(), drugs = graph.len(), "Artifact loaded");

    let both = !top_journal && !trial_only;

    if top_journal || both {
        match serialize::journal_with_most_distinct_drugs(&graph) {
            Some((journal, count)) => println!("Top journal: {} ({} drugs)", journal, count),
            None => println!("Top journal: none"),
        }
    }

    if trial_only || both {
        let drugs = serialize::drugs_mentioned_only_outside_journals(&graph);
        println!("Drugs mentioned only by clinical trials: {}", drugs.len());
        for drug_id in &drugs {
            let name = graph.get(drug_id).map_or("", |entry| entry.drug_name.as_str());
            println!("  {} {}", drug_id, name);
        }
    }

    Ok(())
}
