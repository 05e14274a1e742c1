//! Graph serialization and aggregate queries.
//!
//! The artifact is a JSON object keyed by drug id (ascending):
//!
//! ```json
//! {
//!   "R01AD": {
//!     "drug": "BETAMETHASONE",
//!     "journal_mentions": [{"id": "10", "title": "...", "date": "2020-01-01", "journal": "..."}],
//!     "trial_mentions": [],
//!     "journals": ["..."]
//!   }
//! }
//! ```
//!
//! Output is pretty-printed with two-space indentation and is byte-for-byte
//! stable for a given graph.

use crate::config::JournalOrder;
use crate::error::Result;
use crate::graph::{DrugEntry, Graph};
use crate::model::PublicationRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Write;
use tracing::{debug, warn};

#[derive(Serialize)]
struct ArtifactEntry<'a> {
    drug: &'a str,
    journal_mentions: &'a [PublicationRecord],
    trial_mentions: &'a [PublicationRecord],
    journals: Vec<&'a str>,
}

/// Entry as read back; older artifacts used `pubmed` / `clinical_trials`.
#[derive(Deserialize)]
struct StoredEntry {
    #[serde(default)]
    drug: String,
    #[serde(default, alias = "pubmed")]
    journal_mentions: Vec<PublicationRecord>,
    #[serde(default, alias = "clinical_trials")]
    trial_mentions: Vec<PublicationRecord>,
    #[serde(default)]
    journals: Option<Vec<String>>,
}

fn artifact(graph: &Graph) -> BTreeMap<&str, ArtifactEntry<'_>> {
    graph
        .iter()
        .map(|(id, entry)| {
            (
                id,
                ArtifactEntry {
                    drug: &entry.drug_name,
                    journal_mentions: &entry.journal_mentions,
                    trial_mentions: &entry.trial_mentions,
                    journals: entry.journals(graph.journal_order()),
                },
            )
        })
        .collect()
}

/// Render the graph as the JSON artifact.
pub fn serialize(graph: &Graph) -> Result<String> {
    Ok(serde_json::to_string_pretty(&artifact(graph))?)
}

/// Render the graph as a JSON value.
pub fn to_value(graph: &Graph) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(artifact(graph))?)
}

/// Write the artifact followed by a newline.
pub fn write_artifact<W: Write>(graph: &Graph, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, &artifact(graph))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Parse an artifact back into a graph.
///
/// Stored `journals` lists are not trusted: they are recomputed from the journal
/// mentions and a warning is logged when they disagree.
pub fn parse_artifact(json: &str, journal_order: JournalOrder) -> Result<Graph> {
    let stored: BTreeMap<String, StoredEntry> = serde_json::from_str(json)?;
    let mut graph = Graph::new(journal_order);

    for (drug_id, stored) in stored {
        let entry = DrugEntry {
            drug_name: stored.drug,
            journal_mentions: stored.journal_mentions,
            trial_mentions: stored.trial_mentions,
        };

        if let Some(journals) = stored.journals {
            let recorded: BTreeSet<&str> = journals.iter().map(String::as_str).collect();
            let derived: BTreeSet<&str> = entry.journals(journal_order).into_iter().collect();
            if recorded != derived {
                warn!(drug = %drug_id, "Stored journals disagree with journal mentions, recomputed");
            }
        }

        graph.insert(drug_id, entry);
    }

    Ok(graph)
}

/// Journal appearing in the journal mentions of the most distinct drugs.
///
/// Ties go to the lexicographically smallest name. `None` when the graph holds
/// no journal mention at all.
pub fn journal_with_most_distinct_drugs(graph: &Graph) -> Option<(String, usize)> {
    if graph.is_empty() {
        debug!("Query on empty graph");
        return None;
    }

    let mut drugs_per_journal: HashMap<&str, usize> = HashMap::new();
    for (_, entry) in graph.iter() {
        for journal in entry.journals(JournalOrder::FirstSeen) {
            *drugs_per_journal.entry(journal).or_insert(0) += 1;
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (journal, count) in drugs_per_journal {
        best = match best {
            Some((best_journal, best_count))
                if best_count > count || (best_count == count && best_journal < journal) =>
            {
                Some((best_journal, best_count))
            }
            _ => Some((journal, count)),
        };
    }

    best.map(|(journal, count)| (journal.to_string(), count))
}

/// Drugs mentioned by clinical trials but by no journal article.
pub fn drugs_mentioned_only_outside_journals(graph: &Graph) -> BTreeSet<String> {
    if graph.is_empty() {
        debug!("Query on empty graph");
    }

    graph
        .iter()
        .filter(|(_, entry)| entry.journal_mentions.is_empty() && !entry.trial_mentions.is_empty())
        .map(|(id, _)| id.to_string())
        .collect()
}
