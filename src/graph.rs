//! Graph assembly.
//!
//! Folds the mention list into one entry per drug holding the journal articles
//! and clinical trials that name it. Every drug of the drug table gets an entry,
//! mentioned or not. The distinct journal list is derived from the journal
//! mentions on demand and is never stored on its own.

use crate::config::JournalOrder;
use crate::error::{DiagnosticKind, Diagnostics};
use crate::model::{Drug, Mention, Publication, PublicationRecord, SourceKind};
use crate::normalize::DRUGS_TABLE;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::info;

/// Everything known about one drug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrugEntry {
    pub drug_name: String,
    pub journal_mentions: Vec<PublicationRecord>,
    pub trial_mentions: Vec<PublicationRecord>,
}

impl DrugEntry {
    pub fn new(drug_name: impl Into<String>) -> Self {
        Self {
            drug_name: drug_name.into(),
            journal_mentions: Vec::new(),
            trial_mentions: Vec::new(),
        }
    }

    /// Distinct journals of the journal mentions.
    pub fn journals(&self, order: JournalOrder) -> Vec<&str> {
        match order {
            JournalOrder::FirstSeen => {
                let mut seen = HashSet::new();
                self.journal_mentions
                    .iter()
                    .map(|m| m.journal.as_str())
                    .filter(|j| seen.insert(*j))
                    .collect()
            }
            JournalOrder::Alphabetical => self
                .journal_mentions
                .iter()
                .map(|m| m.journal.as_str())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        }
    }

    pub fn has_mentions(&self) -> bool {
        !self.journal_mentions.is_empty() || !self.trial_mentions.is_empty()
    }
}

/// Drug-centric mention graph, keyed by drug id in ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Graph {
    entries: BTreeMap<String, DrugEntry>,
    journal_order: JournalOrder,
}

impl Graph {
    pub fn new(journal_order: JournalOrder) -> Self {
        Self {
            entries: BTreeMap::new(),
            journal_order,
        }
    }

    pub fn journal_order(&self) -> JournalOrder {
        self.journal_order
    }

    pub fn get(&self, drug_id: &str) -> Option<&DrugEntry> {
        self.entries.get(drug_id)
    }

    /// Distinct journals of a drug, in the graph's journal order.
    pub fn journals(&self, drug_id: &str) -> Option<Vec<&str>> {
        self.get(drug_id).map(|e| e.journals(self.journal_order))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DrugEntry)> {
        self.entries.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert an entry read back from an artifact.
    pub(crate) fn insert(&mut self, drug_id: String, entry: DrugEntry) {
        self.entries.insert(drug_id, entry);
    }
}

/// Assemble the graph from the normalized tables and the mention list.
///
/// `publications` must be the table the mentions were computed against.
/// Mentions whose drug or publication cannot be resolved are dropped as
/// `DANGLING_REFERENCE`. Never fails.
pub fn assemble(
    drugs: &[Drug],
    publications: &[Publication],
    mentions: &[Mention],
    journal_order: JournalOrder,
    diagnostics: &mut Diagnostics,
) -> Graph {
    let mut graph = Graph::new(journal_order);

    for (idx, drug) in drugs.iter().enumerate() {
        match graph.entries.get(&drug.id) {
            Some(existing) if existing.drug_name != drug.name => diagnostics.push(
                DiagnosticKind::DuplicateId,
                DRUGS_TABLE,
                Some(idx),
                format!(
                    "drug id `{}` reused for `{}`, keeping `{}`",
                    drug.id, drug.name, existing.drug_name
                ),
            ),
            Some(_) => {}
            None => {
                graph
                    .entries
                    .insert(drug.id.clone(), DrugEntry::new(drug.name.clone()));
            }
        }
    }

    report_duplicate_publication_ids(publications, diagnostics);

    let mut ordered: Vec<&Mention> = mentions.iter().collect();
    ordered.sort();
    ordered.dedup();

    let mut journal_count = 0;
    let mut trial_count = 0;
    for mention in ordered {
        let publication = match publications.get(mention.position) {
            Some(p) if p.id == mention.publication_id && p.kind == mention.kind => p,
            _ => {
                diagnostics.push(
                    DiagnosticKind::DanglingReference,
                    mention.kind.table_name(),
                    None,
                    format!(
                        "mention of `{}` references unknown publication `{}` at {}",
                        mention.drug_id, mention.publication_id, mention.position
                    ),
                );
                continue;
            }
        };

        let Some(entry) = graph.entries.get_mut(&mention.drug_id) else {
            diagnostics.push(
                DiagnosticKind::DanglingReference,
                DRUGS_TABLE,
                None,
                format!(
                    "mention in `{}` references unknown drug `{}`",
                    mention.publication_id, mention.drug_id
                ),
            );
            continue;
        };

        match publication.kind {
            SourceKind::Article => {
                entry.journal_mentions.push(publication.to_record());
                journal_count += 1;
            }
            SourceKind::Trial => {
                entry.trial_mentions.push(publication.to_record());
                trial_count += 1;
            }
        }
    }

    let mentioned = graph.entries.values().filter(|e| e.has_mentions()).count();
    info!(
        drugs = graph.len(),
        mentioned = mentioned,
        journal_mentions = journal_count,
        trial_mentions = trial_count,
        "Graph assembled"
    );
    graph
}

/// Publication ids must be unique per source kind; repeats are reported and kept.
fn report_duplicate_publication_ids(publications: &[Publication], diagnostics: &mut Diagnostics) {
    let mut seen: HashMap<(SourceKind, &str), usize> = HashMap::new();
    let mut rows: HashMap<SourceKind, usize> = HashMap::new();

    for publication in publications {
        let row = rows.entry(publication.kind).or_insert(0);
        if let Some(first) = seen.get(&(publication.kind, publication.id.as_str())) {
            diagnostics.push(
                DiagnosticKind::DuplicateId,
                publication.kind.table_name(),
                Some(*row),
                format!(
                    "publication id `{}` already used at row {}",
                    publication.id, first
                ),
            );
        } else {
            seen.insert((publication.kind, publication.id.as_str()), *row);
        }
        *row += 1;
    }
}
