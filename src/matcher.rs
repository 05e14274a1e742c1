//! Mention matching.
//!
//! A drug is mentioned by a publication when the drug name's token sequence
//! occurs contiguously in the title's token sequence, compared case-insensitively.
//! Tokens are maximal runs of alphanumeric characters, so `ALPHA` never matches
//! inside `Alphabet` and `A` never matches inside `ALPHA`.

use crate::error::{DiagnosticKind, Diagnostics};
use crate::model::{Drug, Mention, Publication};
use crate::normalize::DRUGS_TABLE;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Split text into lowercase alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Whether `name` occurs in `title` as a whole-token sequence.
///
/// Reference predicate; [`DrugIndex`] computes the same relation for many
/// drugs at once.
pub fn mentions(name: &str, title: &str) -> bool {
    let needle = tokenize(name);
    if needle.is_empty() {
        return false;
    }
    let haystack = tokenize(title);
    haystack.windows(needle.len()).any(|w| w == needle.as_slice())
}

/// Drug names indexed by their first token.
pub struct DrugIndex<'a> {
    drugs: &'a [Drug],
    patterns: Vec<Vec<String>>,
    by_first_token: HashMap<String, Vec<usize>>,
}

impl<'a> DrugIndex<'a> {
    /// Index every drug with a usable name. Drugs whose name yields no token
    /// are skipped with an `EMPTY_TEXT` diagnostic.
    ///
    /// Only the first row of a drug id is indexed, the same row the graph keeps,
    /// so a later row reusing the id never contributes mentions.
    pub fn new(drugs: &'a [Drug], diagnostics: &mut Diagnostics) -> Self {
        let mut patterns = Vec::with_capacity(drugs.len());
        let mut by_first_token: HashMap<String, Vec<usize>> = HashMap::new();
        let mut seen_ids: HashSet<&str> = HashSet::with_capacity(drugs.len());

        for (idx, drug) in drugs.iter().enumerate() {
            if !seen_ids.insert(drug.id.as_str()) {
                debug!(id = %drug.id, name = %drug.name, row = idx, "Drug id already indexed, row not matched");
                patterns.push(Vec::new());
                continue;
            }

            let tokens = tokenize(&drug.name);
            match tokens.first() {
                Some(first) => {
                    by_first_token.entry(first.clone()).or_default().push(idx);
                }
                None => diagnostics.push(
                    DiagnosticKind::EmptyText,
                    DRUGS_TABLE,
                    Some(idx),
                    format!("drug `{}` has an empty name, skipped", drug.id),
                ),
            }
            patterns.push(tokens);
        }

        debug!(
            drugs = drugs.len(),
            first_tokens = by_first_token.len(),
            "Built drug index"
        );

        Self {
            drugs,
            patterns,
            by_first_token,
        }
    }

    /// Indices of the drugs mentioned by a tokenized title, ascending and unique.
    pub fn find(&self, title_tokens: &[String]) -> Vec<usize> {
        let mut hits = Vec::new();
        for start in 0..title_tokens.len() {
            let Some(candidates) = self.by_first_token.get(&title_tokens[start]) else {
                continue;
            };
            for &idx in candidates {
                if title_tokens[start..].starts_with(&self.patterns[idx]) {
                    hits.push(idx);
                }
            }
        }
        hits.sort_unstable();
        hits.dedup();
        hits
    }

    /// Mentions found in one publication at `position` of its table.
    pub fn mentions_in(&self, position: usize, publication: &Publication) -> Vec<Mention> {
        let tokens = tokenize(&publication.title);
        self.find(&tokens)
            .into_iter()
            .map(|idx| Mention {
                kind: publication.kind,
                position,
                drug_id: self.drugs[idx].id.clone(),
                publication_id: publication.id.clone(),
            })
            .collect()
    }
}

/// Match every drug against every publication title.
///
/// The result is sorted by (source kind, position, drug id) and holds at most one
/// mention per drug and publication, whichever execution mode was used.
pub fn match_mentions(
    drugs: &[Drug],
    publications: &[Publication],
    parallel: bool,
    diagnostics: &mut Diagnostics,
) -> Vec<Mention> {
    let index = DrugIndex::new(drugs, diagnostics);

    let mut candidates = Vec::with_capacity(publications.len());
    for (position, publication) in publications.iter().enumerate() {
        if tokenize(&publication.title).is_empty() {
            diagnostics.push(
                DiagnosticKind::EmptyText,
                publication.kind.table_name(),
                Some(position),
                format!("publication `{}` has an empty title, skipped", publication.id),
            );
            continue;
        }
        candidates.push((position, publication));
    }

    let mut mentions = match_candidates(&index, &candidates, parallel);
    mentions.sort();
    mentions.dedup();

    info!(
        drugs = drugs.len(),
        publications = publications.len(),
        mentions = mentions.len(),
        "Matching complete"
    );
    mentions
}

fn match_candidates(
    index: &DrugIndex<'_>,
    candidates: &[(usize, &Publication)],
    parallel: bool,
) -> Vec<Mention> {
    #[cfg(feature = "parallel")]
    {
        if parallel {
            use rayon::prelude::*;
            return candidates
                .par_iter()
                .flat_map_iter(|(position, publication)| index.mentions_in(*position, publication))
                .collect();
        }
    }
    #[cfg(not(feature = "parallel"))]
    {
        if parallel {
            debug!("Built without the `parallel` feature, matching sequentially");
        }
    }

    candidates
        .iter()
        .flat_map(|(position, publication)| index.mentions_in(*position, publication))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceKind;
    use chrono::NaiveDate;

    fn drug(id: &str, name: &str) -> Drug {
        Drug {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn publication(kind: SourceKind, id: &str, title: &str) -> Publication {
        Publication {
            kind,
            id: id.to_string(),
            title: title.to_string(),
            date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            journal: "Journal of emergency nursing".to_string(),
        }
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Imiquimod-induced Psoriasis-like, (QUZYTTIR™)"),
            vec!["imiquimod", "induced", "psoriasis", "like", "quzyttir"]
        );
        assert!(tokenize(" -- ").is_empty());
    }

    #[test]
    fn test_mentions_case_insensitive() {
        assert!(mentions("ASPIRIN", "Effects of Aspirin on headache"));
        assert!(mentions("diphenhydramine", "DIPHENHYDRAMINE hydrochloride helps"));
        assert!(!mentions("IBUPROFEN", "A study of Aspirin"));
    }

    #[test]
    fn test_mentions_token_boundary() {
        assert!(!mentions("ALPHA", "Study of Alphabet Syndrome"));
        assert!(!mentions("A", "ALPHA trial"));
        assert!(mentions("ETHANOL", "acute ethanol withdrawal, and ethanol intoxication."));
        assert!(!mentions("ETHANOL", "methanolic extracts"));
    }

    #[test]
    fn test_mentions_multi_token_name() {
        assert!(mentions("Tranexamic Acid", "Tranexamic  acid versus Epinephrine"));
        assert!(!mentions("Tranexamic Acid", "Tranexamic and acid"));
        assert!(!mentions("", "anything"));
    }

    #[test]
    fn test_match_mentions_pairwise() {
        let drugs = vec![
            drug("R01AD", "BETAMETHASONE"),
            drug("A03BA", "ATROPINE"),
            drug("V03AB", "ETHANOL"),
        ];
        let publications = vec![publication(
            SourceKind::Article,
            "13",
            "Comparison of pressure BETAMETHASONE release in trapezius ATROPINE muscle.",
        )];

        let found = match_mentions(&drugs, &publications, false, &mut Diagnostics::new());
        let ids: Vec<&str> = found.iter().map(|m| m.drug_id.as_str()).collect();
        assert_eq!(ids, vec!["A03BA", "R01AD"]);
        assert!(found.iter().all(|m| m.publication_id == "13" && m.position == 0));
    }

    #[test]
    fn test_match_mentions_nested_names_both_emitted() {
        let drugs = vec![drug("d1", "ACID"), drug("d2", "TRANEXAMIC ACID")];
        let publications = vec![publication(
            SourceKind::Trial,
            "NCT04188184",
            "Tranexamic Acid Versus Epinephrine During Exploratory Tympanotomy",
        )];

        let found = match_mentions(&drugs, &publications, false, &mut Diagnostics::new());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].kind, SourceKind::Trial);
    }

    #[test]
    fn test_match_mentions_ties_deduplicated() {
        let drugs = vec![drug("d1", "ASPIRIN")];
        let publications = vec![publication(SourceKind::Article, "p1", "Aspirin, aspirin and ASPIRIN")];

        let found = match_mentions(&drugs, &publications, false, &mut Diagnostics::new());
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_match_mentions_same_id_across_kinds_kept_apart() {
        let drugs = vec![drug("d1", "GLUCAGON")];
        let publications = vec![
            publication(SourceKind::Article, "1", "Glucagon in mice"),
            publication(SourceKind::Trial, "1", "Glucagon Infusion in T1D Patients"),
        ];

        let found = match_mentions(&drugs, &publications, false, &mut Diagnostics::new());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].kind, SourceKind::Article);
        assert_eq!(found[1].kind, SourceKind::Trial);
    }

    #[test]
    fn test_match_mentions_skips_empty_text() {
        let drugs = vec![drug("d1", ""), drug("d2", "ASPIRIN")];
        let publications = vec![
            publication(SourceKind::Article, "p1", "  "),
            publication(SourceKind::Article, "p2", "Aspirin today"),
        ];
        let mut diagnostics = Diagnostics::new();

        let found = match_mentions(&drugs, &publications, false, &mut diagnostics);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].publication_id, "p2");
        assert_eq!(diagnostics.count(DiagnosticKind::EmptyText), 2);
    }

    #[test]
    fn test_match_mentions_punctuation_title_reported() {
        let drugs = vec![drug("d1", "ASPIRIN")];
        let publications = vec![publication(SourceKind::Trial, "t1", "\u{2014} / ...")];
        let mut diagnostics = Diagnostics::new();

        let found = match_mentions(&drugs, &publications, false, &mut diagnostics);
        assert!(found.is_empty());
        assert_eq!(diagnostics.count(DiagnosticKind::EmptyText), 1);
        assert_eq!(diagnostics.entries()[0].table, "clinical_trials");
    }

    #[test]
    fn test_match_mentions_duplicate_drug_id_matches_first_name_only() {
        let drugs = vec![drug("d1", "ASPIRIN"), drug("d1", "ETHANOL")];
        let publications = vec![
            publication(SourceKind::Article, "p1", "ethanol withdrawal"),
            publication(SourceKind::Article, "p2", "Aspirin in ethanol"),
        ];

        let found = match_mentions(&drugs, &publications, false, &mut Diagnostics::new());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].publication_id, "p2");
        assert_eq!(found[0].drug_id, "d1");
    }

    #[test]
    fn test_index_agrees_with_predicate() {
        let drugs = vec![
            drug("a", "A"),
            drug("b", "ALPHA"),
            drug("c", "ALPHA BETA"),
            drug("d", "beta"),
        ];
        let titles = [
            "Alpha beta blockers",
            "Alphabet soup",
            "A trial of alpha",
            "beta-alpha",
            "",
        ];
        let mut diagnostics = Diagnostics::new();
        let index = DrugIndex::new(&drugs, &mut diagnostics);

        for title in titles {
            let hits = index.find(&tokenize(title));
            for (idx, d) in drugs.iter().enumerate() {
                assert_eq!(
                    hits.contains(&idx),
                    mentions(&d.name, title),
                    "drug {:?} vs title {:?}",
                    d.name,
                    title
                );
            }
        }
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let drugs: Vec<Drug> = ["ASPIRIN", "ETHANOL", "EPINEPHRINE", "ATROPINE"]
            .iter()
            .enumerate()
            .map(|(i, name)| drug(&format!("d{}", i), name))
            .collect();
        let publications: Vec<Publication> = (0..200)
            .map(|i| {
                let kind = if i % 3 == 0 { SourceKind::Trial } else { SourceKind::Article };
                let title = match i % 4 {
                    0 => "Aspirin and ethanol",
                    1 => "Time to epinephrine treatment",
                    2 => "Nothing relevant",
                    _ => "ATROPINE, aspirin",
                };
                publication(kind, &i.to_string(), title)
            })
            .collect();

        let sequential = match_mentions(&drugs, &publications, false, &mut Diagnostics::new());
        let parallel = match_mentions(&drugs, &publications, true, &mut Diagnostics::new());
        assert_eq!(sequential, parallel);
    }
}
