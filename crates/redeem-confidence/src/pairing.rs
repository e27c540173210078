//! Target/decoy peptide pairing.
//!
//! A pairing maps each target peptide (with modifications) to the shuffled
//! decoy derived from it, so that peptide-level competition can put a target
//! and its own decoy in the same group.
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::PairingStrategy;
use crate::dataset::parse_target_label;
use crate::error::Result;
use crate::table::{parse_number, Table};

/// Mapping from target peptide sequence to decoy peptide sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeptidePairing {
    pairs: HashMap<String, String>,
}

impl PeptidePairing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, peptide: &str) -> Option<&str> {
        self.pairs.get(peptide).map(String::as_str)
    }

    /// Pairing class of a peptide: its partner if it has one, else itself.
    pub fn class_of<'a>(&'a self, peptide: &'a str) -> &'a str {
        self.get(peptide).unwrap_or(peptide)
    }

    pub fn insert(&mut self, target: impl Into<String>, decoy: impl Into<String>) {
        self.pairs.insert(target.into(), decoy.into());
    }

    pub fn contains(&self, peptide: &str) -> bool {
        self.pairs.contains_key(peptide)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(t, d)| (t.as_str(), d.as_str()))
    }
}

impl From<HashMap<String, String>> for PeptidePairing {
    fn from(pairs: HashMap<String, String>) -> Self {
        Self { pairs }
    }
}

impl<S: Into<String>> FromIterator<(S, S)> for PeptidePairing {
    fn from_iter<I: IntoIterator<Item = (S, S)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(t, d)| (t.into(), d.into()))
                .collect(),
        }
    }
}

/// Column names used to build a pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingColumns {
    pub mass_column: String,
    pub sequence_column: String,
    pub target_column: String,
    /// Source target sequence recorded on every decoy.
    pub original_sequence_column: String,
}

impl Default for PairingColumns {
    fn default() -> Self {
        Self {
            mass_column: "peptide mass".to_string(),
            sequence_column: "sequence".to_string(),
            target_column: "target/decoy".to_string(),
            original_sequence_column: "original target sequence".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct PairingRow {
    mass: f64,
    sequence: String,
    target: bool,
    original: String,
}

/// Build a target to decoy peptide pairing from a PSM table.
///
/// Fails with [`crate::error::ConfidenceError::MissingColumns`] naming every
/// required column that is absent.
pub fn build_pairing<R: Rng + ?Sized>(
    table: &Table,
    columns: &PairingColumns,
    strategy: PairingStrategy,
    rng: &mut R,
) -> Result<PeptidePairing> {
    let rows = pairing_rows(table, columns)?;
    let pairing = match strategy {
        PairingStrategy::Mass => pair_by_mass(&rows, rng),
        PairingStrategy::ExactJoin => pair_by_join(&rows),
    };
    log::debug!(
        "Built a peptide pairing with {} entries from {} rows ({:?})",
        pairing.len(),
        rows.len(),
        strategy
    );
    Ok(pairing)
}

fn pairing_rows(table: &Table, columns: &PairingColumns) -> Result<Vec<PairingRow>> {
    let indices = table.require_columns(&[
        columns.mass_column.as_str(),
        columns.sequence_column.as_str(),
        columns.target_column.as_str(),
        columns.original_sequence_column.as_str(),
    ])?;
    let (mass_idx, seq_idx, target_idx, orig_idx) = (indices[0], indices[1], indices[2], indices[3]);

    table
        .records()
        .iter()
        .enumerate()
        .map(|(row, record)| -> Result<PairingRow> {
            Ok(PairingRow {
                mass: parse_number(&record[mass_idx], &columns.mass_column, row)?,
                sequence: record[seq_idx].trim().to_string(),
                target: parse_target_label(&record[target_idx], row)?,
                original: record[orig_idx].trim().to_string(),
            })
        })
        .collect()
}

/// Keep the first row for every `(mass, sequence)` of one label.
fn unique_peptides(rows: &[PairingRow], target: bool) -> Vec<PairingRow> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|row| row.target == target)
        .filter(|row| seen.insert((row.mass.to_bits(), row.sequence.clone())))
        .cloned()
        .collect()
}

/// Mass/composition matching.
///
/// Each target takes the first unused decoy whose recorded source sequence is
/// the target's bare sequence and whose mass and modified residues are
/// identical. Targets without such a decoy pair with themselves.
fn pair_by_mass<R: Rng + ?Sized>(rows: &[PairingRow], rng: &mut R) -> PeptidePairing {
    let mut targets = unique_peptides(rows, true);
    targets.shuffle(rng);

    let mut decoys: Vec<(String, PairingRow)> = unique_peptides(rows, false)
        .into_iter()
        .map(|row| (strip_modifications(&row.original), row))
        .collect();
    decoys.shuffle(rng);
    decoys.sort_by(|a, b| a.0.cmp(&b.0));

    let mut pairing = PeptidePairing::new();
    let mut consumed = HashSet::new();
    for target in &targets {
        if pairing.contains(&target.sequence) {
            continue;
        }
        let raw_sequence = strip_modifications(&target.sequence);
        let left = decoys.partition_point(|(orig, _)| orig.as_str() < raw_sequence.as_str());
        let right = decoys.partition_point(|(orig, _)| orig.as_str() <= raw_sequence.as_str());

        let target_mods = modified_residues(&target.sequence);
        let partner = (left..right).find(|idx| {
            let decoy = &decoys[*idx].1;
            !consumed.contains(idx)
                && decoy.mass == target.mass
                && modified_residues(&decoy.sequence) == target_mods
        });
        match partner {
            Some(idx) => {
                consumed.insert(idx);
                pairing.insert(target.sequence.clone(), decoys[idx].1.sequence.clone());
            }
            None => pairing.insert(target.sequence.clone(), target.sequence.clone()),
        }
    }

    log::trace!(
        "Mass pairing matched {} of {} targets",
        consumed.len(),
        targets.len()
    );
    pairing
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct JoinKey {
    source: String,
    mass_bits: u64,
    composition: Vec<String>,
    ordinal: usize,
}

/// Exact join matching.
///
/// Targets and decoys are keyed by their bare source sequence, mass and
/// residue composition, plus an ordinal among peptides sharing that key. The
/// pairing is the inner join of both sides; unmatched peptides are dropped.
fn pair_by_join(rows: &[PairingRow]) -> PeptidePairing {
    let join_keys = |target: bool| -> Vec<(JoinKey, String)> {
        let mut seen = HashSet::new();
        let mut ordinals: HashMap<(String, u64, Vec<String>), usize> = HashMap::new();
        rows.iter()
            .filter(|row| row.target == target)
            .filter(|row| seen.insert(row.sequence.clone()))
            .map(|row| {
                let source = if row.original.is_empty() {
                    &row.sequence
                } else {
                    &row.original
                };
                let base = (
                    strip_modifications(source),
                    row.mass.to_bits(),
                    composition(&row.sequence),
                );
                let counter = ordinals.entry(base.clone()).or_insert(0);
                let ordinal = *counter;
                *counter += 1;
                let key = JoinKey {
                    source: base.0,
                    mass_bits: base.1,
                    composition: base.2,
                    ordinal,
                };
                (key, row.sequence.clone())
            })
            .collect()
    };

    let decoys: HashMap<JoinKey, String> = join_keys(false).into_iter().collect();
    join_keys(true)
        .into_iter()
        .filter_map(|(key, target)| decoys.get(&key).map(|decoy| (target, decoy.clone())))
        .collect()
}

fn residue_regex() -> &'static Regex {
    static RESIDUE: OnceLock<Regex> = OnceLock::new();
    RESIDUE.get_or_init(|| {
        Regex::new(r"(\w)(\[[^\]]*\]|\([^)]*\))?").expect("residue pattern is valid")
    })
}

fn modification_regex() -> &'static Regex {
    static MODIFICATION: OnceLock<Regex> = OnceLock::new();
    MODIFICATION.get_or_init(|| {
        Regex::new(r"\[[^\]]*\]|\([^)]*\)").expect("modification pattern is valid")
    })
}

/// Remove bracket and parenthesis modification annotations.
pub fn strip_modifications(sequence: &str) -> String {
    modification_regex().replace_all(sequence, "").into_owned()
}

/// Residue tokens (residue plus any modification), sorted so that order does
/// not matter.
pub fn composition(sequence: &str) -> Vec<String> {
    let mut tokens: Vec<String> = residue_regex()
        .find_iter(sequence)
        .map(|m| m.as_str().to_string())
        .collect();
    tokens.sort_unstable();
    tokens
}

/// Sorted modified residue tokens such as `M[15.9949]`.
pub fn modified_residues(sequence: &str) -> Vec<String> {
    let mut tokens: Vec<String> = residue_regex()
        .captures_iter(sequence)
        .filter(|caps| caps.get(2).is_some())
        .map(|caps| caps[0].to_string())
        .collect();
    tokens.sort_unstable();
    tokens
}
