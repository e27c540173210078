//! The PSM dataset handed to the confidence engine.
//!
//! `PsmDataset` copies the columns it needs out of a [`Table`] once, normalizes
//! the target/decoy column to booleans and parses every score column. The
//! engine never writes back into it.
use ndarray::{Array1, Array2};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::config::ConfidenceConfig;
use crate::confidence::{assign_confidence, ConfidenceResult};
use crate::error::{ConfidenceError, Result};
use crate::pairing::PeptidePairing;
use crate::stats::tdc;
use crate::table::{parse_number, Table};

/// Names of the columns a dataset is built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetColumns {
    /// Target/decoy indicator.
    pub target_column: String,
    /// Columns that together identify a mass spectrum.
    pub spectrum_columns: Vec<String>,
    /// Columns PSMs can be ranked by.
    pub score_columns: Vec<String>,
    /// Peptide sequence, modifications in `[]` or `()`.
    pub peptide_column: String,
    pub protein_column: String,
    /// Separator between protein ids of a shared peptide.
    pub protein_delimiter: String,
}

impl Default for DatasetColumns {
    fn default() -> Self {
        Self {
            target_column: "target/decoy".to_string(),
            spectrum_columns: vec!["scan".to_string(), "spectrum precursor m/z".to_string()],
            score_columns: Vec::new(),
            peptide_column: "sequence".to_string(),
            protein_column: "protein id".to_string(),
            protein_delimiter: ",".to_string(),
        }
    }
}

impl DatasetColumns {
    pub fn with_scores<S: Into<String>>(mut self, scores: impl IntoIterator<Item = S>) -> Self {
        self.score_columns = scores.into_iter().map(Into::into).collect();
        self
    }
}

/// A best score column as found by [`PsmDataset::find_best_score`].
#[derive(Debug, Clone, PartialEq)]
pub struct BestScore {
    pub score_column: String,
    pub num_passing: usize,
    pub desc: bool,
}

/// Store a collection of peptide-spectrum matches (PSMs).
#[derive(Debug, Clone)]
pub struct PsmDataset {
    columns: DatasetColumns,
    spectra: Vec<Vec<String>>,
    peptides: Vec<String>,
    proteins: Vec<String>,
    targets: Array1<bool>,
    /// One row per PSM, one column per score column.
    scores: Array2<f64>,
    peptide_pairing: Option<PeptidePairing>,
}

impl PsmDataset {
    /// Build a dataset from a table.
    ///
    /// Fails when a named column is missing, a label or score cannot be
    /// parsed, or the table lacks targets or decoys.
    pub fn from_table(table: &Table, columns: DatasetColumns) -> Result<Self> {
        if columns.score_columns.is_empty() {
            return Err(ConfidenceError::NoScoreColumns);
        }

        let mut required: Vec<&str> = vec![columns.target_column.as_str()];
        required.extend(columns.spectrum_columns.iter().map(String::as_str));
        required.push(columns.peptide_column.as_str());
        required.push(columns.protein_column.as_str());
        required.extend(columns.score_columns.iter().map(String::as_str));
        let indices = table.require_columns(&required)?;

        let target_idx = indices[0];
        let n_spectrum = columns.spectrum_columns.len();
        let spectrum_idx = &indices[1..1 + n_spectrum];
        let peptide_idx = indices[1 + n_spectrum];
        let protein_idx = indices[2 + n_spectrum];
        let score_idx = &indices[3 + n_spectrum..];

        let n_psms = table.len();
        let mut spectra = Vec::with_capacity(n_psms);
        let mut peptides = Vec::with_capacity(n_psms);
        let mut proteins = Vec::with_capacity(n_psms);
        let mut targets = Vec::with_capacity(n_psms);
        let mut scores = Vec::with_capacity(n_psms * score_idx.len());

        for (row, record) in table.records().iter().enumerate() {
            targets.push(parse_target_label(&record[target_idx], row)?);
            spectra.push(
                spectrum_idx
                    .iter()
                    .map(|&idx| record[idx].trim().to_string())
                    .collect(),
            );
            peptides.push(record[peptide_idx].trim().to_string());
            proteins.push(record[protein_idx].trim().to_string());
            for (name, &idx) in columns.score_columns.iter().zip(score_idx) {
                scores.push(parse_number(&record[idx], name, row)?);
            }
        }

        let scores = Array2::from_shape_vec((n_psms, score_idx.len()), scores)
            .map_err(|_| ConfidenceError::LengthMismatch {
                scores: n_psms * score_idx.len(),
                targets: n_psms,
            })?;

        Self::new(
            columns,
            spectra,
            peptides,
            proteins,
            Array1::from_vec(targets),
            scores,
        )
    }

    /// Build a dataset from already typed columns.
    pub fn new(
        columns: DatasetColumns,
        spectra: Vec<Vec<String>>,
        peptides: Vec<String>,
        proteins: Vec<String>,
        targets: Array1<bool>,
        scores: Array2<f64>,
    ) -> Result<Self> {
        if columns.score_columns.is_empty() {
            return Err(ConfidenceError::NoScoreColumns);
        }
        let n_psms = targets.len();
        for len in [spectra.len(), peptides.len(), proteins.len(), scores.nrows()] {
            if len != n_psms {
                return Err(ConfidenceError::LengthMismatch {
                    scores: len,
                    targets: n_psms,
                });
            }
        }
        if scores.ncols() != columns.score_columns.len() {
            return Err(ConfidenceError::LengthMismatch {
                scores: scores.ncols(),
                targets: columns.score_columns.len(),
            });
        }

        if n_psms == 0 {
            return Err(ConfidenceError::NoPsms);
        }
        let n_targets = targets.iter().filter(|&&t| t).count();
        if n_targets == n_psms {
            return Err(ConfidenceError::NoDecoys);
        }
        if n_targets == 0 {
            return Err(ConfidenceError::NoTargets);
        }

        Ok(Self {
            columns,
            spectra,
            peptides,
            proteins,
            targets,
            scores,
            peptide_pairing: None,
        })
    }

    pub fn log_input_data_summary(&self) {
        log::info!("----- Input Data Summary -----");
        log::info!(
            "{} Target PSMs and {} Decoy PSMs",
            self.num_targets(),
            self.num_decoys()
        );
        log::info!(
            "{} score columns: {}",
            self.columns.score_columns.len(),
            self.columns.score_columns.join(", ")
        );
        log::info!(
            "Peptide pairing: {}",
            match &self.peptide_pairing {
                Some(pairing) => format!("{} entries", pairing.len()),
                None => "none".to_string(),
            }
        );
        log::info!("-------------------------------");
    }

    pub fn columns(&self) -> &DatasetColumns {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn num_targets(&self) -> usize {
        self.targets.iter().filter(|&&t| t).count()
    }

    pub fn num_decoys(&self) -> usize {
        self.len() - self.num_targets()
    }

    pub fn spectra(&self) -> &[Vec<String>] {
        &self.spectra
    }

    pub fn peptides(&self) -> &[String] {
        &self.peptides
    }

    pub fn proteins(&self) -> &[String] {
        &self.proteins
    }

    pub fn targets(&self) -> &Array1<bool> {
        &self.targets
    }

    pub fn scores(&self) -> &Array2<f64> {
        &self.scores
    }

    pub fn score_columns(&self) -> &[String] {
        &self.columns.score_columns
    }

    pub fn score_index(&self, score_column: &str) -> Option<usize> {
        self.columns
            .score_columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(score_column))
    }

    /// Scores of one score column.
    pub fn score(&self, score_column: &str) -> Result<Array1<f64>> {
        let idx = self
            .score_index(score_column)
            .ok_or_else(|| ConfidenceError::UnknownScoreColumn(score_column.to_string()))?;
        Ok(self.scores.column(idx).to_owned())
    }

    pub fn peptide_pairing(&self) -> Option<&PeptidePairing> {
        self.peptide_pairing.as_ref()
    }

    /// Attach a target/decoy peptide pairing to this collection of PSMs.
    pub fn add_peptide_pairing(&mut self, pairing: PeptidePairing) {
        self.peptide_pairing = Some(pairing);
    }

    pub fn with_peptide_pairing(mut self, pairing: PeptidePairing) -> Self {
        self.add_peptide_pairing(pairing);
        self
    }

    /// Number of target PSMs accepted at `eval_fdr` when ranking by `scores`.
    ///
    /// Decoys are not counted, even when their q-value passes.
    pub fn num_passing(&self, scores: &Array1<f64>, eval_fdr: f64, desc: bool) -> Result<usize> {
        let qvals = tdc(scores, &self.targets, desc)?;
        Ok(qvals
            .iter()
            .zip(self.targets.iter())
            .filter(|&(&q, &target)| target && q <= eval_fdr)
            .count())
    }

    /// Find the score column (and direction) accepting the most target PSMs
    /// at `eval_fdr`.
    ///
    /// Both directions are tried unless `desc` is given. Fails with
    /// [`ConfidenceError::NoPassingScores`] when no column accepts a PSM;
    /// [`crate::confidence::assign_confidence`] then falls back to the first
    /// score column.
    pub fn find_best_score(&self, eval_fdr: f64, desc: Option<bool>) -> Result<BestScore> {
        let directions = match desc {
            Some(desc) => vec![desc],
            None => vec![true, false],
        };

        let mut best: Option<BestScore> = None;
        for desc in directions {
            for (idx, name) in self.columns.score_columns.iter().enumerate() {
                let scores = self.scores.column(idx).to_owned();
                let num_passing = self.num_passing(&scores, eval_fdr, desc)?;
                log::trace!(
                    "{} (desc = {}) accepts {} PSMs at q<={}",
                    name,
                    desc,
                    num_passing,
                    eval_fdr
                );
                if num_passing > best.as_ref().map_or(0, |b| b.num_passing) {
                    best = Some(BestScore {
                        score_column: name.clone(),
                        num_passing,
                        desc,
                    });
                }
            }
        }

        best.ok_or(ConfidenceError::NoPassingScores(eval_fdr))
    }

    /// Assign confidence estimates to this collection of PSMs.
    pub fn assign_confidence<R: RngCore>(
        &self,
        config: &ConfidenceConfig,
        rng: &mut R,
    ) -> Result<ConfidenceResult> {
        assign_confidence(self, config, rng)
    }
}

/// Normalize a target/decoy label to `true` for targets.
///
/// Accepts booleans, numeric labels (`1` target; `0` and `-1` decoy) and the
/// usual strings, ignoring case.
pub fn parse_target_label(value: &str, row: usize) -> Result<bool> {
    let label = value.trim().to_ascii_lowercase();
    match label.as_str() {
        "true" | "t" | "target" | "1" | "1.0" | "+1" => Ok(true),
        "false" | "f" | "decoy" | "d" | "0" | "0.0" | "-1" | "-1.0" => Ok(false),
        _ => Err(ConfidenceError::InvalidTargetLabel {
            value: value.to_string(),
            row,
        }),
    }
}
