//! Confidence estimation at the PSM, peptide and protein levels.
//!
//! [`assign_confidence`] resolves the run parameters once (score column,
//! direction, peptide strategy), then hands every level, in the fixed order
//! psms, peptides, proteins, to a [`ConfidenceMethod`]. Each level yields a
//! table of competition winners with q-values, split into targets and decoys.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::competition::compete;
use crate::config::{ConfidenceConfig, Method, PeptideFdrType, ProteinAggregation};
use crate::dataset::PsmDataset;
use crate::error::{ConfidenceError, Result};
use crate::pairing::PeptidePairing;
use crate::stats::{mixmax, tdc};

/// Name of the q-value column in result tables.
pub const QVALUE_COLUMN: &str = "q-value";

/// Aggregation level of a confidence estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Psms,
    Peptides,
    Proteins,
}

impl Level {
    /// Every level, in processing order.
    pub const ALL: [Level; 3] = [Level::Psms, Level::Peptides, Level::Proteins];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Psms => "psms",
            Level::Peptides => "peptides",
            Level::Proteins => "proteins",
        }
    }

    /// Human readable plural, used in log messages.
    pub fn label(&self) -> &'static str {
        match self {
            Level::Psms => "PSMs",
            Level::Peptides => "Peptides",
            Level::Proteins => "Proteins",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "psms" => Ok(Level::Psms),
            "peptides" => Ok(Level::Peptides),
            "proteins" => Ok(Level::Proteins),
            _ => Err(format!("Unknown level: {}", s)),
        }
    }
}

/// One competition winner with its q-value.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceRow {
    /// Values of the table's key columns.
    pub keys: Vec<String>,
    pub score: f64,
    pub target: bool,
    pub q_value: f64,
}

/// The confidence estimates of one level, either all targets or all decoys.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceTable {
    pub level: Level,
    /// Spectrum columns and the peptide column, or the protein column.
    pub key_columns: Vec<String>,
    pub score_column: String,
    pub rows: Vec<ConfidenceRow>,
    /// Estimated proportion of incorrect targets, when the method provides one.
    pub pi_zero: Option<f64>,
}

impl ConfidenceTable {
    /// Column names in output order: keys, score, q-value.
    pub fn headers(&self) -> Vec<String> {
        let mut headers = self.key_columns.clone();
        headers.push(self.score_column.clone());
        headers.push(QVALUE_COLUMN.to_string());
        headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn q_values(&self) -> Array1<f64> {
        self.rows.iter().map(|row| row.q_value).collect()
    }

    pub fn scores(&self) -> Array1<f64> {
        self.rows.iter().map(|row| row.score).collect()
    }

    /// Rows accepted at `fdr`.
    pub fn num_passing(&self, fdr: f64) -> usize {
        self.rows.iter().filter(|row| row.q_value <= fdr).count()
    }

    /// Look up a row by its key values.
    pub fn find(&self, keys: &[&str]) -> Option<&ConfidenceRow> {
        self.rows
            .iter()
            .find(|row| row.keys.iter().map(String::as_str).eq(keys.iter().copied()))
    }
}

/// The estimates of one level as produced by a [`ConfidenceMethod`].
#[derive(Debug, Clone, PartialEq)]
pub struct LevelEstimate {
    pub targets: ConfidenceTable,
    pub decoys: Option<ConfidenceTable>,
}

/// Confidence estimates for a collection of PSMs.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceResult {
    score_column: String,
    desc: bool,
    eval_fdr: f64,
    method: Method,
    confidence_estimates: BTreeMap<Level, ConfidenceTable>,
    decoy_confidence_estimates: BTreeMap<Level, ConfidenceTable>,
}

impl ConfidenceResult {
    fn from_levels(
        estimation: &Estimation<'_>,
        method: Method,
        levels: Vec<(Level, LevelEstimate)>,
    ) -> Self {
        let mut confidence_estimates = BTreeMap::new();
        let mut decoy_confidence_estimates = BTreeMap::new();
        for (level, estimate) in levels {
            confidence_estimates.insert(level, estimate.targets);
            if let Some(decoys) = estimate.decoys {
                decoy_confidence_estimates.insert(level, decoys);
            }
        }
        Self {
            score_column: estimation.score_column.clone(),
            desc: estimation.desc,
            eval_fdr: estimation.eval_fdr,
            method,
            confidence_estimates,
            decoy_confidence_estimates,
        }
    }

    pub fn score_column(&self) -> &str {
        &self.score_column
    }

    pub fn desc(&self) -> bool {
        self.desc
    }

    pub fn eval_fdr(&self) -> f64 {
        self.eval_fdr
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Target estimates per level.
    pub fn confidence_estimates(&self) -> &BTreeMap<Level, ConfidenceTable> {
        &self.confidence_estimates
    }

    /// Decoy estimates per level.
    pub fn decoy_confidence_estimates(&self) -> &BTreeMap<Level, ConfidenceTable> {
        &self.decoy_confidence_estimates
    }

    pub fn levels(&self) -> impl Iterator<Item = Level> + '_ {
        self.confidence_estimates.keys().copied()
    }

    pub fn get(&self, level: Level) -> Option<&ConfidenceTable> {
        self.confidence_estimates.get(&level)
    }

    pub fn decoys(&self, level: Level) -> Option<&ConfidenceTable> {
        self.decoy_confidence_estimates.get(&level)
    }
}

/// A PSM reduced to what the engine ranks and groups by.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub spectrum: Vec<String>,
    pub peptide: String,
    pub protein: String,
    pub target: bool,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct ProteinEntry {
    protein: String,
    target: bool,
    score: f64,
}

/// Peptide-level grouping, resolved once per run.
#[derive(Debug, Clone, Copy)]
pub enum PeptideStrategy<'a> {
    /// Group by peptide sequence.
    Classic,
    /// Group by pairing class.
    PeptideOnly(&'a PeptidePairing),
    /// Best PSM per spectrum, then group by pairing class.
    PsmPeptide(&'a PeptidePairing),
}

impl<'a> PeptideStrategy<'a> {
    pub fn resolve(kind: PeptideFdrType, pairing: Option<&'a PeptidePairing>) -> Result<Self> {
        match (kind, pairing) {
            (PeptideFdrType::Classic, _) => Ok(PeptideStrategy::Classic),
            (PeptideFdrType::PeptideOnly, Some(pairing)) => Ok(PeptideStrategy::PeptideOnly(pairing)),
            (PeptideFdrType::PsmPeptide, Some(pairing)) => Ok(PeptideStrategy::PsmPeptide(pairing)),
            (kind, None) => Err(ConfidenceError::MissingPairing(kind.as_str().to_string())),
        }
    }
}

/// Everything a method needs to estimate one level.
#[derive(Debug, Clone)]
pub struct Estimation<'a> {
    pub dataset: &'a PsmDataset,
    pub entries: Vec<ScoredEntry>,
    pub score_column: String,
    pub desc: bool,
    pub eval_fdr: f64,
    pub peptide_strategy: PeptideStrategy<'a>,
    pub protein_aggregation: ProteinAggregation,
}

impl<'a> Estimation<'a> {
    fn new(
        dataset: &'a PsmDataset,
        score_column: String,
        desc: bool,
        config: &ConfidenceConfig,
        peptide_strategy: PeptideStrategy<'a>,
    ) -> Result<Self> {
        let scores = dataset.score(&score_column)?;
        let entries = (0..dataset.len())
            .map(|i| ScoredEntry {
                spectrum: dataset.spectra()[i].clone(),
                peptide: dataset.peptides()[i].clone(),
                protein: dataset.proteins()[i].clone(),
                target: dataset.targets()[i],
                score: scores[i],
            })
            .collect();
        Ok(Self {
            dataset,
            entries,
            score_column,
            desc,
            eval_fdr: config.eval_fdr,
            peptide_strategy,
            protein_aggregation: config.protein_aggregation,
        })
    }

    /// Key columns of a level's result table.
    pub fn key_columns(&self, level: Level) -> Vec<String> {
        let columns = self.dataset.columns();
        match level {
            Level::Psms | Level::Peptides => {
                let mut keys = columns.spectrum_columns.clone();
                keys.push(columns.peptide_column.clone());
                keys
            }
            Level::Proteins => vec![columns.protein_column.clone()],
        }
    }

    /// Best PSM per spectrum.
    fn compete_spectra(&self, entries: &[ScoredEntry], rng: &mut dyn RngCore) -> Vec<ScoredEntry> {
        compete(entries, |e| e.spectrum.clone(), |e| e.score, self.desc, rng)
    }

    fn table(&self, level: Level, rows: Vec<ConfidenceRow>) -> ConfidenceTable {
        ConfidenceTable {
            level,
            key_columns: self.key_columns(level),
            score_column: self.score_column.clone(),
            rows,
            pi_zero: None,
        }
    }

    /// Split rows into a target table and a decoy table.
    fn partition(&self, level: Level, rows: Vec<ConfidenceRow>) -> LevelEstimate {
        let (targets, decoys): (Vec<_>, Vec<_>) = rows.into_iter().partition(|row| row.target);
        LevelEstimate {
            targets: self.table(level, targets),
            decoys: Some(self.table(level, decoys)),
        }
    }

    fn log_passing(&self, level: Level, rows: &[ConfidenceRow]) {
        log::info!(
            "  - Found {} {} at q<={}.",
            rows.iter()
                .filter(|row| row.target && row.q_value <= self.eval_fdr)
                .count(),
            level.label(),
            self.eval_fdr
        );
    }
}

fn psm_keys(entry: &ScoredEntry) -> Vec<String> {
    let mut keys = entry.spectrum.clone();
    keys.push(entry.peptide.clone());
    keys
}

/// A way of assigning q-values to the winners of each level.
pub trait ConfidenceMethod {
    fn name(&self) -> &str;

    /// Levels this method produces estimates for; others are skipped.
    fn supports(&self, level: Level) -> bool {
        let _ = level;
        true
    }

    /// Estimate one level.
    fn estimate_level(
        &self,
        estimation: &Estimation<'_>,
        level: Level,
        rng: &mut dyn RngCore,
    ) -> Result<LevelEstimate>;
}

/// Build the method selected by `method`.
pub fn build_method(method: Method) -> Box<dyn ConfidenceMethod> {
    match method {
        Method::Tdc => Box::new(TdcConfidence),
        Method::Mixmax => Box::new(MixmaxConfidence),
    }
}

/// Assign confidence estimates using target-decoy competition.
///
/// For a score threshold `t`, the FDR is estimated as
/// `(|{d_i >= t}| + 1) / |{f_i >= t}|` over decoy scores `d` and target
/// scores `f`; each entry's q-value is the minimum FDR at which it would be
/// accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct TdcConfidence;

impl TdcConfidence {
    fn peptide_winners(
        &self,
        estimation: &Estimation<'_>,
        rng: &mut dyn RngCore,
    ) -> Vec<ScoredEntry> {
        let desc = estimation.desc;
        match estimation.peptide_strategy {
            PeptideStrategy::Classic => compete(
                &estimation.entries,
                |e| e.peptide.clone(),
                |e| e.score,
                desc,
                rng,
            ),
            PeptideStrategy::PeptideOnly(pairing) => compete(
                &estimation.entries,
                |e| pairing.class_of(&e.peptide).to_string(),
                |e| e.score,
                desc,
                rng,
            ),
            PeptideStrategy::PsmPeptide(pairing) => {
                let psms = estimation.compete_spectra(&estimation.entries, rng);
                compete(
                    &psms,
                    |e| pairing.class_of(&e.peptide).to_string(),
                    |e| e.score,
                    desc,
                    rng,
                )
            }
        }
    }

    fn protein_winners(
        &self,
        estimation: &Estimation<'_>,
        rng: &mut dyn RngCore,
    ) -> Vec<ProteinEntry> {
        let psms = estimation.compete_spectra(&estimation.entries, rng);

        // Peptides shared between proteins are not attributed to any of them.
        let delimiter = estimation.dataset.columns().protein_delimiter.as_str();
        let unique: Vec<&ScoredEntry> = psms
            .iter()
            .filter(|e| delimiter.is_empty() || !e.protein.contains(delimiter))
            .collect();
        log::debug!(
            "Dropped {} of {} PSMs mapping to multiple proteins",
            psms.len() - unique.len(),
            psms.len()
        );

        let mut aggregated: BTreeMap<(String, bool), f64> = BTreeMap::new();
        for entry in unique {
            aggregated
                .entry((entry.protein.clone(), entry.target))
                .and_modify(|acc| {
                    *acc = estimation
                        .protein_aggregation
                        .combine(*acc, entry.score, estimation.desc)
                })
                .or_insert(entry.score);
        }
        let proteins: Vec<ProteinEntry> = aggregated
            .into_iter()
            .map(|((protein, target), score)| ProteinEntry {
                protein,
                target,
                score,
            })
            .collect();

        compete(
            &proteins,
            |p| p.protein.clone(),
            |p| p.score,
            estimation.desc,
            rng,
        )
    }
}

/// Attach TDC q-values to competition winners.
fn tdc_rows<T>(
    winners: &[T],
    desc: bool,
    score: impl Fn(&T) -> f64,
    target: impl Fn(&T) -> bool,
    keys: impl Fn(&T) -> Vec<String>,
) -> Result<Vec<ConfidenceRow>> {
    let scores: Array1<f64> = winners.iter().map(&score).collect();
    let targets: Array1<bool> = winners.iter().map(&target).collect();
    let qvals = tdc(&scores, &targets, desc)?;
    Ok(winners
        .iter()
        .zip(qvals.iter())
        .map(|(winner, &q_value)| ConfidenceRow {
            keys: keys(winner),
            score: score(winner),
            target: target(winner),
            q_value,
        })
        .collect())
}

impl ConfidenceMethod for TdcConfidence {
    fn name(&self) -> &str {
        "target-decoy competition"
    }

    fn estimate_level(
        &self,
        estimation: &Estimation<'_>,
        level: Level,
        rng: &mut dyn RngCore,
    ) -> Result<LevelEstimate> {
        let desc = estimation.desc;
        let rows = match level {
            Level::Psms => {
                let winners = estimation.compete_spectra(&estimation.entries, rng);
                tdc_rows(&winners, desc, |e| e.score, |e| e.target, psm_keys)?
            }
            Level::Peptides => {
                let winners = self.peptide_winners(estimation, rng);
                tdc_rows(&winners, desc, |e| e.score, |e| e.target, psm_keys)?
            }
            Level::Proteins => {
                let winners = self.protein_winners(estimation, rng);
                tdc_rows(
                    &winners,
                    desc,
                    |p| p.score,
                    |p| p.target,
                    |p| vec![p.protein.clone()],
                )?
            }
        };
        estimation.log_passing(level, &rows);
        Ok(estimation.partition(level, rows))
    }
}

/// Assign confidence estimates using mix-max.
///
/// Targets and decoys compete separately per spectrum, so every spectrum
/// contributes its best target and its best decoy. Only PSM-level estimates
/// are produced and no decoy table is returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct MixmaxConfidence;

impl ConfidenceMethod for MixmaxConfidence {
    fn name(&self) -> &str {
        "mix-max competition"
    }

    fn supports(&self, level: Level) -> bool {
        level == Level::Psms
    }

    fn estimate_level(
        &self,
        estimation: &Estimation<'_>,
        level: Level,
        rng: &mut dyn RngCore,
    ) -> Result<LevelEstimate> {
        // Scores are oriented so that higher is better.
        let sign = if estimation.desc { 1.0 } else { -1.0 };
        let (targets, decoys): (Vec<ScoredEntry>, Vec<ScoredEntry>) = estimation
            .entries
            .iter()
            .cloned()
            .partition(|e| e.target);

        let oriented = |entries: Vec<ScoredEntry>| -> Vec<ScoredEntry> {
            let mut entries: Vec<ScoredEntry> = entries
                .into_iter()
                .map(|mut e| {
                    e.score *= sign;
                    e
                })
                .collect();
            entries.sort_by(|a, b| a.score.total_cmp(&b.score));
            entries
        };
        let targets = oriented(compete(
            &targets,
            |e| e.spectrum.clone(),
            |e| e.score,
            estimation.desc,
            rng,
        ));
        let decoys = oriented(compete(
            &decoys,
            |e| e.spectrum.clone(),
            |e| e.score,
            estimation.desc,
            rng,
        ));

        let mut combined: Vec<(f64, bool)> = targets
            .iter()
            .chain(decoys.iter())
            .map(|e| (e.score, e.target))
            .collect();
        combined.sort_by(|a, b| b.0.total_cmp(&a.0));

        let target_scores: Vec<f64> = targets.iter().map(|e| e.score).collect();
        let decoy_scores: Vec<f64> = decoys.iter().map(|e| e.score).collect();
        let estimate = mixmax(&target_scores, &decoy_scores, &combined, rng)?;
        log::info!("  - Estimated pi_zero = {:.6}.", estimate.pi_zero);

        // Best first, original score orientation.
        let rows: Vec<ConfidenceRow> = targets
            .iter()
            .zip(estimate.q_values.iter())
            .rev()
            .map(|(e, &q_value)| ConfidenceRow {
                keys: psm_keys(e),
                score: e.score * sign,
                target: true,
                q_value,
            })
            .collect();
        estimation.log_passing(level, &rows);

        let mut table = estimation.table(level, rows);
        table.pi_zero = Some(estimate.pi_zero);
        Ok(LevelEstimate {
            targets: table,
            decoys: None,
        })
    }
}

/// Higher is better only if it accepts strictly more target PSMs at `eval_fdr`.
fn choose_direction(dataset: &PsmDataset, score_column: &str, eval_fdr: f64) -> Result<bool> {
    let scores = dataset.score(score_column)?;
    let t_pass = dataset.num_passing(&scores, eval_fdr, true)?;
    let f_pass = dataset.num_passing(&scores, eval_fdr, false)?;
    log::debug!(
        "{}: {} PSMs pass when higher is better, {} when lower is better",
        score_column,
        t_pass,
        f_pass
    );
    Ok(t_pass > f_pass)
}

/// Pick the score column and direction for a run.
///
/// When no column is named and none accepts a PSM at `eval_fdr` (always the
/// case at 0), the first score column is used.
fn resolve_score(dataset: &PsmDataset, config: &ConfidenceConfig) -> Result<(String, bool)> {
    match &config.score_column {
        Some(name) => {
            let idx = dataset
                .score_index(name)
                .ok_or_else(|| ConfidenceError::UnknownScoreColumn(name.clone()))?;
            let score_column = dataset.score_columns()[idx].clone();
            let desc = match config.desc {
                Some(desc) => desc,
                None => choose_direction(dataset, &score_column, config.eval_fdr)?,
            };
            Ok((score_column, desc))
        }
        None => match dataset.find_best_score(config.eval_fdr, config.desc) {
            Ok(best) => {
                log::info!(
                    "Selected score '{}' (desc = {}) with {} PSMs at q<={}",
                    best.score_column,
                    best.desc,
                    best.num_passing,
                    config.eval_fdr
                );
                Ok((best.score_column, best.desc))
            }
            Err(ConfidenceError::NoPassingScores(_)) => {
                let score_column = dataset
                    .score_columns()
                    .first()
                    .cloned()
                    .ok_or(ConfidenceError::NoScoreColumns)?;
                let desc = match config.desc {
                    Some(desc) => desc,
                    None => choose_direction(dataset, &score_column, config.eval_fdr)?,
                };
                log::warn!(
                    "No score column accepts PSMs at q<={}; falling back to '{}' (desc = {})",
                    config.eval_fdr,
                    score_column,
                    desc
                );
                Ok((score_column, desc))
            }
            Err(err) => Err(err),
        },
    }
}

/// Assign confidence estimates to a collection of PSMs.
///
/// # Arguments
///
/// * `dataset` - The collection of PSMs.
/// * `config` - Run parameters; see [`ConfidenceConfig`].
/// * `rng` - Random source used to break score ties.
///
/// # Returns
///
/// Target and decoy estimates per level. Any error aborts the whole run.
pub fn assign_confidence<R: RngCore>(
    dataset: &PsmDataset,
    config: &ConfidenceConfig,
    rng: &mut R,
) -> Result<ConfidenceResult> {
    config.validate()?;
    let rng: &mut dyn RngCore = rng;
    let method = build_method(config.method);
    log::info!("Assigning confidence estimates using {}...", method.name());

    let peptide_strategy = if method.supports(Level::Peptides) {
        PeptideStrategy::resolve(config.peptide_fdr_type, dataset.peptide_pairing())?
    } else {
        PeptideStrategy::Classic
    };
    let (score_column, desc) = resolve_score(dataset, config)?;
    let estimation = Estimation::new(dataset, score_column, desc, config, peptide_strategy)?;

    let mut levels = Vec::with_capacity(Level::ALL.len());
    for level in Level::ALL {
        if !method.supports(level) {
            log::info!("  - Skipping {} for {}.", level.label(), method.name());
            continue;
        }
        levels.push((level, method.estimate_level(&estimation, level, rng)?));
    }

    Ok(ConfidenceResult::from_levels(&estimation, config.method, levels))
}

/// [`assign_confidence`] with a random source seeded from `config.seed`.
pub fn assign_confidence_seeded(
    dataset: &PsmDataset,
    config: &ConfidenceConfig,
) -> Result<ConfidenceResult> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    assign_confidence(dataset, config, &mut rng)
}

/// Assign confidence estimates to several collections of PSMs, sharing one
/// random source.
pub fn assign_confidence_all<R: RngCore>(
    datasets: &[PsmDataset],
    config: &ConfidenceConfig,
    rng: &mut R,
) -> Result<Vec<ConfidenceResult>> {
    datasets
        .iter()
        .map(|dataset| assign_confidence(dataset, config, rng))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetColumns;
    use ndarray::Array2;

    type Row<'a> = (&'a str, &'a str, &'a str, bool, f64);

    fn dataset(rows: &[Row<'_>]) -> PsmDataset {
        let columns = DatasetColumns {
            spectrum_columns: vec!["scan".to_string()],
            ..Default::default()
        }
        .with_scores(["score"]);
        PsmDataset::new(
            columns,
            rows.iter().map(|r| vec![r.0.to_string()]).collect(),
            rows.iter().map(|r| r.1.to_string()).collect(),
            rows.iter().map(|r| r.2.to_string()).collect(),
            rows.iter().map(|r| r.3).collect(),
            Array2::from_shape_vec((rows.len(), 1), rows.iter().map(|r| r.4).collect()).unwrap(),
        )
        .unwrap()
    }

    fn separated() -> PsmDataset {
        dataset(&[
            ("1", "PEPA", "P1", true, 10.0),
            ("2", "PEPB", "P2", true, 9.0),
            ("3", "PEPC", "P3", true, 8.0),
            ("4", "PEPD", "P4", true, 7.0),
            ("5", "DECA", "decoy_P1", false, 1.0),
            ("6", "DECB", "decoy_P2", false, 2.0),
            ("7", "DECC", "decoy_P3", false, 3.0),
            ("8", "DECD", "decoy_P4", false, 4.0),
        ])
    }

    fn tdc_config() -> ConfidenceConfig {
        ConfidenceConfig::default().with_score("score", Some(true))
    }

    #[test]
    fn psm_level_qvalues() {
        let result = assign_confidence_seeded(&separated(), &tdc_config()).unwrap();
        let levels: Vec<Level> = result.levels().collect();
        assert_eq!(levels, Level::ALL.to_vec());

        let psms = result.get(Level::Psms).unwrap();
        assert_eq!(psms.headers(), vec!["scan", "sequence", "score", "q-value"]);
        assert_eq!(psms.len(), 4);
        assert!(psms.rows.iter().all(|row| row.target && row.q_value == 0.25));

        let decoys = result.decoys(Level::Psms).unwrap();
        assert_eq!(decoys.find(&["8", "DECD"]).unwrap().q_value, 0.5);
        assert_eq!(decoys.find(&["7", "DECC"]).unwrap().q_value, 0.75);
        assert_eq!(decoys.find(&["5", "DECA"]).unwrap().q_value, 1.0);
        assert_eq!(psms.num_passing(0.01), 0);
    }

    #[test]
    fn one_winner_per_spectrum() {
        let data = dataset(&[
            ("1", "PEPA", "P1", true, 5.0),
            ("1", "DECA", "decoy_P1", false, 6.0),
            ("2", "PEPB", "P2", true, 4.0),
            ("2", "DECB", "decoy_P2", false, 1.0),
        ]);
        let result = assign_confidence_seeded(&data, &tdc_config()).unwrap();
        let targets = result.get(Level::Psms).unwrap();
        let decoys = result.decoys(Level::Psms).unwrap();
        assert_eq!(targets.len() + decoys.len(), 2);
        assert!(decoys.find(&["1", "DECA"]).is_some());
        assert!(targets.find(&["2", "PEPB"]).is_some());
    }

    #[test]
    fn protein_scores_are_aggregated() {
        let data = dataset(&[
            ("1", "PEPA", "P1", true, 1.0),
            ("2", "PEPB", "P1", true, 2.0),
            ("3", "PEPC", "P2,P3", true, 10.0),
            ("4", "DECA", "decoy_P1", false, 0.5),
        ]);
        let result = assign_confidence_seeded(&data, &tdc_config()).unwrap();
        let proteins = result.get(Level::Proteins).unwrap();
        assert_eq!(proteins.headers(), vec!["protein id", "score", "q-value"]);
        assert_eq!(proteins.find(&["P1"]).unwrap().score, 3.0);
        assert!(proteins.find(&["P2,P3"]).is_none());
        assert_eq!(proteins.len(), 1);
        assert_eq!(result.decoys(Level::Proteins).unwrap().len(), 1);

        let mut config = tdc_config();
        config.protein_aggregation = ProteinAggregation::Best;
        let result = assign_confidence_seeded(&data, &config).unwrap();
        let proteins = result.get(Level::Proteins).unwrap();
        assert_eq!(proteins.find(&["P1"]).unwrap().score, 2.0);
    }

    #[test]
    fn peptide_strategies() {
        let pairing: PeptidePairing = [("PEPA", "DECA"), ("PEPB", "DECB")].into_iter().collect();
        let data = dataset(&[
            ("1", "PEPA", "P1", true, 5.0),
            ("2", "DECA", "decoy_P1", false, 6.0),
            ("3", "PEPB", "P2", true, 4.0),
            ("4", "DECB", "decoy_P2", false, 1.0),
        ])
        .with_peptide_pairing(pairing);

        let classic = assign_confidence_seeded(&data, &tdc_config()).unwrap();
        assert_eq!(classic.get(Level::Peptides).unwrap().len(), 2);
        assert_eq!(classic.decoys(Level::Peptides).unwrap().len(), 2);

        for kind in [PeptideFdrType::PeptideOnly, PeptideFdrType::PsmPeptide] {
            let mut config = tdc_config();
            config.peptide_fdr_type = kind;
            let result = assign_confidence_seeded(&data, &config).unwrap();
            let targets = result.get(Level::Peptides).unwrap();
            let decoys = result.decoys(Level::Peptides).unwrap();
            assert_eq!(targets.len(), 1);
            assert!(targets.find(&["3", "PEPB"]).is_some());
            assert_eq!(decoys.len(), 1);
            assert!(decoys.find(&["2", "DECA"]).is_some());
        }
    }

    #[test]
    fn paired_strategies_require_pairing() {
        for kind in [PeptideFdrType::PeptideOnly, PeptideFdrType::PsmPeptide] {
            let mut config = tdc_config();
            config.peptide_fdr_type = kind;
            assert!(matches!(
                assign_confidence_seeded(&separated(), &config),
                Err(ConfidenceError::MissingPairing(_))
            ));
        }
    }

    #[test]
    fn eval_fdr_bounds() {
        for eval_fdr in [0.0, 1.0] {
            let config = tdc_config().with_eval_fdr(eval_fdr);
            assert!(assign_confidence_seeded(&separated(), &config).is_ok());
        }
        for eval_fdr in [-0.01, 1.01] {
            let config = tdc_config().with_eval_fdr(eval_fdr);
            assert!(matches!(
                assign_confidence_seeded(&separated(), &config),
                Err(ConfidenceError::InvalidEvalFdr(_))
            ));
        }
    }

    #[test]
    fn score_and_direction_are_resolved() {
        // Lower is better here.
        let data = dataset(&[
            ("1", "PEPA", "P1", true, 0.001),
            ("2", "PEPB", "P2", true, 0.002),
            ("3", "PEPC", "P3", true, 0.003),
            ("4", "DECA", "decoy_P1", false, 0.5),
            ("5", "DECB", "decoy_P2", false, 0.9),
        ]);
        let config = ConfidenceConfig::default()
            .with_score("SCORE", None)
            .with_eval_fdr(0.5);
        let result = assign_confidence_seeded(&data, &config).unwrap();
        assert!(!result.desc());
        assert_eq!(result.score_column(), "score");

        let config = ConfidenceConfig::default().with_eval_fdr(0.5);
        let result = assign_confidence_seeded(&data, &config).unwrap();
        assert_eq!(result.score_column(), "score");
        assert!(!result.desc());

        let config = ConfidenceConfig::default().with_score("xcorr", Some(true));
        assert!(matches!(
            assign_confidence_seeded(&data, &config),
            Err(ConfidenceError::UnknownScoreColumn(_))
        ));
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let data = dataset(&[
            ("1", "PEPA", "P1", true, 1.0),
            ("1", "DECA", "decoy_P1", false, 1.0),
            ("2", "PEPB", "P2", true, 1.0),
            ("2", "DECB", "decoy_P2", false, 1.0),
            ("3", "PEPC", "P3", true, 2.0),
        ]);
        let first = assign_confidence_seeded(&data, &tdc_config()).unwrap();
        let second = assign_confidence_seeded(&data, &tdc_config()).unwrap();
        assert_eq!(first, second);
    }

    /// One target and one decoy per spectrum, scores multiplied by `sign`.
    fn mixmax_dataset(sign: f64) -> PsmDataset {
        let rows: Vec<(String, String, bool, f64)> = (0..100)
            .flat_map(|i| {
                [
                    (i.to_string(), format!("TARGET{i}"), true, sign * (5.0 + i as f64 / 10.0)),
                    (i.to_string(), format!("DECOY{i}"), false, sign * (i as f64 / 10.0)),
                ]
            })
            .collect();
        let borrowed: Vec<Row<'_>> = rows
            .iter()
            .map(|(scan, peptide, target, score)| {
                (scan.as_str(), peptide.as_str(), "P", *target, *score)
            })
            .collect();
        dataset(&borrowed)
    }

    #[test]
    fn mixmax_estimates_psms_only() {
        let data = mixmax_dataset(1.0);

        let mut config = ConfidenceConfig::new(Method::Mixmax, PeptideFdrType::PeptideOnly);
        assert!(matches!(
            assign_confidence_seeded(&data, &config),
            Err(ConfidenceError::MixmaxRequiresDirection)
        ));

        config.desc = Some(true);
        config.score_column = Some("score".to_string());
        let result = assign_confidence_seeded(&data, &config).unwrap();
        assert!(result.get(Level::Peptides).is_none());
        assert!(result.get(Level::Proteins).is_none());
        assert!(result.decoy_confidence_estimates().is_empty());

        let psms = result.get(Level::Psms).unwrap();
        assert_eq!(psms.len(), 100);
        assert!(psms.pi_zero.is_some());
        assert_eq!(psms.rows[0].score, 14.9);
        for pair in psms.rows.windows(2) {
            assert!(pair[0].q_value <= pair[1].q_value);
        }
    }

    #[test]
    fn mixmax_lower_is_better_mirrors_higher_is_better() {
        let higher = ConfidenceConfig::new(Method::Mixmax, PeptideFdrType::Classic)
            .with_score("score", Some(true))
            .with_eval_fdr(0.1);
        let lower = ConfidenceConfig::new(Method::Mixmax, PeptideFdrType::Classic)
            .with_score("score", Some(false))
            .with_eval_fdr(0.1);
        let higher = assign_confidence_seeded(&mixmax_dataset(1.0), &higher).unwrap();
        let lower = assign_confidence_seeded(&mixmax_dataset(-1.0), &lower).unwrap();
        assert!(!lower.desc());

        let higher = higher.get(Level::Psms).unwrap();
        let lower = lower.get(Level::Psms).unwrap();
        assert_eq!(higher.pi_zero, lower.pi_zero);
        assert_eq!(higher.q_values(), lower.q_values());
        assert_eq!(higher.num_passing(0.1), lower.num_passing(0.1));
        assert!(lower.num_passing(0.1) > 0);
        // Scores are reported in their original orientation, best first.
        assert_eq!(lower.rows[0].score, -14.9);
        assert_eq!(lower.scores(), -higher.scores());
    }

    #[test]
    fn psm_peptide_competes_spectra_first() {
        let pairing: PeptidePairing = [("PEPA", "DECA"), ("PEPB", "DECB")].into_iter().collect();
        let data = dataset(&[
            ("1", "PEPA", "P1", true, 5.0),
            ("1", "DECB", "decoy_P2", false, 6.0),
            ("2", "DECA", "decoy_P1", false, 4.0),
        ])
        .with_peptide_pairing(pairing);

        let mut config = tdc_config();
        config.peptide_fdr_type = PeptideFdrType::PeptideOnly;
        let result = assign_confidence_seeded(&data, &config).unwrap();
        let targets = result.get(Level::Peptides).unwrap();
        assert!(targets.find(&["1", "PEPA"]).is_some());
        let decoys = result.decoys(Level::Peptides).unwrap();
        assert!(decoys.find(&["2", "DECA"]).is_none());

        // DECB takes spectrum 1, leaving DECA alone in its class.
        config.peptide_fdr_type = PeptideFdrType::PsmPeptide;
        let result = assign_confidence_seeded(&data, &config).unwrap();
        assert!(result.get(Level::Peptides).unwrap().is_empty());
        let decoys = result.decoys(Level::Peptides).unwrap();
        assert_eq!(decoys.len(), 2);
        assert!(decoys.find(&["2", "DECA"]).is_some());
        assert!(decoys.find(&["1", "DECB"]).is_some());
    }

    #[test]
    fn zero_eval_fdr_falls_back_to_first_score() {
        let config = ConfidenceConfig::default().with_eval_fdr(0.0);
        let result = assign_confidence_seeded(&separated(), &config).unwrap();
        assert_eq!(result.score_column(), "score");
        // Neither direction accepts a PSM, so lower is better.
        assert!(!result.desc());
        assert_eq!(result.eval_fdr(), 0.0);
        assert_eq!(result.get(Level::Psms).unwrap().num_passing(0.0), 0);

        let config = config.with_score("score", None);
        let named = assign_confidence_seeded(&separated(), &config).unwrap();
        assert_eq!(named.desc(), result.desc());
    }

    #[test]
    fn several_datasets_share_one_config() {
        let datasets = vec![separated(), mixmax_dataset(1.0)];
        let config = tdc_config();
        let mut rng = StdRng::seed_from_u64(3);
        let results = assign_confidence_all(&datasets, &config, &mut rng).unwrap();
        assert_eq!(results.len(), 2);
        // One winner per spectrum in each dataset.
        for (result, n_spectra) in results.iter().zip([8, 100]) {
            assert_eq!(result.method(), Method::Tdc);
            let psms = result.get(Level::Psms).unwrap();
            let decoys = result.decoys(Level::Psms).unwrap();
            assert_eq!(psms.len() + decoys.len(), n_spectra);
        }

        let broken = vec![separated(), separated()];
        let config = tdc_config().with_eval_fdr(2.0);
        assert!(assign_confidence_all(&broken, &config, &mut rng).is_err());
    }

    #[test]
    fn level_names() {
        assert_eq!("Peptides".parse::<Level>().unwrap(), Level::Peptides);
        assert!("spectra".parse::<Level>().is_err());
        assert_eq!(Level::Proteins.to_string(), "proteins");
        assert_eq!(Level::Psms.label(), "PSMs");
    }
}
