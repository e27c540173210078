use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::ConfidenceError;

/// Parameters for a confidence estimation run.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Score used to rank PSMs. When `None`, the score yielding the most
    /// target PSMs at `eval_fdr` is used.
    pub score_column: Option<String>,
    /// `true` if higher scores are better. When `None`, both directions are
    /// tried and the one accepting more PSMs at `eval_fdr` is kept.
    pub desc: Option<bool>,
    /// FDR threshold used for score/direction selection and pass counts.
    pub eval_fdr: f64,
    pub method: Method,
    pub peptide_fdr_type: PeptideFdrType,
    pub protein_aggregation: ProteinAggregation,
    /// Seed for the random source used to break score ties.
    pub seed: u64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            score_column: None,
            desc: None,
            eval_fdr: 0.01,
            method: Method::Tdc,
            peptide_fdr_type: PeptideFdrType::Classic,
            protein_aggregation: ProteinAggregation::Sum,
            seed: 0,
        }
    }
}

impl ConfidenceConfig {
    pub fn new(method: Method, peptide_fdr_type: PeptideFdrType) -> Self {
        Self {
            method,
            peptide_fdr_type,
            ..Default::default()
        }
    }

    pub fn with_score(mut self, score_column: impl Into<String>, desc: Option<bool>) -> Self {
        self.score_column = Some(score_column.into());
        self.desc = desc;
        self
    }

    pub fn with_eval_fdr(mut self, eval_fdr: f64) -> Self {
        self.eval_fdr = eval_fdr;
        self
    }

    /// Check the parameters that can be validated without looking at data.
    pub fn validate(&self) -> Result<(), ConfidenceError> {
        if !(0.0..=1.0).contains(&self.eval_fdr) {
            return Err(ConfidenceError::InvalidEvalFdr(self.eval_fdr));
        }
        if self.method == Method::Mixmax && self.desc.is_none() {
            return Err(ConfidenceError::MixmaxRequiresDirection);
        }
        Ok(())
    }
}

/// Load a confidence configuration from a JSON file.
pub fn load_confidence_config<P: AsRef<Path>>(path: P) -> anyhow::Result<ConfidenceConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: ConfidenceConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config: {}", path.as_ref().display()))?;
    Ok(config)
}

/// How q-values are assigned.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    /// Target-decoy competition.
    #[default]
    Tdc,
    /// Mix-max estimation; PSM level only.
    #[serde(alias = "mix-max")]
    Mixmax,
}

impl FromStr for Method {
    type Err = ConfidenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tdc" => Ok(Method::Tdc),
            "mixmax" | "mix-max" => Ok(Method::Mixmax),
            _ => Err(ConfidenceError::UnknownMethod(s.to_string())),
        }
    }
}

/// How peptides compete at the peptide level.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PeptideFdrType {
    /// Group by peptide sequence.
    #[default]
    Classic,
    /// Group by target/decoy pairing class.
    PeptideOnly,
    /// Best PSM per spectrum first, then group by pairing class.
    PsmPeptide,
}

impl PeptideFdrType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeptideFdrType::Classic => "classic",
            PeptideFdrType::PeptideOnly => "peptide-only",
            PeptideFdrType::PsmPeptide => "psm-peptide",
        }
    }

    pub fn needs_pairing(&self) -> bool {
        !matches!(self, PeptideFdrType::Classic)
    }
}

impl FromStr for PeptideFdrType {
    type Err = ConfidenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "classic" => Ok(PeptideFdrType::Classic),
            "peptide-only" => Ok(PeptideFdrType::PeptideOnly),
            "psm-peptide" => Ok(PeptideFdrType::PsmPeptide),
            _ => Err(ConfidenceError::UnknownPeptideFdrType(s.to_string())),
        }
    }
}

/// How PSM scores are combined into a protein score.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProteinAggregation {
    /// Sum of the member PSM scores.
    #[default]
    Sum,
    /// Best member PSM score (max when higher is better, min otherwise).
    Best,
}

impl ProteinAggregation {
    /// Fold `score` into `acc`.
    pub fn combine(&self, acc: f64, score: f64, desc: bool) -> f64 {
        match self {
            ProteinAggregation::Sum => acc + score,
            ProteinAggregation::Best if desc => acc.max(score),
            ProteinAggregation::Best => acc.min(score),
        }
    }
}

impl FromStr for ProteinAggregation {
    type Err = ConfidenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sum" => Ok(ProteinAggregation::Sum),
            "best" => Ok(ProteinAggregation::Best),
            _ => Err(ConfidenceError::UnknownProteinAggregation(s.to_string())),
        }
    }
}

/// How target peptides are paired with their shuffled decoys.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PairingStrategy {
    /// First unused decoy with identical mass and modifications; unmatched
    /// targets pair with themselves.
    #[default]
    Mass,
    /// Inner join on composition and ordinal; unmatched peptides are dropped.
    ExactJoin,
}

impl FromStr for PairingStrategy {
    type Err = ConfidenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mass" => Ok(PairingStrategy::Mass),
            "exact-join" | "exact" => Ok(PairingStrategy::ExactJoin),
            _ => Err(ConfidenceError::UnknownPairingStrategy(s.to_string())),
        }
    }
}
