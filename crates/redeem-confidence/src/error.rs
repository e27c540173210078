use thiserror::Error;

/// Errors raised while building datasets, pairings or confidence estimates.
///
/// Every variant is surfaced synchronously at the point of detection; a
/// failing level aborts the whole run.
#[derive(Debug, Error)]
pub enum ConfidenceError {
    #[error("'eval_fdr' should be between 0 and 1, got {0}")]
    InvalidEvalFdr(f64),

    #[error("'{0}' is not a valid confidence method (expected one of: tdc, mixmax)")]
    UnknownMethod(String),

    #[error("'{0}' is not a valid value for pep_fdr_type (expected one of: classic, peptide-only, psm-peptide)")]
    UnknownPeptideFdrType(String),

    #[error("'{0}' is not a valid protein aggregation (expected one of: sum, best)")]
    UnknownProteinAggregation(String),

    #[error("'{0}' is not a valid pairing strategy (expected one of: mass, exact-join)")]
    UnknownPairingStrategy(String),

    #[error("'desc' has to be set for mix-max")]
    MixmaxRequiresDirection,

    #[error("No PSMs were detected")]
    NoPsms,

    #[error("No target PSMs were detected")]
    NoTargets,

    #[error("No decoy PSMs were detected")]
    NoDecoys,

    #[error("Must provide paired target decoy peptide information for pep_fdr_type '{0}'")]
    MissingPairing(String),

    #[error("Missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("At least one score column is required")]
    NoScoreColumns,

    #[error("'{0}' is not one of the dataset score columns")]
    UnknownScoreColumn(String),

    #[error("Unrecognized target/decoy label '{value}' at row {row}")]
    InvalidTargetLabel { value: String, row: usize },

    #[error("Invalid number '{value}' in column '{column}' at row {row}")]
    InvalidNumber {
        column: String,
        value: String,
        row: usize,
    },

    #[error("Found {0} NaN values in scores array")]
    NaNFound(usize),

    #[error("Scores and target arrays must have equal length ({scores} != {targets})")]
    LengthMismatch { scores: usize, targets: usize },

    #[error("Row {row} has {found} fields, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("No PSMs were found below the 'eval_fdr' {0}")]
    NoPassingScores(f64),
}

pub type Result<T> = std::result::Result<T, ConfidenceError>;
