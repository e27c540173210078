//! redeem-confidence: false discovery rate estimation for peptide-spectrum matches.
//!
//! This crate assigns q-values to PSMs, peptides and proteins using
//! target-decoy competition, with mix-max as an alternative estimator at the
//! PSM level. Peptide-level competition can group each target with its paired
//! decoy, and [`pairing`] builds that pairing from search results.
//!
//! The engine works on an in-memory [`dataset::PsmDataset`]; [`io::txt`] reads
//! and writes delimited text for the common search-engine layouts.
pub mod competition;
pub mod confidence;
pub mod config;
pub mod dataset;
pub mod error;
pub mod io;
pub mod pairing;
pub mod stats;
pub mod table;

pub use confidence::{
    assign_confidence, assign_confidence_seeded, ConfidenceResult, ConfidenceTable, Level,
};
pub use config::{ConfidenceConfig, Method, PairingStrategy, PeptideFdrType, ProteinAggregation};
pub use dataset::{DatasetColumns, PsmDataset};
pub use error::ConfidenceError;
