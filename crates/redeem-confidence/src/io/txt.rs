//! Delimited text reader and writer.
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::Rng;

use crate::config::PairingStrategy;
use crate::confidence::{ConfidenceResult, ConfidenceTable};
use crate::dataset::{DatasetColumns, PsmDataset};
use crate::pairing::{build_pairing, PairingColumns};
use crate::table::Table;

/// Read one or more delimited files into a single table.
///
/// Every file must carry the columns of the first one; columns are matched
/// by name, so their order may differ between files.
pub fn read_txt<P: AsRef<Path>>(paths: &[P], delimiter: u8) -> Result<Table> {
    let mut table = Table::default();
    for path in paths {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_path(path)
            .with_context(|| format!("Failed to open PSM file: {}", path.display()))?;

        let headers: Vec<String> = reader
            .headers()
            .with_context(|| format!("Failed to read header row of {}", path.display()))?
            .iter()
            .map(|header| header.trim().to_string())
            .collect();

        let mut records = Vec::new();
        for (row_idx, result) in reader.records().enumerate() {
            let record = result.with_context(|| {
                format!("Failed to read row {} of {}", row_idx + 1, path.display())
            })?;
            records.push(record.iter().map(str::to_string).collect());
        }

        let file_table = Table::new(headers, records)
            .with_context(|| format!("Malformed PSM file: {}", path.display()))?;
        log::debug!("Read {} rows from {}", file_table.len(), path.display());
        table
            .extend(file_table)
            .with_context(|| format!("Columns of {} do not match", path.display()))?;
    }
    Ok(table)
}

/// Read delimited PSM files into a dataset.
///
/// When `pairing` is given, a target/decoy peptide pairing is built from the
/// same rows and attached to the dataset.
pub fn read_psms<P: AsRef<Path>, R: Rng + ?Sized>(
    paths: &[P],
    columns: DatasetColumns,
    delimiter: u8,
    pairing: Option<(&PairingColumns, PairingStrategy)>,
    rng: &mut R,
) -> Result<PsmDataset> {
    let table = read_txt(paths, delimiter)?;
    let mut dataset =
        PsmDataset::from_table(&table, columns).context("Failed to build PSM dataset")?;
    if let Some((pairing_columns, strategy)) = pairing {
        let peptide_pairing = build_pairing(&table, pairing_columns, strategy, rng)
            .context("Failed to build peptide pairing")?;
        dataset.add_peptide_pairing(peptide_pairing);
    }
    dataset.log_input_data_summary();
    Ok(dataset)
}

/// Save confidence estimates to delimited text files.
///
/// Writes `{file_root.}confidence.{level}.txt` per level into `output_dir`,
/// plus `{file_root.}confidence.decoy.{level}.txt` when `decoys` is set and
/// the method produced decoy estimates.
///
/// # Returns
///
/// The paths of the written files, targets before decoys, in level order.
pub fn to_txt(
    result: &ConfidenceResult,
    output_dir: impl AsRef<Path>,
    file_root: Option<&str>,
    delimiter: u8,
    decoys: bool,
) -> Result<Vec<PathBuf>> {
    let output_dir = output_dir.as_ref();
    let prefix = match file_root {
        Some(root) => format!("{}.", root),
        None => String::new(),
    };

    let mut paths = Vec::new();
    for (level, table) in result.confidence_estimates() {
        let path = output_dir.join(format!("{}confidence.{}.txt", prefix, level));
        write_table(table, &path, delimiter)?;
        paths.push(path);
    }
    if decoys {
        for (level, table) in result.decoy_confidence_estimates() {
            let path = output_dir.join(format!("{}confidence.decoy.{}.txt", prefix, level));
            write_table(table, &path, delimiter)?;
            paths.push(path);
        }
    }
    Ok(paths)
}

fn write_table(table: &ConfidenceTable, path: &Path, delimiter: u8) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(file);

    writer
        .write_record(table.headers())
        .with_context(|| format!("Failed to write header to {}", path.display()))?;
    for row in &table.rows {
        let mut record = row.keys.clone();
        record.push(row.score.to_string());
        record.push(row.q_value.to_string());
        writer
            .write_record(&record)
            .with_context(|| format!("Failed to write row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    log::info!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}
