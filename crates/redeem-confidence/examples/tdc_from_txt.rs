use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

use redeem_confidence::config::{load_confidence_config, PairingStrategy};
use redeem_confidence::confidence::{assign_confidence, Level};
use redeem_confidence::dataset::DatasetColumns;
use redeem_confidence::io::txt::{read_psms, to_txt};
use redeem_confidence::pairing::PairingColumns;
use redeem_confidence::ConfidenceConfig;

/// Usage: tdc_from_txt <psms.txt> <output_dir> [config.json]
fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        anyhow::bail!("Usage: {} <psms.txt> <output_dir> [config.json]", args[0]);
    }
    let psm_path = PathBuf::from(&args[1]);
    let output_dir = PathBuf::from(&args[2]);
    let config = match args.get(3) {
        Some(path) => load_confidence_config(path)?,
        None => ConfidenceConfig::default(),
    };

    let mut rng = StdRng::seed_from_u64(config.seed);
    let columns = DatasetColumns::default().with_scores(["xcorr score", "exact p-value"]);
    let pairing_columns = PairingColumns::default();
    let pairing = if config.peptide_fdr_type.needs_pairing() {
        Some((&pairing_columns, PairingStrategy::Mass))
    } else {
        None
    };
    let dataset = read_psms(&[psm_path], columns, b'\t', pairing, &mut rng)?;

    let result = assign_confidence(&dataset, &config, &mut rng)
        .context("Failed to assign confidence estimates")?;
    for level in result.levels() {
        if let Some(table) = result.get(level) {
            println!(
                "{}: {} of {} at q<={}",
                level.label(),
                table.num_passing(config.eval_fdr),
                table.len(),
                config.eval_fdr
            );
        }
    }
    if let Some(psms) = result.get(Level::Psms) {
        if let Some(pi_zero) = psms.pi_zero {
            println!("pi_zero: {:.4}", pi_zero);
        }
    }

    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    let written = to_txt(&result, &output_dir, Some("redeem"), b'\t', true)?;
    for path in written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
