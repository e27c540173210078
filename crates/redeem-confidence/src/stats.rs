use ndarray::Array1;
use rand::Rng;

use crate::error::{ConfidenceError, Result};

/// Estimate q-values using target-decoy competition.
///
/// For a set of target and decoy PSMs meeting a specified score threshold, the
/// false discovery rate (FDR) is estimated as:
///
/// FDR = (Decoys + 1) / Targets
///
/// Adapted from: https://github.com/wfondrie/mokapot/blob/main/mokapot/qvalues.py#L28
///
/// # Arguments
///
/// * `scores` - A 1D array containing the scores to rank by.
/// * `target` - A 1D boolean array indicating if the entry is from a target (true) or decoy (false) hit.
/// * `desc` - A boolean indicating if higher scores are better (true) or if lower scores are better (false).
///
/// # Returns
///
/// A 1D array with the estimated q-value for each entry, in input order.
/// Decoys receive q-values too. Entries with equal scores always share a
/// q-value, whatever order the sort leaves them in.
pub fn tdc(scores: &Array1<f64>, target: &Array1<bool>, desc: bool) -> Result<Array1<f64>> {
    if scores.len() != target.len() {
        return Err(ConfidenceError::LengthMismatch {
            scores: scores.len(),
            targets: target.len(),
        });
    }
    let nan_count = scores.iter().filter(|s| s.is_nan()).count();
    if nan_count > 0 {
        return Err(ConfidenceError::NaNFound(nan_count));
    }
    if scores.is_empty() {
        return Ok(Array1::zeros(0));
    }

    // Best entries first.
    let mut sorted_indices = (0..scores.len()).collect::<Vec<usize>>();
    if desc {
        sorted_indices.sort_unstable_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    } else {
        sorted_indices.sort_unstable_by(|&a, &b| scores[a].total_cmp(&scores[b]));
    }

    // Split into runs of identical scores and evaluate the FDR once per run,
    // after every tied entry has been counted.
    let mut groups: Vec<(usize, usize)> = Vec::new();
    let mut fdr = Vec::new();
    let mut n_targets = 0usize;
    let mut n_decoys = 0usize;
    let mut start = 0;
    while start < sorted_indices.len() {
        let current = scores[sorted_indices[start]];
        let mut end = start;
        while end < sorted_indices.len() && scores[sorted_indices[end]] == current {
            if target[sorted_indices[end]] {
                n_targets += 1;
            } else {
                n_decoys += 1;
            }
            end += 1;
        }
        groups.push((start, end));
        fdr.push((n_decoys + 1) as f64 / n_targets.max(1) as f64);
        start = end;
    }

    let qvals = fdr_to_qvalue(&fdr);

    // Reorder q-values to match original order
    let mut final_qvals = Array1::<f64>::ones(scores.len());
    for (&(start, end), &q) in groups.iter().zip(qvals.iter()) {
        for &idx in &sorted_indices[start..end] {
            final_qvals[idx] = q;
        }
    }

    Ok(final_qvals)
}

/// Convert FDRs to q-values.
///
/// `fdr` holds one FDR per unique score, ordered best to worst. The q-value of
/// a score is the smallest FDR at that score or any worse one, capped at 1.
///
/// Adapted from: https://github.com/wfondrie/mokapot/blob/main/mokapot/qvalues.py#L148
fn fdr_to_qvalue(fdr: &[f64]) -> Vec<f64> {
    let mut min_q: f64 = 1.0;
    let mut qvals = vec![1.0; fdr.len()];
    for (idx, &curr_fdr) in fdr.iter().enumerate().rev() {
        if curr_fdr < min_q {
            min_q = curr_fdr;
        }
        qvals[idx] = min_q;
    }
    qvals
}

/// Output of [`mixmax`].
#[derive(Debug, Clone, PartialEq)]
pub struct MixmaxEstimate {
    /// Estimated proportion of incorrect target identifications.
    pub pi_zero: f64,
    /// One q-value per target score, aligned with the `target_scores` input.
    pub q_values: Array1<f64>,
}

/// Estimate target q-values with the mix-max procedure.
///
/// Keich, Kertesz-Farkas & Noble, https://pubmed.ncbi.nlm.nih.gov/26152888/
///
/// # Arguments
///
/// * `target_scores` - Target scores sorted ascending (worst to best, higher is better).
/// * `decoy_scores` - Decoy scores sorted ascending (worst to best, higher is better).
/// * `combined` - All scores with their target flag, sorted best to worst.
/// * `rng` - Random source for the bootstrap in [`estimate_pi0`].
///
/// Callers ranking by a lower-is-better score must negate scores first.
pub fn mixmax<R: Rng + ?Sized>(
    target_scores: &[f64],
    decoy_scores: &[f64],
    combined: &[(f64, bool)],
    rng: &mut R,
) -> Result<MixmaxEstimate> {
    if target_scores.is_empty() {
        return Err(ConfidenceError::NoTargets);
    }
    if decoy_scores.is_empty() {
        return Err(ConfidenceError::NoDecoys);
    }
    let nan_count = target_scores
        .iter()
        .chain(decoy_scores.iter())
        .filter(|s| s.is_nan())
        .count();
    if nan_count > 0 {
        return Err(ConfidenceError::NaNFound(nan_count));
    }
    if target_scores.len() != decoy_scores.len() {
        log::warn!(
            "The mix-max procedure is not well behaved when # targets ({}) != # of decoys ({}).",
            target_scores.len(),
            decoy_scores.len()
        );
    }

    let pvalues = empirical_pvalues(combined);
    let pi_zero = estimate_pi0(&pvalues, rng);

    let n_targets = target_scores.len();
    let n_decoys = decoy_scores.len();

    // Expected contribution of each decoy to the incorrect-target count.
    let mut suffix = vec![0.0; n_decoys + 1];
    if pi_zero < 1.0 {
        for (i, &w) in decoy_scores.iter().enumerate().rev() {
            let w_le = decoy_scores.partition_point(|&x| x <= w) as f64;
            let z_le = target_scores.partition_point(|&x| x <= w) as f64;
            let est_px_lt_zj = if z_le > 0.0 {
                ((w_le - pi_zero * z_le) / ((1.0 - pi_zero) * z_le)).clamp(0.0, 1.0)
            } else {
                1.0
            };
            suffix[i] = suffix[i + 1] + (1.0 - pi_zero) * est_px_lt_zj;
        }
    }

    let mut fdr = Vec::with_capacity(n_targets);
    for &z in target_scores {
        let first_decoy = decoy_scores.partition_point(|&x| x < z);
        let n_z_ge = n_targets - target_scores.partition_point(|&x| x < z);
        let n_w_ge = n_decoys - first_decoy;
        let value = (pi_zero * n_w_ge as f64 + suffix[first_decoy]) / n_z_ge.max(1) as f64;
        fdr.push(value.min(1.0));
    }

    // Worst to best: a target's q-value is the lowest FDR at its score or any
    // lower one. Tied targets share an FDR, so they share a q-value.
    let mut min_q = 1.0f64;
    let mut q_values = Array1::<f64>::ones(n_targets);
    for (idx, &value) in fdr.iter().enumerate() {
        min_q = min_q.min(value);
        q_values[idx] = min_q;
    }

    Ok(MixmaxEstimate { pi_zero, q_values })
}

/// Empirical p-value of every target in a best-to-worst combined ranking.
///
/// p = (decoys scoring at least as well + 1) / (decoys + 1)
pub fn empirical_pvalues(combined: &[(f64, bool)]) -> Vec<f64> {
    let n_decoys = combined.iter().filter(|(_, is_target)| !is_target).count();
    let mut pvalues = Vec::with_capacity(combined.len() - n_decoys);
    let mut decoys_seen = 0usize;
    let mut start = 0;
    while start < combined.len() {
        let current = combined[start].0;
        let mut end = start;
        while end < combined.len() && combined[end].0 == current {
            if !combined[end].1 {
                decoys_seen += 1;
            }
            end += 1;
        }
        let p = (decoys_seen + 1) as f64 / (n_decoys + 1) as f64;
        pvalues.extend(combined[start..end].iter().filter(|(_, t)| *t).map(|_| p));
        start = end;
    }
    pvalues
}

const PI0_NUM_LAMBDA: usize = 100;
const PI0_MAX_LAMBDA: f64 = 0.5;
const PI0_NUM_BOOT: usize = 100;
const PI0_MAX_BOOT_SIZE: usize = 1000;

/// Estimate the proportion of null p-values with Storey's method, picking the
/// tuning parameter lambda by bootstrap mean squared error.
///
/// Returns 1.0 when no lambda produces a positive estimate.
pub fn estimate_pi0<R: Rng + ?Sized>(pvalues: &[f64], rng: &mut R) -> f64 {
    if pvalues.is_empty() {
        return 1.0;
    }
    let mut sorted = pvalues.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));

    let pi0_at = |sorted: &[f64], lambda: f64| -> f64 {
        let n = sorted.len() as f64;
        let below = sorted.partition_point(|&p| p < lambda) as f64;
        (n - below) / (n * (1.0 - lambda))
    };

    let mut lambdas = Vec::new();
    let mut pi0s = Vec::new();
    for i in 0..PI0_NUM_LAMBDA {
        let lambda = (i + 1) as f64 / PI0_NUM_LAMBDA as f64 * PI0_MAX_LAMBDA;
        let pi0 = pi0_at(&sorted, lambda);
        if pi0 > 0.0 {
            lambdas.push(lambda);
            pi0s.push(pi0);
        }
    }
    if pi0s.is_empty() {
        log::warn!("Could not estimate pi_zero, falling back to 1.0");
        return 1.0;
    }
    let min_pi0 = pi0s.iter().copied().fold(f64::INFINITY, f64::min);

    let boot_size = sorted.len().min(PI0_MAX_BOOT_SIZE);
    let mut mse = vec![0.0; lambdas.len()];
    let mut sample = Vec::with_capacity(boot_size);
    for _ in 0..PI0_NUM_BOOT {
        sample.clear();
        sample.extend((0..boot_size).map(|_| sorted[rng.gen_range(0..sorted.len())]));
        sample.sort_unstable_by(|a, b| a.total_cmp(b));
        for (err, &lambda) in mse.iter_mut().zip(lambdas.iter()) {
            let diff = pi0_at(&sample, lambda) - min_pi0;
            *err += diff * diff;
        }
    }

    let best = mse
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    pi0s[best].clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn labelled(targets: &[f64], decoys: &[f64]) -> (Array1<f64>, Array1<bool>) {
        let scores = targets.iter().chain(decoys.iter()).copied().collect();
        let labels = targets
            .iter()
            .map(|_| true)
            .chain(decoys.iter().map(|_| false))
            .collect();
        (scores, labels)
    }

    #[test]
    fn tdc_clean_separation() {
        let (scores, labels) = labelled(&[10.0, 9.0, 8.0, 7.0], &[1.0, 2.0, 3.0, 4.0]);
        let q = tdc(&scores, &labels, true).unwrap();
        // At a threshold of 7: no decoys, four targets.
        for i in 0..4 {
            assert!((q[i] - 0.25).abs() < 1e-12, "target {} has q {}", i, q[i]);
        }
        assert!((q[7] - 0.5).abs() < 1e-12);
        assert!((q[6] - 0.75).abs() < 1e-12);
        assert_eq!(q[5], 1.0);
        assert_eq!(q[4], 1.0);
    }

    #[test]
    fn tdc_interleaved_scores_saturate() {
        let (scores, labels) = labelled(&[10.0, 8.0, 6.0, 4.0], &[9.0, 7.0, 5.0, 3.0]);
        let q = tdc(&scores, &labels, true).unwrap();
        assert!(q.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn tdc_ascending_direction() {
        let (scores, labels) = labelled(&[0.001, 0.002, 0.003], &[0.5, 0.6]);
        let q = tdc(&scores, &labels, false).unwrap();
        assert!((q[0] - 1.0 / 3.0).abs() < 1e-12);
        assert!((q[2] - 1.0 / 3.0).abs() < 1e-12);
        assert!(q[3] > q[2]);
    }

    #[test]
    fn tdc_is_monotonic_and_tie_stable() {
        let scores: Array1<f64> = (0..200).map(|i| ((i * 37) % 23) as f64).collect();
        let labels: Array1<bool> = (0..200).map(|i| i % 3 != 0).collect();
        let q = tdc(&scores, &labels, true).unwrap();

        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        for pair in order.windows(2) {
            assert!(q[pair[0]] <= q[pair[1]]);
            if scores[pair[0]] == scores[pair[1]] {
                assert_eq!(q[pair[0]], q[pair[1]]);
            }
        }
    }

    #[test]
    fn tdc_rejects_bad_input() {
        let scores = Array1::from_vec(vec![1.0, f64::NAN]);
        let labels = Array1::from_vec(vec![true, false]);
        assert!(matches!(
            tdc(&scores, &labels, true),
            Err(ConfidenceError::NaNFound(1))
        ));
        let labels = Array1::from_vec(vec![true]);
        assert!(matches!(
            tdc(&Array1::from_vec(vec![1.0, 2.0]), &labels, true),
            Err(ConfidenceError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn empirical_pvalues_count_ties() {
        let combined = vec![(5.0, true), (4.0, false), (4.0, true), (1.0, false)];
        let p = empirical_pvalues(&combined);
        assert_eq!(p, vec![1.0 / 3.0, 2.0 / 3.0]);
    }

    #[test]
    fn pi0_of_uniform_pvalues_is_near_one() {
        let pvalues: Vec<f64> = (1..=1000).map(|i| i as f64 / 1000.0).collect();
        let mut rng = StdRng::seed_from_u64(0);
        let pi0 = estimate_pi0(&pvalues, &mut rng);
        assert!(pi0 > 0.9 && pi0 <= 1.0, "pi0 = {}", pi0);
    }

    #[test]
    fn mixmax_q_values_are_monotonic() {
        let mut rng = StdRng::seed_from_u64(0);
        let targets: Vec<f64> = (0..100).map(|i| i as f64 * 0.5).collect();
        let decoys: Vec<f64> = (0..100).map(|i| i as f64 * 0.2).collect();
        let mut combined: Vec<(f64, bool)> = targets
            .iter()
            .map(|&s| (s, true))
            .chain(decoys.iter().map(|&s| (s, false)))
            .collect();
        combined.sort_by(|a, b| b.0.total_cmp(&a.0));

        let estimate = mixmax(&targets, &decoys, &combined, &mut rng).unwrap();
        assert!((0.0..=1.0).contains(&estimate.pi_zero));
        assert_eq!(estimate.q_values.len(), targets.len());
        // Ascending input: q-values never increase as scores improve.
        for pair in estimate.q_values.as_slice().unwrap().windows(2) {
            assert!(pair[1] <= pair[0]);
        }
        // Targets above every decoy are confidently identified.
        assert!(estimate.q_values[99] < 0.1);
        assert!(estimate.q_values.iter().all(|&q| (0.0..=1.0).contains(&q)));
    }

    #[test]
    fn mixmax_requires_both_classes() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            mixmax(&[], &[1.0], &[(1.0, false)], &mut rng),
            Err(ConfidenceError::NoTargets)
        ));
        assert!(matches!(
            mixmax(&[1.0], &[], &[(1.0, true)], &mut rng),
            Err(ConfidenceError::NoDecoys)
        ));
    }
}
