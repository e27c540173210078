//! Target-decoy competition: keep the best-scoring row of every group.
use std::collections::HashMap;
use std::hash::Hash;

use rand::seq::SliceRandom;
use rand::Rng;

/// Perform target-decoy competition.
///
/// Rows are shuffled, stably sorted ascending by `(score, key)`, and for every
/// distinct key the row at the winning end is retained: the last one when
/// higher scores are better (`desc`), the first one otherwise. Exact ties are
/// therefore broken by the shuffle, which is reproducible for a seeded `rng`.
///
/// # Arguments
///
/// * `rows` - Rows to compete. Left untouched.
/// * `key` - Group key of a row; one winner is returned per distinct key.
/// * `score` - Score of a row.
/// * `desc` - Are higher scores better?
/// * `rng` - Random source used for the shuffle.
///
/// # Returns
///
/// The winning rows, ordered by `(score, key)` ascending.
pub fn compete<T, K, R>(
    rows: &[T],
    key: impl Fn(&T) -> K,
    score: impl Fn(&T) -> f64,
    desc: bool,
    rng: &mut R,
) -> Vec<T>
where
    T: Clone,
    K: Ord + Hash,
    R: Rng + ?Sized,
{
    let mut keyed: Vec<(f64, K, usize)> = rows
        .iter()
        .enumerate()
        .map(|(idx, row)| (score(row), key(row), idx))
        .collect();
    keyed.shuffle(rng);
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let mut winners: HashMap<&K, usize> = HashMap::with_capacity(keyed.len());
    for (pos, (_, group, _)) in keyed.iter().enumerate() {
        if desc {
            winners.insert(group, pos);
        } else {
            winners.entry(group).or_insert(pos);
        }
    }

    let mut positions: Vec<usize> = winners.into_values().collect();
    positions.sort_unstable();

    log::trace!(
        "Competition kept {} of {} rows",
        positions.len(),
        rows.len()
    );

    positions
        .into_iter()
        .map(|pos| rows[keyed[pos].2].clone())
        .collect()
}
