//! Seeded train/test partitioning.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::{ProcessingError, Result};

/// Row indices of a train/test partition, each sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    pub stratified: bool,
}

/// Number of held-out rows: `ceil(test_size * n)`.
pub fn test_count(n: usize, test_size: f64) -> Result<usize> {
    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(ProcessingError::DataSplit(format!(
            "test_size {test_size} on {n} rows leaves {n_test} test and {} train rows; both need at least one",
            n.saturating_sub(n_test)
        )));
    }
    Ok(n_test)
}

/// Shuffle every row with a seeded ChaCha8 permutation; the first `n_test`
/// go to test.
pub fn random_split(n: usize, test_size: f64, seed: u64) -> Result<Split> {
    let n_test = test_count(n, test_size)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut rng);

    let mut test = order[..n_test].to_vec();
    let mut train = order[n_test..].to_vec();
    test.sort_unstable();
    train.sort_unstable();

    Ok(Split {
        train,
        test,
        stratified: false,
    })
}

/// Partition preserving label proportions.
///
/// Each class contributes its proportional share of the test set, rounded
/// with the largest-remainder method. Fails if any class has fewer than two
/// members or a partition would be too small to hold every class.
pub fn stratified_split(labels: &[f64], test_size: f64, seed: u64) -> Result<Split> {
    let n = labels.len();
    let n_test = test_count(n, test_size)?;

    let mut groups: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        groups.entry(label.to_bits()).or_default().push(i);
    }
    let mut groups: Vec<Vec<usize>> = groups.into_values().collect();
    // Classes in order of first occurrence.
    groups.sort_by_key(|members| members[0]);

    let n_classes = groups.len();
    if groups.iter().any(|members| members.len() < 2) {
        return Err(ProcessingError::DataSplit(
            "the least populated class has only 1 member; stratification needs at least 2"
                .to_string(),
        ));
    }
    if n_test < n_classes || n - n_test < n_classes {
        return Err(ProcessingError::DataSplit(format!(
            "{n_test} test and {} train rows cannot hold all {n_classes} classes",
            n - n_test
        )));
    }

    let allocation = allocate(&groups, n_test, n);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (members, take) in groups.iter().zip(allocation) {
        let mut members = members.clone();
        members.shuffle(&mut rng);
        test.extend_from_slice(&members[..take]);
        train.extend_from_slice(&members[take..]);
    }
    test.sort_unstable();
    train.sort_unstable();

    Ok(Split {
        train,
        test,
        stratified: true,
    })
}

/// Largest-remainder allocation of `n_test` across classes, keeping at least
/// one test and one train row per class.
fn allocate(groups: &[Vec<usize>], n_test: usize, n: usize) -> Vec<usize> {
    let shares: Vec<f64> = groups
        .iter()
        .map(|g| g.len() as f64 * n_test as f64 / n as f64)
        .collect();
    let mut take: Vec<usize> = shares
        .iter()
        .zip(groups)
        .map(|(share, g)| (share.floor() as usize).clamp(1, g.len() - 1))
        .collect();

    let mut by_remainder: Vec<usize> = (0..groups.len()).collect();
    by_remainder.sort_by(|&a, &b| {
        let ra = shares[a] - shares[a].floor();
        let rb = shares[b] - shares[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });

    let mut assigned: usize = take.iter().sum();
    while assigned < n_test {
        let mut progressed = false;
        for &class in &by_remainder {
            if assigned == n_test {
                break;
            }
            if take[class] < groups[class].len() - 1 {
                take[class] += 1;
                assigned += 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    while assigned > n_test {
        let mut progressed = false;
        for &class in by_remainder.iter().rev() {
            if assigned == n_test {
                break;
            }
            if take[class] > 1 {
                take[class] -= 1;
                assigned -= 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    take
}

/// Try a stratified split and fall back to a plain seeded split.
pub fn split_with_fallback(
    labels: &[f64],
    test_size: f64,
    seed: u64,
    stratify: bool,
) -> Result<Split> {
    if stratify {
        match stratified_split(labels, test_size, seed) {
            Ok(split) => {
                debug!(
                    "Stratified split: {} train / {} test",
                    split.train.len(),
                    split.test.len()
                );
                return Ok(split);
            }
            Err(e) => {
                warn!("Stratified split not possible ({}), using random split", e);
            }
        }
    }
    random_split(labels.len(), test_size, seed)
}
