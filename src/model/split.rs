use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Row indices of the train and test partitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Row indices `0..n` shuffled by a generator seeded with `seed`.
pub fn shuffled_indices(n: usize, seed: u64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    indices
}

/// Shuffles `0..n` and holds out `ceil(n * test_size)` rows for testing.
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> DataSplit {
    let indices = shuffled_indices(n, seed);
    // Epsilon keeps 20 * 0.2 at 4 rows despite float noise.
    let test_len = ((n as f64) * test_size - 1e-9).ceil().max(0.0) as usize;
    let test_len = test_len.min(n);

    DataSplit {
        test: indices[..test_len].to_vec(),
        train: indices[test_len..].to_vec(),
    }
}

/// Cuts the shuffled rows into `folds` contiguous chunks; the first
/// `n % folds` chunks get one extra row.
pub fn k_fold(n: usize, folds: usize, seed: u64) -> Vec<DataSplit> {
    let indices = shuffled_indices(n, seed);
    let base = n / folds;
    let extra = n % folds;

    let mut splits = Vec::with_capacity(folds);
    let mut start = 0;
    for fold in 0..folds {
        let len = base + usize::from(fold < extra);
        let end = start + len;
        let test = indices[start..end].to_vec();
        let train = indices[..start]
            .iter()
            .chain(&indices[end..])
            .copied()
            .collect();
        splits.push(DataSplit { train, test });
        start = end;
    }
    splits
}
