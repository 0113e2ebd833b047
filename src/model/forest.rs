use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RoastError};
use crate::model::regressor::{mean, Regressor};
use crate::model::tree::{validate_training_input, DecisionTreeRegressor, TreeParams};
use crate::log_debug;

const ENABLE_LOGS: bool = true;

/// Bagged ensemble of regression trees, each fit on a bootstrap sample
/// drawn from its own seed (`seed + tree index`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    n_estimators: usize,
    params: TreeParams,
    seed: u64,
    trees: Vec<DecisionTreeRegressor>,
}

impl RandomForestRegressor {
    pub fn new(n_estimators: usize, params: TreeParams, seed: u64) -> Self {
        Self {
            n_estimators,
            params,
            seed,
            trees: Vec::new(),
        }
    }

    pub fn trees(&self) -> &[DecisionTreeRegressor] {
        &self.trees
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        validate_training_input(x, y)?;
        if self.n_estimators == 0 {
            return Err(RoastError::InvalidConfig(
                "random forest needs at least one tree".to_string(),
            ));
        }

        let n = y.len();
        self.trees = (0..self.n_estimators)
            .map(|t| -> Result<DecisionTreeRegressor> {
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(t as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let mut tree = DecisionTreeRegressor::new(self.params);
                tree.fit_indices(x, y, sample)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        log_debug!(
            "[forest] fit {} trees on {} rows",
            self.trees.len(),
            n
        );
        Ok(())
    }

    fn predict(&self, x: ArrayView1<f64>) -> f64 {
        let predictions: Vec<f64> = self.trees.iter().map(|tree| tree.predict(x)).collect();
        mean(&predictions)
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        let width = self.trees.first()?.normalized_importances().len();
        let mut totals = vec![0.0; width];
        for tree in &self.trees {
            for (total, value) in totals.iter_mut().zip(tree.normalized_importances()) {
                *total += value;
            }
        }

        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        Some(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{aview1, Array1, Array2};

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| (i % (j + 2)) as f64);
        let y = x.column(0).mapv(|v| 60.0 + 120.0 * v);
        (x, y)
    }

    #[test]
    fn forest_is_deterministic_for_a_seed() {
        let (x, y) = data();
        let mut a = RandomForestRegressor::new(10, TreeParams::default(), 42);
        let mut b = RandomForestRegressor::new(10, TreeParams::default(), 42);
        a.fit(x.view(), y.view()).unwrap();
        b.fit(x.view(), y.view()).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.trees().len(), 10);
    }

    #[test]
    fn forest_averages_tree_predictions() {
        let (x, y) = data();
        let mut forest = RandomForestRegressor::new(20, TreeParams::default(), 7);
        forest.fit(x.view(), y.view()).unwrap();

        let high = forest.predict(aview1(&[1.0, 0.0]));
        let low = forest.predict(aview1(&[0.0, 0.0]));
        assert!(high > 150.0, "high = {high}");
        assert!(low < 90.0, "low = {low}");

        let importances = forest.feature_importances().unwrap();
        assert!(importances[0] > importances[1]);
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_trees_is_invalid() {
        let (x, y) = data();
        let mut forest = RandomForestRegressor::new(0, TreeParams::default(), 1);
        assert!(matches!(forest.fit(x.view(), y.view()), Err(RoastError::InvalidConfig(_))));
    }
}
