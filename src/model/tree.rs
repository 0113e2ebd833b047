//! CART regression tree splitting on variance reduction.

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RoastError};
use crate::model::regressor::{mean, Regressor};

/// Gains below this are treated as no improvement.
const MIN_GAIN: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    /// `None` grows until the leaf size limits stop it.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: Some(10),
            min_samples_split: 5,
            min_samples_leaf: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Node {
    Leaf {
        value: f64,
        samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        samples: usize,
    },
}

/// Best split found for one node.
struct Candidate {
    feature: usize,
    threshold: f64,
    error: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    params: TreeParams,
    nodes: Vec<Node>,
    n_features: usize,
    /// Unnormalized squared-error reduction per feature.
    impurity_decrease: Vec<f64>,
}

impl DecisionTreeRegressor {
    pub fn new(params: TreeParams) -> Self {
        Self {
            params,
            nodes: Vec::new(),
            n_features: 0,
            impurity_decrease: Vec::new(),
        }
    }

    pub fn params(&self) -> TreeParams {
        self.params
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    /// Fits on the rows at `indices`; duplicates act as sample weights,
    /// which is how the forest passes bootstrap samples.
    pub fn fit_indices(
        &mut self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        indices: Vec<usize>,
    ) -> Result<()> {
        validate_training_input(x, y)?;
        if indices.is_empty() {
            return Err(RoastError::InsufficientData {
                stage: "tree fitting",
                required: 1,
                available: 0,
            });
        }

        self.n_features = x.ncols();
        self.nodes.clear();
        self.impurity_decrease = vec![0.0; self.n_features];
        self.build(x, y, indices, 0);
        Ok(())
    }

    fn build(
        &mut self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        indices: Vec<usize>,
        depth: usize,
    ) -> usize {
        let values: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
        let value = mean(&values);
        let samples = indices.len();
        let error = sum_squared_error(&values, value);

        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { value, samples });

        let depth_exhausted = self.params.max_depth.is_some_and(|max| depth >= max);
        if samples < self.params.min_samples_split || depth_exhausted || error <= MIN_GAIN {
            return id;
        }

        let Some(best) = self.best_split(x, y, &indices) else {
            return id;
        };
        let gain = error - best.error;
        if gain <= MIN_GAIN {
            return id;
        }
        self.impurity_decrease[best.feature] += gain;

        let left = self.build(x, y, best.left, depth + 1);
        let right = self.build(x, y, best.right, depth + 1);
        self.nodes[id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
            samples,
        };
        id
    }

    fn best_split(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        indices: &[usize],
    ) -> Option<Candidate> {
        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();

        let mut best: Option<(usize, f64, f64)> = None;
        let mut sorted = indices.to_vec();

        for feature in 0..self.n_features {
            let column = x.column(feature);
            sorted.sort_by(|&a, &b| column[a].total_cmp(&column[b]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for k in 1..n {
                let prev = sorted[k - 1];
                left_sum += y[prev];
                left_sq += y[prev] * y[prev];

                let current = column[sorted[k]];
                let previous = column[prev];
                if current == previous || k < min_leaf || n - k < min_leaf {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let left_err = left_sq - left_sum * left_sum / k as f64;
                let right_err = right_sq - right_sum * right_sum / (n - k) as f64;
                let error = (left_err + right_err).max(0.0);

                if best.map_or(true, |(_, _, best_err)| error < best_err - MIN_GAIN) {
                    best = Some((feature, (previous + current) / 2.0, error));
                }
            }
        }

        let (feature, threshold, error) = best?;
        let (left, right) = indices
            .iter()
            .partition(|&&i| x[[i, feature]] <= threshold);
        Some(Candidate {
            feature,
            threshold,
            error,
            left,
            right,
        })
    }

    /// Importances normalized to sum to one; all zeros for a single leaf.
    pub fn normalized_importances(&self) -> Vec<f64> {
        let total: f64 = self.impurity_decrease.iter().sum();
        if total <= 0.0 {
            return vec![0.0; self.n_features];
        }
        self.impurity_decrease.iter().map(|v| v / total).collect()
    }
}

impl Regressor for DecisionTreeRegressor {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        self.fit_indices(x, y, (0..y.len()).collect())
    }

    fn predict(&self, x: ArrayView1<f64>) -> f64 {
        let mut id = 0;
        loop {
            match self.nodes.get(id) {
                None => return 0.0,
                Some(Node::Leaf { value, .. }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                }) => {
                    let value = x.get(*feature).copied().unwrap_or(0.0);
                    id = if value <= *threshold { *left } else { *right };
                }
            }
        }
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        Some(self.normalized_importances())
    }
}

fn sum_squared_error(values: &[f64], mean: f64) -> f64 {
    values.iter().map(|v| (v - mean) * (v - mean)).sum()
}

/// Shared shape checks for all regressors.
pub(crate) fn validate_training_input(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
    if x.nrows() == 0 || y.is_empty() {
        return Err(RoastError::InsufficientData {
            stage: "model fitting",
            required: 1,
            available: 0,
        });
    }
    if x.nrows() != y.len() {
        return Err(RoastError::InvalidConfig(format!(
            "feature rows ({}) and targets ({}) differ in length",
            x.nrows(),
            y.len()
        )));
    }
    Ok(())
}
