use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Capability contract shared by the model kinds.
///
/// `x` holds one encoded feature row per sample (see
/// [`crate::model::FeatureSchema`]), `y` the usage minutes.
pub trait Regressor {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()>;

    fn predict(&self, x: ArrayView1<f64>) -> f64;

    /// Relative importance per input column, or `None` when the model kind
    /// does not expose it.
    fn feature_importances(&self) -> Option<Vec<f64>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    DecisionTree,
    RandomForest,
    LinearRegression,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::DecisionTree => "decision_tree",
            ModelKind::RandomForest => "random_forest",
            ModelKind::LinearRegression => "linear_regression",
        }
    }
}

impl std::str::FromStr for ModelKind {
    type Err = crate::error::RoastError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "decision_tree" => Ok(ModelKind::DecisionTree),
            "random_forest" => Ok(ModelKind::RandomForest),
            "linear_regression" => Ok(ModelKind::LinearRegression),
            other => Err(crate::error::RoastError::InvalidConfig(format!(
                "unknown model kind {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mean of `values`, zero when empty.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
