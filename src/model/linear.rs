use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RoastError};
use crate::model::regressor::Regressor;
use crate::model::tree::validate_training_input;

/// Ridge penalty keeping the normal equations solvable; one-hot blocks are
/// collinear with the intercept.
const RIDGE_LAMBDA: f64 = 1e-3;

/// Least-squares baseline. Does not expose feature importances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressor {
    intercept: f64,
    coefficients: Array1<f64>,
}

impl LinearRegressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn coefficients(&self) -> ArrayView1<'_, f64> {
        self.coefficients.view()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Regressor for LinearRegressor {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        validate_training_input(x, y)?;
        let singular =
            || RoastError::InvalidConfig("linear regression system is singular".to_string());

        let x_means = x.mean_axis(Axis(0)).ok_or_else(singular)?;
        let y_mean = y.mean().ok_or_else(singular)?;
        let centered = &x - &x_means;
        let target = y.mapv(|v| v - y_mean);

        // Normal equations on centered data: (XᵀX + λI) w = Xᵀy
        let gram = centered.t().dot(&centered) + Array2::<f64>::eye(x.ncols()) * RIDGE_LAMBDA;
        let rhs = centered.t().dot(&target);

        let coefficients = solve(gram, rhs).ok_or_else(singular)?;
        self.intercept = y_mean - coefficients.dot(&x_means);
        self.coefficients = coefficients;
        Ok(())
    }

    fn predict(&self, x: ArrayView1<f64>) -> f64 {
        if x.len() != self.coefficients.len() {
            return self.intercept;
        }
        self.intercept + self.coefficients.dot(&x)
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        None
    }
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() < 1e-12 {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }

        let pivot_row = a.row(col).to_owned();
        for row in col + 1..n {
            let factor = a[[row, col]] / pivot_row[col];
            if factor == 0.0 {
                continue;
            }
            a.row_mut(row).scaled_add(-factor, &pivot_row);
            b[row] -= factor * b[col];
        }
    }

    let mut solution = Array1::zeros(n);
    for row in (0..n).rev() {
        let tail = a.row(row).slice(s![row + 1..]).dot(&solution.slice(s![row + 1..]));
        solution[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(solution)
}
