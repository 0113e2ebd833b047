use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::models::Dataset;
use crate::error::{Result, RoastError};
use crate::model::encoding::FeatureRow;
use crate::model::predictor::{fit_rows, labelled_indices, TrainedModel, TrainingConfig};
use crate::model::regressor::{mean, Regressor};
use crate::model::split::{k_fold, DataSplit};
use crate::log_info;

const ENABLE_LOGS: bool = true;

/// Thresholds, in minutes, for the "within N minutes" accuracy figures.
const ACCURACY_WINDOWS: [f64; 3] = [10.0, 30.0, 60.0];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub metrics: Metrics,
    pub mse: f64,
    /// Fraction of predictions within 10 minutes of the actual value.
    pub within_10: f64,
    pub within_30: f64,
    pub within_60: f64,
    pub mean_actual: f64,
    pub mean_predicted: f64,
    pub samples: usize,
}

/// Aggregate over the folds of [`cross_validate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CvSummary {
    pub folds: usize,
    pub mean_r2: f64,
    pub std_r2: f64,
    pub mean_mae: f64,
}

impl CvSummary {
    pub fn from_folds(folds: &[Metrics]) -> Self {
        let r2: Vec<f64> = folds.iter().map(|m| m.r2).collect();
        let mae: Vec<f64> = folds.iter().map(|m| m.mae).collect();
        let mean_r2 = mean(&r2);
        let variance = mean(&r2.iter().map(|v| (v - mean_r2).powi(2)).collect::<Vec<_>>());

        Self {
            folds: folds.len(),
            mean_r2,
            std_r2: variance.sqrt(),
            mean_mae: mean(&mae),
        }
    }
}

/// MAE, RMSE and R² of `predicted` against `actual`.
///
/// With a constant target R² is 1 for a perfect fit and 0 otherwise.
pub fn regression_metrics(actual: &[f64], predicted: &[f64]) -> Metrics {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return Metrics {
            mae: 0.0,
            rmse: 0.0,
            r2: 0.0,
        };
    }

    let residuals: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();
    let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / n as f64;
    let ss_res: f64 = residuals.iter().map(|r| r * r).sum();
    let actual_mean = mean(&actual[..n]);
    let ss_tot: f64 = actual[..n].iter().map(|a| (a - actual_mean).powi(2)).sum();

    let r2 = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    };

    Metrics {
        mae,
        rmse: (ss_res / n as f64).sqrt(),
        r2,
    }
}

/// Actual and raw predicted minutes for every labelled row.
fn predictions(model: &TrainedModel, dataset: &Dataset) -> (Vec<f64>, Vec<f64>) {
    dataset
        .iter()
        .filter_map(|record| {
            let actual = f64::from(record.usage_minutes?);
            Some((actual, model.predict_raw(&FeatureRow::from(record))))
        })
        .unzip()
}

pub fn evaluate(model: &TrainedModel, test: &Dataset) -> Result<Metrics> {
    let (actual, predicted) = predictions(model, test);
    if actual.is_empty() {
        return Err(RoastError::InsufficientData {
            stage: "evaluation",
            required: 1,
            available: 0,
        });
    }
    Ok(regression_metrics(&actual, &predicted))
}

pub fn evaluate_detailed(model: &TrainedModel, test: &Dataset) -> Result<EvaluationReport> {
    let (actual, predicted) = predictions(model, test);
    if actual.is_empty() {
        return Err(RoastError::InsufficientData {
            stage: "evaluation",
            required: 1,
            available: 0,
        });
    }

    let metrics = regression_metrics(&actual, &predicted);
    let errors: Vec<f64> = actual
        .iter()
        .zip(&predicted)
        .map(|(a, p)| (a - p).abs())
        .collect();
    let within = |limit: f64| {
        errors.iter().filter(|e| **e <= limit).count() as f64 / errors.len() as f64
    };
    let [w10, w30, w60] = ACCURACY_WINDOWS.map(within);

    let report = EvaluationReport {
        metrics,
        mse: metrics.rmse * metrics.rmse,
        within_10: w10,
        within_30: w30,
        within_60: w60,
        mean_actual: mean(&actual),
        mean_predicted: mean(&predicted),
        samples: actual.len(),
    };
    log_info!(
        "[evaluator] mae={:.2} rmse={:.2} r2={:.3} on {} rows",
        metrics.mae,
        metrics.rmse,
        metrics.r2,
        report.samples
    );
    Ok(report)
}

/// K-fold cross-validation over the labelled rows of `dataset`.
pub fn cross_validate(
    dataset: &Dataset,
    config: &TrainingConfig,
    folds: usize,
) -> Result<Vec<Metrics>> {
    config.validate()?;
    if folds < 2 {
        return Err(RoastError::InvalidConfig(format!(
            "cross-validation needs at least 2 folds, got {folds}"
        )));
    }

    let usable = labelled_indices(dataset);
    if folds > usable.len() {
        return Err(RoastError::InsufficientData {
            stage: "cross-validation",
            required: folds,
            available: usable.len(),
        });
    }

    let mut scores = Vec::with_capacity(folds);
    for positions in k_fold(usable.len(), folds, config.random_seed) {
        let split = DataSplit {
            train: positions.train.iter().map(|&p| usable[p]).collect(),
            test: positions.test.iter().map(|&p| usable[p]).collect(),
        };
        let model = fit_rows(dataset, split, config)?;
        scores.push(evaluate(&model, &model.test_partition(dataset))?);
    }

    let summary = CvSummary::from_folds(&scores);
    log_info!(
        "[evaluator] {}-fold cv: r2 {:.3} +/- {:.3}, mae {:.2}",
        summary.folds,
        summary.mean_r2,
        summary.std_r2,
        summary.mean_mae
    );
    Ok(scores)
}

/// Importance per one-hot column name; empty when the model kind has none.
pub fn feature_importance(model: &TrainedModel) -> BTreeMap<String, f64> {
    let Some(importances) = model.regressor().feature_importances() else {
        return BTreeMap::new();
    };
    model
        .schema()
        .column_names()
        .into_iter()
        .zip(importances)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::{Intensity, UsageRecord};
    use crate::model::predictor::train;
    use crate::model::regressor::ModelKind;
    use chrono::NaiveDate;

    fn dataset(n: u32) -> Dataset {
        (0..n)
            .map(|i| UsageRecord {
                user_id: format!("u{i}"),
                app_name: if i % 2 == 0 { "TikTok" } else { "Reddit" }.to_string(),
                usage_minutes: Some(if i % 2 == 0 { 300 } else { 45 }),
                roast_intensity: Intensity::ALL[(i % 3) as usize],
                roast_category: "sleep".to_string(),
                secondary_category: None,
                date: NaiveDate::from_ymd_opt(2024, 5, 1 + i % 28).unwrap(),
                day_of_week: None,
                usage_category: None,
            })
            .collect()
    }

    #[test]
    fn exact_predictions_score_perfectly() {
        let actual = [30.0, 120.0, 240.0];
        let metrics = regression_metrics(&actual, &actual);

        assert_eq!(metrics.mae, 0.0);
        assert_eq!(metrics.rmse, 0.0);
        assert_eq!(metrics.r2, 1.0);
    }

    #[test]
    fn constant_target_r2_edge_cases() {
        assert_eq!(regression_metrics(&[60.0, 60.0], &[60.0, 60.0]).r2, 1.0);
        assert_eq!(regression_metrics(&[60.0, 60.0], &[50.0, 70.0]).r2, 0.0);
    }

    #[test]
    fn metrics_match_hand_computation() {
        let metrics = regression_metrics(&[10.0, 20.0, 30.0], &[12.0, 18.0, 30.0]);

        assert!((metrics.mae - 4.0 / 3.0).abs() < 1e-12);
        assert!((metrics.rmse - (8.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((metrics.r2 - (1.0 - 8.0 / 200.0)).abs() < 1e-12);
    }

    #[test]
    fn evaluate_on_a_separable_dataset() {
        let data = dataset(40);
        let model = train(&data, &TrainingConfig::default()).unwrap();

        let report = evaluate_detailed(&model, &model.test_partition(&data)).unwrap();
        assert_eq!(report.samples, 8);
        assert_eq!(report.within_10, 1.0);

        let metrics = evaluate(&model, &model.test_partition(&data)).unwrap();
        assert_eq!(metrics.mae, 0.0);
        assert_eq!(metrics.rmse, 0.0);
        assert_eq!(metrics.r2, 1.0);
    }

    #[test]
    fn empty_partition_is_insufficient() {
        let model = train(&dataset(40), &TrainingConfig::default()).unwrap();
        assert!(matches!(
            evaluate(&model, &Dataset::default()),
            Err(RoastError::InsufficientData { .. })
        ));
    }

    #[test]
    fn cross_validation_is_deterministic() {
        let data = dataset(50);
        let config = TrainingConfig::default();

        let a = cross_validate(&data, &config, 5).unwrap();
        let b = cross_validate(&data, &config, 5).unwrap();

        assert_eq!(a.len(), 5);
        assert_eq!(a, b);
    }

    #[test]
    fn cross_validation_fold_bounds() {
        let data = dataset(20);
        let config = TrainingConfig::default();

        assert!(matches!(
            cross_validate(&data, &config, 1),
            Err(RoastError::InvalidConfig(_))
        ));
        assert!(matches!(
            cross_validate(&data, &config, 21),
            Err(RoastError::InsufficientData { .. })
        ));
    }

    #[test]
    fn importances_name_schema_columns() {
        let data = dataset(40);
        let tree = train(&data, &TrainingConfig::default()).unwrap();
        let importances = feature_importance(&tree);

        assert_eq!(importances.len(), tree.schema().len());
        assert!((importances.values().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(importances["app_name=TikTok"] + importances["app_name=Reddit"] > 0.99);

        let linear = train(
            &data,
            &TrainingConfig {
                model_kind: ModelKind::LinearRegression,
                ..TrainingConfig::default()
            },
        )
        .unwrap();
        assert!(feature_importance(&linear).is_empty());
    }
}
