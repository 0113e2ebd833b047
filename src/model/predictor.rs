use std::fs;
use std::path::Path;

use anyhow::Context;
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::data::models::{Dataset, UsageRecord};
use crate::error::{Result, RoastError};
use crate::model::encoding::{FeatureRow, FeatureSchema};
use crate::model::forest::RandomForestRegressor;
use crate::model::linear::LinearRegressor;
use crate::model::regressor::{ModelKind, Regressor};
use crate::model::split::{train_test_split, DataSplit};
use crate::model::tree::{DecisionTreeRegressor, TreeParams};
use crate::{log_info, log_warn};

const ENABLE_LOGS: bool = true;

/// Fewest training rows a model is fit on.
pub const MIN_TRAINING_ROWS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub model_kind: ModelKind,
    /// Fraction of rows held out for testing, strictly between 0 and 1.
    pub test_size: f64,
    /// `None` lets trees grow until the leaf limits stop them.
    pub max_depth: Option<usize>,
    pub random_seed: u64,
    /// Only used by the random forest.
    pub n_estimators: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model_kind: ModelKind::DecisionTree,
            test_size: 0.2,
            max_depth: Some(10),
            random_seed: 42,
            n_estimators: 100,
            min_samples_split: 5,
            min_samples_leaf: 2,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(RoastError::InvalidConfig(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.max_depth == Some(0) {
            return Err(RoastError::InvalidConfig(
                "max_depth must be positive or unbounded".to_string(),
            ));
        }
        if self.model_kind == ModelKind::RandomForest && self.n_estimators == 0 {
            return Err(RoastError::InvalidConfig(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(RoastError::InvalidConfig(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(RoastError::InvalidConfig(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }

    fn new_regressor(&self) -> FittedRegressor {
        match self.model_kind {
            ModelKind::DecisionTree => {
                FittedRegressor::DecisionTree(DecisionTreeRegressor::new(self.tree_params()))
            }
            ModelKind::RandomForest => FittedRegressor::RandomForest(RandomForestRegressor::new(
                self.n_estimators,
                self.tree_params(),
                self.random_seed,
            )),
            ModelKind::LinearRegression => FittedRegressor::Linear(LinearRegressor::new()),
        }
    }
}

/// The concrete regressor behind a [`TrainedModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedRegressor {
    DecisionTree(DecisionTreeRegressor),
    RandomForest(RandomForestRegressor),
    Linear(LinearRegressor),
}

impl FittedRegressor {
    fn inner(&self) -> &dyn Regressor {
        match self {
            FittedRegressor::DecisionTree(model) => model,
            FittedRegressor::RandomForest(model) => model,
            FittedRegressor::Linear(model) => model,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Regressor {
        match self {
            FittedRegressor::DecisionTree(model) => model,
            FittedRegressor::RandomForest(model) => model,
            FittedRegressor::Linear(model) => model,
        }
    }
}

impl Regressor for FittedRegressor {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: ArrayView1<f64>) -> f64 {
        self.inner().predict(x)
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        self.inner().feature_importances()
    }
}

/// A fitted regressor together with the schema it was fit through and
/// the split that produced it. Read-only after training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    config: TrainingConfig,
    schema: FeatureSchema,
    regressor: FittedRegressor,
    /// Indices into the dataset passed to [`train`].
    split: DataSplit,
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        self.config.model_kind
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn regressor(&self) -> &FittedRegressor {
        &self.regressor
    }

    pub fn split(&self) -> &DataSplit {
        &self.split
    }

    /// The held-out rows of the dataset this model was trained on.
    pub fn test_partition(&self, dataset: &Dataset) -> Dataset {
        dataset.subset(&self.split.test)
    }

    pub fn predict_raw(&self, features: &FeatureRow) -> f64 {
        self.regressor.predict(self.schema.encode(features).view())
    }

    /// Predicted whole minutes, never negative.
    pub fn predict(&self, features: &FeatureRow) -> u32 {
        let raw = self.predict_raw(features);
        if raw.is_finite() {
            raw.round().clamp(0.0, u32::MAX as f64) as u32
        } else {
            0
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write model to {}", path.display()))
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read model from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse model from {}", path.display()))
    }
}

/// Splits the rows that carry a usage value, then fits on the train part.
pub fn train(dataset: &Dataset, config: &TrainingConfig) -> Result<TrainedModel> {
    config.validate()?;

    let usable = labelled_indices(dataset);
    if usable.len() < dataset.len() {
        log_warn!(
            "[predictor] skipping {} row(s) without usage minutes",
            dataset.len() - usable.len()
        );
    }

    let positions = train_test_split(usable.len(), config.test_size, config.random_seed);
    let split = DataSplit {
        train: positions.train.iter().map(|&p| usable[p]).collect(),
        test: positions.test.iter().map(|&p| usable[p]).collect(),
    };
    if split.test.is_empty() {
        return Err(RoastError::InsufficientData {
            stage: "test partition",
            required: 1,
            available: 0,
        });
    }

    let model = fit_rows(dataset, split, config)?;
    log_info!(
        "[predictor] trained {} on {} rows ({} held out, {} features)",
        config.model_kind,
        model.split.train.len(),
        model.split.test.len(),
        model.schema.len()
    );
    Ok(model)
}

/// Fits a model on `split.train`; shared by [`train`] and cross-validation.
pub(crate) fn fit_rows(
    dataset: &Dataset,
    split: DataSplit,
    config: &TrainingConfig,
) -> Result<TrainedModel> {
    let records = dataset.records();
    let rows: Vec<(FeatureRow, f64)> = split
        .train
        .iter()
        .filter_map(|&i| records.get(i))
        .filter_map(|record| Some((FeatureRow::from(record), f64::from(record.usage_minutes?))))
        .collect();

    if rows.len() < MIN_TRAINING_ROWS {
        return Err(RoastError::InsufficientData {
            stage: "training",
            required: MIN_TRAINING_ROWS,
            available: rows.len(),
        });
    }

    let schema = FeatureSchema::fit(rows.iter().map(|(features, _)| features));
    let x = schema.encode_rows(rows.iter().map(|(features, _)| features));
    let y: Array1<f64> = rows.iter().map(|(_, target)| *target).collect();

    let mut regressor = config.new_regressor();
    regressor.fit(x.view(), y.view())?;

    Ok(TrainedModel {
        config: config.clone(),
        schema,
        regressor,
        split,
    })
}

/// Positions of the records that have a usage value.
pub(crate) fn labelled_indices(dataset: &Dataset) -> Vec<usize> {
    dataset
        .iter()
        .enumerate()
        .filter(|(_, record)| record.usage_minutes.is_some())
        .map(|(i, _)| i)
        .collect()
}

/// Convenience for predicting a record's own features.
pub fn predict_record(model: &TrainedModel, record: &UsageRecord) -> u32 {
    model.predict(&FeatureRow::from(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::{DayOfWeek, Intensity};
    use chrono::NaiveDate;

    fn record(user: u32, app: &str, minutes: u32, intensity: Intensity, day: u32) -> UsageRecord {
        UsageRecord {
            user_id: format!("u{user}"),
            app_name: app.to_string(),
            usage_minutes: Some(minutes),
            roast_intensity: intensity,
            roast_category: "social_life".to_string(),
            secondary_category: None,
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            day_of_week: None,
            usage_category: None,
        }
    }

    fn dataset(n: u32) -> Dataset {
        (0..n)
            .map(|i| {
                let (app, minutes) = if i % 2 == 0 { ("Instagram", 210) } else { ("LinkedIn", 30) };
                let intensity = Intensity::ALL[(i % 3) as usize];
                record(i, app, minutes + i % 5, intensity, 1 + i % 28)
            })
            .collect()
    }

    #[test]
    fn training_is_deterministic_per_seed() {
        let data = dataset(40);
        let config = TrainingConfig::default();

        let a = train(&data, &config).unwrap();
        let b = train(&data, &config).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.split().test.len(), 8);
        assert_eq!(a.split().train.len(), 32);
    }

    #[test]
    fn predictions_follow_the_app() {
        let data = dataset(40);
        for kind in [ModelKind::DecisionTree, ModelKind::RandomForest, ModelKind::LinearRegression] {
            let config = TrainingConfig {
                model_kind: kind,
                n_estimators: 10,
                ..TrainingConfig::default()
            };
            let model = train(&data, &config).unwrap();

            let instagram = model.predict(&FeatureRow::new("Instagram", Intensity::Brutal, DayOfWeek::Sunday));
            let linkedin = model.predict(&FeatureRow::new("LinkedIn", Intensity::Brutal, DayOfWeek::Sunday));
            assert!(instagram > linkedin, "{kind}: {instagram} <= {linkedin}");
        }
    }

    #[test]
    fn unseen_app_still_predicts() {
        let model = train(&dataset(30), &TrainingConfig::default()).unwrap();
        let row = FeatureRow::new("UnknownApp123", Intensity::Medium, DayOfWeek::Monday);

        assert!(!model.schema().covers(&row));
        assert!(model.predict_raw(&row).is_finite());
    }

    #[test]
    fn too_few_rows_is_insufficient() {
        let err = train(&dataset(8), &TrainingConfig::default()).unwrap_err();
        assert!(matches!(err, RoastError::InsufficientData { .. }));
    }

    #[test]
    fn rows_without_usage_are_not_trained_on() {
        let mut records = dataset(30).into_records();
        records[0].usage_minutes = None;
        let data = Dataset::new(records);

        let model = train(&data, &TrainingConfig::default()).unwrap();
        let used: Vec<_> = model.split().train.iter().chain(&model.split().test).collect();
        assert_eq!(used.len(), 29);
        assert!(!used.contains(&&0));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = TrainingConfig {
            test_size: 1.0,
            ..TrainingConfig::default()
        };
        assert!(matches!(
            train(&dataset(30), &config),
            Err(RoastError::InvalidConfig(_))
        ));

        let config = TrainingConfig {
            max_depth: Some(0),
            ..TrainingConfig::default()
        };
        assert!(matches!(config.validate(), Err(RoastError::InvalidConfig(_))));
    }

    #[test]
    fn model_round_trips_through_json() {
        let model = train(&dataset(30), &TrainingConfig::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        model.save(&path).unwrap();
        let loaded = TrainedModel::load(&path).unwrap();

        let row = FeatureRow::new("Instagram", Intensity::Light, DayOfWeek::Friday);
        assert_eq!(loaded.predict(&row), model.predict(&row));
    }
}
