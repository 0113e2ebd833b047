pub mod encoding;
pub mod evaluator;
pub mod forest;
pub mod linear;
pub mod predictor;
pub mod regressor;
pub mod split;
pub mod tree;

pub use encoding::{Feature, FeatureRow, FeatureSchema, OneHotColumn};
pub use evaluator::{
    cross_validate, evaluate, evaluate_detailed, feature_importance, regression_metrics,
    CvSummary, EvaluationReport, Metrics,
};
pub use forest::RandomForestRegressor;
pub use linear::LinearRegressor;
pub use predictor::{
    predict_record, train, FittedRegressor, TrainedModel, TrainingConfig, MIN_TRAINING_ROWS,
};
pub use regressor::{ModelKind, Regressor};
pub use split::{k_fold, train_test_split, DataSplit};
pub use tree::{DecisionTreeRegressor, TreeParams};
