use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use screen_roast_lib::data::{DataLoader, DataProcessor, DayOfWeek, Intensity};
use screen_roast_lib::model::{evaluate, train, FeatureRow, TrainedModel, TrainingConfig};
use screen_roast_lib::pipeline::{MODEL_JSON, RESULTS_CSV, RESULTS_JSON};
use screen_roast_lib::roast::{RoastGenerator, RoastTables, OFFLINE_PREFIX};
use screen_roast_lib::{run_pipeline, PipelineConfig, RoastError};

const HEADER: &str =
    "userId,app_name,usage_minutes,roast_intensity,roast_category_1,roast_category_2,date";

/// 24 heavy Instagram rows on a Sunday and 16 light LinkedIn rows on a Monday.
fn usage_csv() -> String {
    let mut csv = format!("{HEADER}\n");
    for i in 0..24 {
        let minutes = 200 + (i * 7) % 21;
        writeln!(csv, "ig{i},Instagram,{minutes},brutal,social_life,health,2024-03-10").unwrap();
    }
    for i in 0..16 {
        let minutes = 25 + i % 10;
        writeln!(csv, "li{i},LinkedIn,{minutes},light,career,,2024-03-11").unwrap();
    }
    csv
}

fn write_file(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn heavy_instagram_users_get_a_brutal_roast() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "usage.csv", &usage_csv());

    let raw = DataLoader::new().load(&path).unwrap();
    let dataset = DataProcessor::new().process(raw);
    assert_eq!(dataset.len(), 40);
    assert!(dataset
        .iter()
        .all(|r| r.day_of_week.is_some() && r.usage_category.is_some()));

    let model = train(&dataset, &TrainingConfig::default()).unwrap();
    let predicted =
        model.predict(&FeatureRow::new("Instagram", Intensity::Brutal, DayOfWeek::Sunday));
    assert!((200..=220).contains(&predicted), "predicted {predicted}");

    let generator = RoastGenerator::new(RoastTables::builtin());
    let prompt = generator
        .render("Instagram", predicted, "social_life", "brutal")
        .unwrap();
    let text = prompt.as_str();
    assert!(!text.is_empty());
    assert!(text.contains("3 hours"));
    assert!(text.contains("minutes"));
}

#[test]
fn same_seed_gives_same_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "usage.csv", &usage_csv());
    let dataset = DataProcessor::new().process(DataLoader::new().load(&path).unwrap());

    let first = train(&dataset, &TrainingConfig::default()).unwrap();
    let second = train(&dataset, &TrainingConfig::default()).unwrap();

    assert_eq!(first.split(), second.split());
    assert_eq!(
        evaluate(&first, &first.test_partition(&dataset)).unwrap(),
        evaluate(&second, &second.test_partition(&dataset)).unwrap()
    );
}

#[test]
fn full_run_exports_results_and_skips_unknown_apps() {
    let dir = tempfile::tempdir().unwrap();
    // An unknown app heads the file and a malformed row sits in the middle.
    let mut csv = usage_csv();
    csv.insert_str(
        HEADER.len() + 1,
        "nf0,Netflix,180,medium,laziness,,2024-03-12\nbad0,TikTok,lots,brutal,sleep,,2024-03-12\n",
    );
    let data_path = write_file(dir.path(), "usage.csv", &csv);
    let output_dir = dir.path().join("out");

    let config = PipelineConfig {
        data_path,
        output_dir: Some(output_dir.clone()),
        cv_folds: 3,
        demo_users: 5,
        save_model: true,
        ..PipelineConfig::default()
    };
    let report = run_pipeline(&config).unwrap();

    assert_eq!(report.load.rejected.len(), 1);
    assert_eq!(report.skipped_users.len(), 1);
    assert_eq!(report.skipped_users[0].user_id, "nf0");
    assert_eq!(report.roasts.len(), 4);
    assert!(report.roasts.iter().all(|r| r.roast.starts_with(OFFLINE_PREFIX)));
    assert_eq!(report.cross_validation.len(), 3);
    assert!(!report.api_online);
    assert_eq!(report.top_apps.rankings.by_mean_usage[0], "Instagram");
    assert!(report.top_apps.app_report("LinkedIn").is_err());

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(output_dir.join(RESULTS_JSON)).unwrap()).unwrap();
    assert_eq!(json["roasts"].as_array().unwrap().len(), 4);

    let mut reader = csv::Reader::from_path(output_dir.join(RESULTS_CSV)).unwrap();
    assert_eq!(reader.records().count(), 4);

    let model = TrainedModel::load(&output_dir.join(MODEL_JSON)).unwrap();
    assert_eq!(model.split().test.len(), report.test_rows);
}

#[test]
fn missing_file_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        data_path: dir.path().join("absent.csv"),
        ..PipelineConfig::default()
    };

    let err = run_pipeline(&config).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RoastError>(),
        Some(RoastError::DataLoad { .. })
    ));
}

#[test]
fn tiny_dataset_is_insufficient() {
    let dir = tempfile::tempdir().unwrap();
    let mut csv = format!("{HEADER}\n");
    for i in 0..5 {
        writeln!(csv, "u{i},Reddit,90,medium,sleep,,2024-03-10").unwrap();
    }
    let config = PipelineConfig {
        data_path: write_file(dir.path(), "usage.csv", &csv),
        ..PipelineConfig::default()
    };

    let err = run_pipeline(&config).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RoastError>(),
        Some(RoastError::InsufficientData { .. })
    ));
}

#[test]
fn small_folds_skip_cross_validation_without_failing_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut csv = format!("{HEADER}\n");
    for i in 0..12 {
        writeln!(csv, "u{i},Reddit,{},medium,sleep,,2024-03-1{}", 60 + i * 10, i % 7).unwrap();
    }
    let config = PipelineConfig {
        data_path: write_file(dir.path(), "usage.csv", &csv),
        training: TrainingConfig {
            test_size: 0.1,
            ..TrainingConfig::default()
        },
        cv_folds: 5,
        ..PipelineConfig::default()
    };

    let report = run_pipeline(&config).unwrap();

    assert_eq!(report.train_rows, 10);
    assert_eq!(report.test_rows, 2);
    assert!(report.cross_validation.is_empty());
    assert!(report.cv_summary.is_none());
    assert_eq!(report.roasts.len(), 5);
}
