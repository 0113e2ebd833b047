//! End-to-end run: load, clean, train, evaluate, then predict and roast the
//! first few users.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::RoastError;
use crate::data::{
    analyze_top_apps, CleaningStats, DataLoader, DataProcessor, Dataset, DatasetInfo, DayOfWeek,
    Insights, Intensity, LoadReport, TopAppsAnalysis,
};
use crate::model::{
    cross_validate, evaluate_detailed, feature_importance, train, CvSummary, EvaluationReport,
    FeatureRow, Metrics, ModelKind, TrainedModel,
};
use crate::roast::{format_duration, GeminiClient, RoastGenerator, RoastTables, UserContext};
use crate::{log_error, log_info, log_warn};

const ENABLE_LOGS: bool = true;

pub const RESULTS_JSON: &str = "results.json";
pub const RESULTS_CSV: &str = "results.csv";
pub const MODEL_JSON: &str = "model.json";

/// One demo user's prediction and roast.
#[derive(Debug, Clone, Serialize)]
pub struct UserRoast {
    pub user_id: String,
    pub app_name: String,
    pub actual_minutes: Option<u32>,
    pub predicted_minutes: u32,
    pub roast_intensity: Intensity,
    pub roast_category: String,
    pub day_of_week: DayOfWeek,
    pub prompt: String,
    pub roast: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedUser {
    pub user_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub data_path: PathBuf,
    pub load: LoadReport,
    pub cleaning: CleaningStats,
    pub dataset: DatasetInfo,
    pub insights: Insights,
    pub top_apps: TopAppsAnalysis,
    pub model_kind: ModelKind,
    pub train_rows: usize,
    pub test_rows: usize,
    pub evaluation: EvaluationReport,
    pub cross_validation: Vec<Metrics>,
    pub cv_summary: Option<CvSummary>,
    pub feature_importance: BTreeMap<String, f64>,
    pub api_online: bool,
    pub roasts: Vec<UserRoast>,
    pub skipped_users: Vec<SkippedUser>,
}

pub fn run_pipeline(config: &PipelineConfig) -> anyhow::Result<PipelineReport> {
    config.validate()?;
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    log_info!("[pipeline] run {} on {}", run_id, config.data_path.display());

    let (raw, load) = DataLoader::new()
        .strict(config.strict_rows)
        .load_with_report(&config.data_path)?;

    let processor = DataProcessor::new().cap_outliers(config.cap_outliers);
    let (cleaned, cleaning) = processor.clean_with_stats(raw);
    let dataset = processor.engineer_features(cleaned);
    let info = DatasetInfo::from_dataset(&dataset);
    let insights = processor.summarize(&dataset);
    let top_apps = analyze_top_apps(&dataset);

    let model = train(&dataset, &config.training)?;
    let evaluation = evaluate_detailed(&model, &model.test_partition(&dataset))?;

    // Cross-validation only feeds the report; too few rows per fold skips it.
    let cross_validation = if config.cv_folds >= 2 {
        match cross_validate(&dataset, &config.training, config.cv_folds) {
            Ok(scores) => scores,
            Err(err @ RoastError::InsufficientData { .. }) => {
                log_warn!("[pipeline] skipping cross-validation: {}", err);
                Vec::new()
            }
            Err(err) => return Err(err.into()),
        }
    } else {
        Vec::new()
    };
    let cv_summary = (!cross_validation.is_empty()).then(|| CvSummary::from_folds(&cross_validation));
    let importance = feature_importance(&model);

    let generator = RoastGenerator::new(RoastTables::builtin());
    let client = GeminiClient::new(config.gemini.clone())?;
    let (roasts, skipped_users) =
        roast_users(&dataset.head(config.demo_users), &model, &generator, &client);

    let report = PipelineReport {
        run_id,
        started_at,
        data_path: config.data_path.clone(),
        load,
        cleaning,
        dataset: info,
        insights,
        top_apps,
        model_kind: model.kind(),
        train_rows: model.split().train.len(),
        test_rows: model.split().test.len(),
        evaluation,
        cross_validation,
        cv_summary,
        feature_importance: importance,
        api_online: client.is_online(),
        roasts,
        skipped_users,
    };

    if let Some(dir) = &config.output_dir {
        export(&report, dir)?;
        if config.save_model {
            let path = dir.join(MODEL_JSON);
            model.save(&path)?;
            log_info!("[pipeline] model saved to {}", path.display());
        }
    }

    log_info!(
        "[pipeline] run {} finished: {} roast(s), {} skipped",
        report.run_id,
        report.roasts.len(),
        report.skipped_users.len()
    );
    Ok(report)
}

/// Predicts, renders and generates for each row. A row whose prompt cannot
/// be rendered is skipped.
fn roast_users(
    users: &Dataset,
    model: &TrainedModel,
    generator: &RoastGenerator,
    client: &GeminiClient,
) -> (Vec<UserRoast>, Vec<SkippedUser>) {
    let mut roasts = Vec::new();
    let mut skipped = Vec::new();

    for (i, record) in users.iter().enumerate() {
        log_info!("[pipeline] processing user {}/{}", i + 1, users.len());
        let predicted = model.predict(&FeatureRow::from(record));
        let context = UserContext {
            day_of_week: record.day(),
            usage_category: record.usage_category,
        };

        let prompt = match generator.render_with_context(
            &record.app_name,
            predicted,
            &record.roast_category,
            record.roast_intensity.as_str(),
            context,
        ) {
            Ok(prompt) => prompt,
            Err(err) => {
                if err.is_per_user() {
                    log_warn!("[pipeline] skipping user {}: {}", record.user_id, err);
                } else {
                    log_error!("[pipeline] skipping user {}: {}", record.user_id, err);
                }
                skipped.push(SkippedUser {
                    user_id: record.user_id.clone(),
                    reason: err.to_string(),
                });
                continue;
            }
        };

        let roast = client.generate_or_placeholder(prompt.as_str());
        roasts.push(UserRoast {
            user_id: record.user_id.clone(),
            app_name: record.app_name.clone(),
            actual_minutes: record.usage_minutes,
            predicted_minutes: predicted,
            roast_intensity: record.roast_intensity,
            roast_category: record.roast_category.clone(),
            day_of_week: record.day(),
            prompt: prompt.into_string(),
            roast,
        });
    }

    (roasts, skipped)
}

/// Writes `results.json` and `results.csv` into `dir`, creating it if needed.
pub fn export(report: &PipelineReport, dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let json_path = dir.join(RESULTS_JSON);
    let serialized = serde_json::to_string_pretty(report)?;
    fs::write(&json_path, serialized)
        .with_context(|| format!("Failed to write results to {}", json_path.display()))?;

    let csv_path = dir.join(RESULTS_CSV);
    let mut writer = csv::Writer::from_path(&csv_path)
        .with_context(|| format!("Failed to create {}", csv_path.display()))?;
    for roast in &report.roasts {
        writer
            .serialize(roast)
            .with_context(|| format!("Failed to write row for user {}", roast.user_id))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", csv_path.display()))?;

    log_info!("[pipeline] results written to {}", dir.display());
    Ok(())
}

/// Console summary of a finished run.
pub fn print_report(report: &PipelineReport) {
    let rule = "=".repeat(60);
    println!("{rule}");
    println!("SCREEN TIME ROAST ANALYSIS  (run {})", report.run_id);
    println!("{rule}");

    println!(
        "Loaded {} of {} rows ({} rejected), {} after cleaning",
        report.load.rows_loaded,
        report.load.rows_read,
        report.load.rejected.len(),
        report.dataset.rows
    );
    println!(
        "Users: {}  Mean usage: {:.1} minutes  Most active day: {}",
        report.insights.unique_users,
        report.insights.global_mean_minutes,
        report
            .insights
            .most_active_day
            .map(|day| day.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    );
    if let Some((app, stats)) = report.insights.top_apps_by_usage().first() {
        println!("Top app by usage: {app} ({} minutes total)", stats.total_minutes);
    }

    print_top_apps(&report.top_apps);

    let metrics = &report.evaluation.metrics;
    println!(
        "\nModel: {}  trained on {} rows, tested on {}",
        report.model_kind, report.train_rows, report.test_rows
    );
    println!(
        "MAE {:.2}  RMSE {:.2}  R² {:.3}  within 30 min: {:.0}%",
        metrics.mae,
        metrics.rmse,
        metrics.r2,
        report.evaluation.within_30 * 100.0
    );
    if let Some(cv) = &report.cv_summary {
        println!(
            "{}-fold CV: R² {:.3} (+/- {:.3}), MAE {:.2}",
            cv.folds, cv.mean_r2, cv.std_r2, cv.mean_mae
        );
    }

    let mut ranked: Vec<_> = report.feature_importance.iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(a.1));
    for (column, importance) in ranked.into_iter().take(5) {
        println!("  {column:<32} {importance:.3}");
    }

    for (i, roast) in report.roasts.iter().enumerate() {
        println!("\n{}", "-".repeat(50));
        println!("USER {}: {}", i + 1, roast.user_id);
        println!("App: {}  Day: {}", roast.app_name, roast.day_of_week);
        match roast.actual_minutes {
            Some(actual) => println!("Actual usage: {} ({actual} minutes)", format_duration(actual)),
            None => println!("Actual usage: unknown"),
        }
        println!(
            "Predicted usage: {} ({} minutes)",
            format_duration(roast.predicted_minutes),
            roast.predicted_minutes
        );
        println!(
            "Intensity: {}  Category: {}",
            roast.roast_intensity.as_str().to_uppercase(),
            roast.roast_category
        );
        println!("\nPrompt:\n{}", roast.prompt);
        println!("\nRoast:\n{}", roast.roast);
    }

    if !report.skipped_users.is_empty() {
        println!("\nSkipped {} user(s):", report.skipped_users.len());
        for user in &report.skipped_users {
            println!("  {}: {}", user.user_id, user.reason);
        }
    }
}

fn print_top_apps(analysis: &TopAppsAnalysis) {
    if analysis.apps.is_empty() {
        return;
    }
    println!("\nTop apps by average usage:");
    for (rank, app) in analysis.rankings.by_mean_usage.iter().enumerate() {
        let Some(profile) = analysis.apps.get(app) else {
            continue;
        };
        let global = profile
            .global
            .as_ref()
            .map(|g| format!("  vs global {:.0} ({:+.1}%)", g.global_average, g.percentage_difference))
            .unwrap_or_default();
        println!(
            "  {}. {app:<10} {:>6.1} min  {} user(s)  prefers {}{global}",
            rank + 1,
            profile.mean_minutes,
            profile.unique_users,
            profile.preferred_intensity
        );
    }
    for recommendation in &analysis.recommendations {
        println!("  * {recommendation}");
    }
}
