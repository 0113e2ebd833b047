use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use crate::data::insights::{self, Insights};
use crate::data::models::{
    canonical_app_name, Dataset, DayOfWeek, UsageCategory, UsageRecord, NO_SECONDARY_CATEGORY,
};
use crate::{log_info, log_warn};

const ENABLE_LOGS: bool = true;

/// Tukey fence multiplier used when capping outliers.
const IQR_FENCE: f64 = 1.5;

/// Cleans raw records and derives the model's categorical features.
#[derive(Debug, Clone, Default)]
pub struct DataProcessor {
    cap_outliers: bool,
}

/// Counts from a [`DataProcessor::clean`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningStats {
    pub missing_usage_dropped: usize,
    pub duplicates_dropped: usize,
    pub app_names_normalized: usize,
    pub outliers_capped: usize,
}

impl DataProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap `usage_minutes` to the IQR fences during cleaning.
    pub fn cap_outliers(mut self, enabled: bool) -> Self {
        self.cap_outliers = enabled;
        self
    }

    /// Cleans and then engineers features in one go.
    pub fn process(&self, dataset: Dataset) -> Dataset {
        let cleaned = self.clean(dataset);
        self.engineer_features(cleaned)
    }

    pub fn clean(&self, dataset: Dataset) -> Dataset {
        self.clean_with_stats(dataset).0
    }

    /// Drops rows without usage, normalizes app names, removes duplicate
    /// `(user_id, app_name, date)` rows keeping the first one.
    pub fn clean_with_stats(&self, dataset: Dataset) -> (Dataset, CleaningStats) {
        let mut stats = CleaningStats::default();
        let mut unknown_apps = BTreeSet::new();
        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(dataset.len());

        for mut record in dataset.into_records() {
            if record.usage_minutes.is_none() {
                stats.missing_usage_dropped += 1;
                continue;
            }

            match canonical_app_name(&record.app_name) {
                Some(canonical) if canonical != record.app_name => {
                    record.app_name = canonical.to_string();
                    stats.app_names_normalized += 1;
                }
                Some(_) => {}
                None => {
                    unknown_apps.insert(record.app_name.clone());
                }
            }

            let key = (record.user_id.clone(), record.app_name.clone(), record.date);
            if !seen.insert(key) {
                stats.duplicates_dropped += 1;
                continue;
            }

            if record.secondary_category.is_none() {
                record.secondary_category = Some(NO_SECONDARY_CATEGORY.to_string());
            }

            records.push(record);
        }

        if !unknown_apps.is_empty() {
            log_warn!("[processor] unknown app names kept as-is: {:?}", unknown_apps);
        }

        if self.cap_outliers {
            stats.outliers_capped = cap_usage_outliers(&mut records);
        }

        log_info!(
            "[processor] cleaned {} rows: dropped {} missing usage, {} duplicates; normalized {} app names; capped {} outliers",
            records.len(),
            stats.missing_usage_dropped,
            stats.duplicates_dropped,
            stats.app_names_normalized,
            stats.outliers_capped
        );

        (Dataset::new(records), stats)
    }

    /// Sets `day_of_week` and `usage_category` on every row.
    pub fn engineer_features(&self, dataset: Dataset) -> Dataset {
        let records: Vec<UsageRecord> = dataset
            .into_records()
            .into_iter()
            .map(|mut record| {
                record.day_of_week = Some(DayOfWeek::from_date(record.date));
                record.usage_category = record.usage_minutes.map(UsageCategory::from_minutes);
                record
            })
            .collect();

        log_info!(
            "[processor] engineered day_of_week and usage_category for {} rows",
            records.len()
        );

        Dataset::new(records)
    }

    pub fn summarize(&self, dataset: &Dataset) -> Insights {
        insights::summarize(dataset)
    }
}

/// Linear-interpolated quantile of sorted values, `q` in `[0, 1]`.
pub(crate) fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Caps usage to `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`, returning how many rows changed.
fn cap_usage_outliers(records: &mut [UsageRecord]) -> usize {
    let mut values: Vec<f64> = records
        .iter()
        .filter_map(|r| r.usage_minutes)
        .map(f64::from)
        .collect();
    if values.len() < 4 {
        return 0;
    }
    values.sort_by(f64::total_cmp);

    let q1 = quantile(&values, 0.25);
    let q3 = quantile(&values, 0.75);
    let iqr = q3 - q1;
    let lower = (q1 - IQR_FENCE * iqr).max(0.0);
    let upper = q3 + IQR_FENCE * iqr;

    let mut capped = 0;
    for record in records.iter_mut() {
        if let Some(minutes) = record.usage_minutes {
            let value = f64::from(minutes);
            let bounded = value.clamp(lower, upper);
            if bounded != value {
                record.usage_minutes = Some(bounded.round() as u32);
                capped += 1;
            }
        }
    }

    if capped > 0 {
        log_warn!(
            "[processor] capped {} usage outliers to [{:.1}, {:.1}]",
            capped,
            lower,
            upper
        );
    }
    capped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::Intensity;
    use chrono::NaiveDate;

    fn record(user: &str, app: &str, minutes: Option<u32>, day: u32) -> UsageRecord {
        UsageRecord {
            user_id: user.to_string(),
            app_name: app.to_string(),
            usage_minutes: minutes,
            roast_intensity: Intensity::Medium,
            roast_category: "health".to_string(),
            secondary_category: None,
            date: NaiveDate::from_ymd_opt(2025, 7, day).unwrap(),
            day_of_week: None,
            usage_category: None,
        }
    }

    #[test]
    fn clean_drops_missing_usage_and_duplicates() {
        let dataset = Dataset::new(vec![
            record("u1", "Instagram", Some(120), 15),
            record("u1", "instagram", Some(90), 15),
            record("u2", "TikTok", None, 15),
            record("u3", "YouTube", Some(30), 16),
        ]);

        let (cleaned, stats) = DataProcessor::new().clean_with_stats(dataset);

        assert_eq!(cleaned.len(), 2);
        assert_eq!(stats.missing_usage_dropped, 1);
        assert_eq!(stats.duplicates_dropped, 1);
        assert_eq!(stats.app_names_normalized, 1);
        assert_eq!(cleaned.records()[0].usage_minutes, Some(120));
        assert_eq!(
            cleaned.records()[0].secondary_category.as_deref(),
            Some(NO_SECONDARY_CATEGORY)
        );
    }

    #[test]
    fn clean_keeps_unknown_apps() {
        let dataset = Dataset::new(vec![record("u1", "Netflix", Some(100), 15)]);
        let cleaned = DataProcessor::new().clean(dataset);
        assert_eq!(cleaned.records()[0].app_name, "Netflix");
    }

    #[test]
    fn every_surviving_row_gets_one_day_and_category() {
        let dataset = Dataset::new(vec![
            record("u1", "Instagram", Some(10), 14),
            record("u2", "TikTok", None, 15),
            record("u3", "YouTube", Some(150), 16),
            record("u4", "Reddit", Some(400), 20),
        ]);

        let processed = DataProcessor::new().process(dataset);

        assert_eq!(processed.len(), 3);
        for row in processed.iter() {
            assert_eq!(row.day_of_week, Some(DayOfWeek::from_date(row.date)));
            assert!(row.usage_category.is_some());
        }
        let categories: Vec<_> = processed.iter().map(|r| r.usage_category).collect();
        assert_eq!(
            categories,
            vec![
                Some(UsageCategory::Light),
                Some(UsageCategory::Moderate),
                Some(UsageCategory::Heavy)
            ]
        );
        assert_eq!(processed.records()[2].day_of_week, Some(DayOfWeek::Sunday));
    }

    #[test]
    fn outlier_capping_is_opt_in() {
        let mut rows: Vec<UsageRecord> = (1..=8)
            .map(|day| record(&format!("u{day}"), "Instagram", Some(100 + day), day))
            .collect();
        rows.push(record("u9", "Instagram", Some(5000), 9));

        let untouched = DataProcessor::new().clean(Dataset::new(rows.clone()));
        assert_eq!(untouched.records()[8].usage_minutes, Some(5000));

        let (capped, stats) = DataProcessor::new()
            .cap_outliers(true)
            .clean_with_stats(Dataset::new(rows));
        assert_eq!(stats.outliers_capped, 1);
        assert!(capped.records()[8].usage_minutes.unwrap() < 200);
    }

    #[test]
    fn quantile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&values, 0.0), 1.0);
        assert_eq!(quantile(&values, 1.0), 4.0);
        assert!((quantile(&values, 0.5) - 2.5).abs() < 1e-9);
    }
}
