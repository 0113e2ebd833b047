//! Read-only aggregates over a processed dataset, used for reporting.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::data::models::{Dataset, DayOfWeek, Intensity, UsageCategory};
use crate::data::processor::quantile;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AppUsageStats {
    pub count: usize,
    pub mean_minutes: f64,
    pub median_minutes: f64,
    pub total_minutes: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Insights {
    pub total_records: usize,
    pub unique_users: usize,
    pub global_mean_minutes: f64,
    pub per_app: BTreeMap<String, AppUsageStats>,
    /// Distinct apps each user appears with.
    pub apps_per_user: BTreeMap<String, usize>,
    pub intensity_distribution: BTreeMap<Intensity, usize>,
    pub mean_minutes_by_day: BTreeMap<DayOfWeek, f64>,
    pub most_active_day: Option<DayOfWeek>,
    pub usage_patterns: BTreeMap<UsageCategory, usize>,
    pub mean_engagement_score: f64,
}

impl Insights {
    /// Apps ordered by total minutes, highest first.
    pub fn top_apps_by_usage(&self) -> Vec<(&str, &AppUsageStats)> {
        let mut apps: Vec<_> = self
            .per_app
            .iter()
            .map(|(name, stats)| (name.as_str(), stats))
            .collect();
        apps.sort_by(|a, b| b.1.total_minutes.cmp(&a.1.total_minutes).then(a.0.cmp(b.0)));
        apps
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Rows without usage minutes only count towards record, user and
/// intensity totals.
pub fn summarize(dataset: &Dataset) -> Insights {
    let mut users = BTreeSet::new();
    let mut minutes_by_app: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut apps_by_user: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut intensity_distribution = BTreeMap::new();
    let mut minutes_by_day: BTreeMap<DayOfWeek, Vec<f64>> = BTreeMap::new();
    let mut usage_patterns = BTreeMap::new();
    let mut all_minutes = Vec::with_capacity(dataset.len());
    let mut engagement = Vec::with_capacity(dataset.len());

    for record in dataset.iter() {
        users.insert(record.user_id.clone());
        apps_by_user
            .entry(record.user_id.clone())
            .or_default()
            .insert(record.app_name.clone());
        *intensity_distribution
            .entry(record.roast_intensity)
            .or_insert(0) += 1;

        let Some(minutes) = record.usage_minutes else {
            continue;
        };
        let minutes = f64::from(minutes);
        all_minutes.push(minutes);
        minutes_by_app
            .entry(record.app_name.clone())
            .or_default()
            .push(minutes);
        minutes_by_day.entry(record.day()).or_default().push(minutes);

        let category = record
            .usage_category
            .unwrap_or_else(|| UsageCategory::from_minutes(minutes as u32));
        *usage_patterns.entry(category).or_insert(0) += 1;

        if let Some(score) = record.engagement_score() {
            engagement.push(score as f64);
        }
    }

    let per_app = minutes_by_app
        .into_iter()
        .map(|(app, mut minutes)| {
            minutes.sort_by(f64::total_cmp);
            let stats = AppUsageStats {
                count: minutes.len(),
                mean_minutes: mean(&minutes),
                median_minutes: quantile(&minutes, 0.5),
                total_minutes: minutes.iter().sum::<f64>() as u64,
            };
            (app, stats)
        })
        .collect();

    let mean_minutes_by_day: BTreeMap<DayOfWeek, f64> = minutes_by_day
        .into_iter()
        .map(|(day, minutes)| (day, mean(&minutes)))
        .collect();

    let most_active_day = mean_minutes_by_day
        .iter()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(day, _)| *day);

    Insights {
        total_records: dataset.len(),
        unique_users: users.len(),
        global_mean_minutes: mean(&all_minutes),
        per_app,
        apps_per_user: apps_by_user
            .into_iter()
            .map(|(user, apps)| (user, apps.len()))
            .collect(),
        intensity_distribution,
        mean_minutes_by_day,
        most_active_day,
        usage_patterns,
        mean_engagement_score: mean(&engagement),
    }
}
