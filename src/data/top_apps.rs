//! Focused analysis of the most popular apps: per-app profiles, rankings,
//! comparison with global averages and usage recommendations.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::data::models::{DayOfWeek, Dataset, Intensity, UsageRecord};
use crate::data::processor::quantile;
use crate::error::{Result, RoastError};
use crate::log_info;

const ENABLE_LOGS: bool = true;

/// The ten most popular apps worldwide.
pub const TOP_APPS: [&str; 10] = [
    "Instagram", "TikTok", "YouTube", "WhatsApp", "Facebook", "Twitter", "Snapchat", "Reddit",
    "Netflix", "Spotify",
];

/// Sessions at or below this many minutes count as light.
const LIGHT_SESSION_MAX_MINUTES: u32 = 60;
/// Sessions above this many minutes count as heavy.
const MODERATE_SESSION_MAX_MINUTES: u32 = 180;

/// Per-user daily totals at or below this are light, above `HEAVY_USER_TOTAL_MINUTES` heavy.
const LIGHT_USER_TOTAL_MINUTES: u32 = 120;
const HEAVY_USER_TOTAL_MINUTES: u32 = 360;

/// Apps averaging more than this get a time-limit recommendation.
const HIGH_USAGE_MEAN_MINUTES: f64 = 180.0;
const SOCIAL_MEDIA_TOTAL_MINUTES: u64 = 300;
const WEEKEND_RATIO: f64 = 1.5;

pub fn app_category(app: &str) -> &'static str {
    match app {
        "Instagram" | "Facebook" | "Twitter" | "Snapchat" => "Social Media",
        "TikTok" => "Short Video",
        "YouTube" => "Video Streaming",
        "WhatsApp" => "Messaging",
        "Reddit" => "Social Forum",
        "Netflix" => "Entertainment",
        "Spotify" => "Music Streaming",
        _ => "Other",
    }
}

/// Typical minutes per day worldwide, for the apps that have a figure.
pub fn global_average_minutes(app: &str) -> Option<f64> {
    let minutes = match app {
        "Instagram" => 195,
        "TikTok" => 168,
        "YouTube" => 142,
        "WhatsApp" => 85,
        "Facebook" => 125,
        "Twitter" => 95,
        "Snapchat" => 110,
        "Reddit" => 135,
        "Netflix" => 180,
        "Spotify" => 75,
        _ => return None,
    };
    Some(f64::from(minutes))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageLevel {
    Above,
    Below,
    Equal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalComparison {
    pub local_average: f64,
    pub global_average: f64,
    pub difference_minutes: f64,
    pub percentage_difference: f64,
    pub level: UsageLevel,
}

impl GlobalComparison {
    fn new(local_average: f64, global_average: f64) -> Self {
        let difference_minutes = local_average - global_average;
        let level = if difference_minutes > 0.0 {
            UsageLevel::Above
        } else if difference_minutes < 0.0 {
            UsageLevel::Below
        } else {
            UsageLevel::Equal
        };
        Self {
            local_average,
            global_average,
            difference_minutes,
            percentage_difference: difference_minutes / global_average * 100.0,
            level,
        }
    }
}

/// Sessions bucketed by length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionMix {
    pub light: usize,
    pub moderate: usize,
    pub heavy: usize,
}

/// Everything known about one app in the analyzed rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppProfile {
    pub app_name: String,
    pub category: &'static str,
    pub sessions: usize,
    pub unique_users: usize,
    pub mean_minutes: f64,
    pub median_minutes: f64,
    pub min_minutes: u32,
    pub max_minutes: u32,
    /// Sample standard deviation; zero for a single session.
    pub std_minutes: f64,
    pub total_hours: f64,
    pub session_mix: SessionMix,
    pub intensity_counts: BTreeMap<Intensity, usize>,
    pub preferred_intensity: Intensity,
    pub roast_categories: BTreeMap<String, usize>,
    pub daily_means: BTreeMap<DayOfWeek, f64>,
    pub peak_day: Option<DayOfWeek>,
    pub lowest_day: Option<DayOfWeek>,
    pub global: Option<GlobalComparison>,
}

impl AppProfile {
    /// Mean minutes times distinct users.
    pub fn engagement(&self) -> f64 {
        self.mean_minutes * self.unique_users as f64
    }

    pub fn total_minutes(&self) -> f64 {
        self.total_hours * 60.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub apps: Vec<String>,
    pub sessions: usize,
    pub mean_minutes: f64,
    pub total_hours: f64,
    pub preferred_intensity: Intensity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserBehavior {
    pub single_app_users: usize,
    pub multi_app_users: usize,
    pub mean_apps_per_user: f64,
    pub max_apps_per_user: usize,
    /// Users bucketed by their summed minutes across apps.
    pub usage_mix: SessionMix,
    pub mean_total_minutes: f64,
    pub max_total_minutes: u64,
    pub mean_sessions_per_user: f64,
    pub max_sessions_per_user: usize,
    pub single_session_users: usize,
    pub multi_session_users: usize,
}

/// App names ordered by each metric, highest first; ties by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppRankings {
    pub by_mean_usage: Vec<String>,
    pub by_total_usage: Vec<String>,
    pub by_user_count: Vec<String>,
    pub by_engagement: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopAppsAnalysis {
    /// Apps that were analyzed, in `TOP_APPS` order.
    pub analyzed_apps: Vec<String>,
    pub apps: BTreeMap<String, AppProfile>,
    pub categories: BTreeMap<String, CategoryStats>,
    pub behavior: UserBehavior,
    pub rankings: AppRankings,
    pub most_addictive_app: Option<String>,
    pub most_popular_category: Option<String>,
    pub peak_day: Option<DayOfWeek>,
    pub recommendations: Vec<String>,
}

impl TopAppsAnalysis {
    /// The profile of one analyzed app.
    pub fn app_report(&self, app_name: &str) -> Result<&AppProfile> {
        self.apps
            .get(app_name)
            .ok_or_else(|| RoastError::UnknownApp(app_name.to_string()))
    }
}

/// Analyzes the rows of the top apps. When none of them occur, the first ten
/// distinct apps of the dataset are analyzed instead. Rows without usage
/// minutes are ignored.
pub fn analyze_top_apps(dataset: &Dataset) -> TopAppsAnalysis {
    let labelled: Vec<&UsageRecord> = dataset
        .iter()
        .filter(|record| record.usage_minutes.is_some())
        .collect();

    let present: BTreeSet<&str> = labelled.iter().map(|r| r.app_name.as_str()).collect();
    let mut analyzed_apps: Vec<String> = TOP_APPS
        .iter()
        .filter(|app| present.contains(**app))
        .map(|app| app.to_string())
        .collect();
    if analyzed_apps.is_empty() {
        for record in &labelled {
            if analyzed_apps.len() == TOP_APPS.len() {
                break;
            }
            if !analyzed_apps.contains(&record.app_name) {
                analyzed_apps.push(record.app_name.clone());
            }
        }
    }

    let rows: Vec<&UsageRecord> = labelled
        .into_iter()
        .filter(|record| analyzed_apps.contains(&record.app_name))
        .collect();
    log_info!(
        "[top_apps] analyzing {} app(s) over {} rows: {}",
        analyzed_apps.len(),
        rows.len(),
        analyzed_apps.join(", ")
    );

    let mut by_app: BTreeMap<&str, Vec<&UsageRecord>> = BTreeMap::new();
    for record in &rows {
        by_app.entry(record.app_name.as_str()).or_default().push(*record);
    }
    let apps: BTreeMap<String, AppProfile> = by_app
        .iter()
        .map(|(app, records)| (app.to_string(), profile(app, records)))
        .collect();

    let analysis = TopAppsAnalysis {
        categories: categories(&rows),
        behavior: behavior(&rows),
        rankings: rankings(&apps),
        most_addictive_app: max_key(apps.iter().map(|(name, p)| (name.clone(), p.mean_minutes))),
        most_popular_category: max_key(
            counts(rows.iter().map(|r| app_category(&r.app_name).to_string()))
                .into_iter()
                .map(|(category, n)| (category, n as f64)),
        ),
        peak_day: max_key(daily_means(&rows).into_iter()),
        recommendations: recommendations(&apps, &rows),
        analyzed_apps,
        apps,
    };

    if let Some(app) = &analysis.most_addictive_app {
        log_info!("[top_apps] most addictive app: {}", app);
    }
    analysis
}

fn profile(app: &str, records: &[&UsageRecord]) -> AppProfile {
    let mut minutes: Vec<f64> = records.iter().map(|r| minutes_of(r)).collect();
    minutes.sort_by(f64::total_cmp);
    let mean_minutes = mean(&minutes);

    let mut session_mix = SessionMix::default();
    for record in records {
        let value = record.usage_minutes.unwrap_or(0);
        if value <= LIGHT_SESSION_MAX_MINUTES {
            session_mix.light += 1;
        } else if value <= MODERATE_SESSION_MAX_MINUTES {
            session_mix.moderate += 1;
        } else {
            session_mix.heavy += 1;
        }
    }

    let intensity_counts = counts(records.iter().map(|r| r.roast_intensity));
    let daily_means = daily_means(records);

    AppProfile {
        app_name: app.to_string(),
        category: app_category(app),
        sessions: records.len(),
        unique_users: records.iter().map(|r| &r.user_id).collect::<BTreeSet<_>>().len(),
        mean_minutes,
        median_minutes: quantile(&minutes, 0.5),
        min_minutes: records.iter().filter_map(|r| r.usage_minutes).min().unwrap_or(0),
        max_minutes: records.iter().filter_map(|r| r.usage_minutes).max().unwrap_or(0),
        std_minutes: sample_std(&minutes, mean_minutes),
        total_hours: minutes.iter().sum::<f64>() / 60.0,
        session_mix,
        preferred_intensity: preferred_intensity(&intensity_counts),
        intensity_counts,
        roast_categories: counts(records.iter().map(|r| r.roast_category.clone())),
        peak_day: max_key(daily_means.iter().map(|(day, m)| (*day, *m))),
        lowest_day: max_key(daily_means.iter().map(|(day, m)| (*day, -m))),
        daily_means,
        global: global_average_minutes(app).map(|global| GlobalComparison::new(mean_minutes, global)),
    }
}

fn categories(rows: &[&UsageRecord]) -> BTreeMap<String, CategoryStats> {
    let mut grouped: BTreeMap<&'static str, Vec<&UsageRecord>> = BTreeMap::new();
    for record in rows {
        grouped.entry(app_category(&record.app_name)).or_default().push(*record);
    }

    grouped
        .into_iter()
        .map(|(category, records)| {
            let minutes: Vec<f64> = records.iter().map(|r| minutes_of(r)).collect();
            let apps: BTreeSet<&str> = records.iter().map(|r| r.app_name.as_str()).collect();
            let stats = CategoryStats {
                apps: apps.into_iter().map(str::to_string).collect(),
                sessions: records.len(),
                mean_minutes: mean(&minutes),
                total_hours: minutes.iter().sum::<f64>() / 60.0,
                preferred_intensity: preferred_intensity(&counts(
                    records.iter().map(|r| r.roast_intensity),
                )),
            };
            (category.to_string(), stats)
        })
        .collect()
}

fn behavior(rows: &[&UsageRecord]) -> UserBehavior {
    let mut apps: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut totals: BTreeMap<&str, u64> = BTreeMap::new();
    let mut sessions: BTreeMap<&str, usize> = BTreeMap::new();
    for record in rows {
        let user = record.user_id.as_str();
        apps.entry(user).or_default().insert(record.app_name.as_str());
        *totals.entry(user).or_insert(0) += u64::from(record.usage_minutes.unwrap_or(0));
        *sessions.entry(user).or_insert(0) += 1;
    }
    if apps.is_empty() {
        return UserBehavior::default();
    }

    let app_counts: Vec<usize> = apps.values().map(BTreeSet::len).collect();
    let session_counts: Vec<usize> = sessions.values().copied().collect();
    let mut usage_mix = SessionMix::default();
    for total in totals.values() {
        if *total <= u64::from(LIGHT_USER_TOTAL_MINUTES) {
            usage_mix.light += 1;
        } else if *total <= u64::from(HEAVY_USER_TOTAL_MINUTES) {
            usage_mix.moderate += 1;
        } else {
            usage_mix.heavy += 1;
        }
    }

    UserBehavior {
        single_app_users: app_counts.iter().filter(|n| **n == 1).count(),
        multi_app_users: app_counts.iter().filter(|n| **n > 1).count(),
        mean_apps_per_user: mean_count(&app_counts),
        max_apps_per_user: app_counts.iter().copied().max().unwrap_or(0),
        usage_mix,
        mean_total_minutes: mean(&totals.values().map(|t| *t as f64).collect::<Vec<_>>()),
        max_total_minutes: totals.values().copied().max().unwrap_or(0),
        mean_sessions_per_user: mean_count(&session_counts),
        max_sessions_per_user: session_counts.iter().copied().max().unwrap_or(0),
        single_session_users: session_counts.iter().filter(|n| **n == 1).count(),
        multi_session_users: session_counts.iter().filter(|n| **n > 1).count(),
    }
}

fn rankings(apps: &BTreeMap<String, AppProfile>) -> AppRankings {
    let rank = |metric: fn(&AppProfile) -> f64| -> Vec<String> {
        let mut ranked: Vec<(&String, f64)> =
            apps.iter().map(|(name, p)| (name, metric(p))).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.into_iter().map(|(name, _)| name.clone()).collect()
    };

    AppRankings {
        by_mean_usage: rank(|p| p.mean_minutes),
        by_total_usage: rank(|p| p.total_minutes()),
        by_user_count: rank(|p| p.unique_users as f64),
        by_engagement: rank(AppProfile::engagement),
    }
}

fn recommendations(apps: &BTreeMap<String, AppProfile>, rows: &[&UsageRecord]) -> Vec<String> {
    let mut out = Vec::new();

    let high_usage: Vec<&str> = apps
        .values()
        .filter(|p| p.mean_minutes > HIGH_USAGE_MEAN_MINUTES)
        .map(|p| p.app_name.as_str())
        .collect();
    if !high_usage.is_empty() {
        out.push(format!(
            "Consider setting time limits for high-usage apps: {}",
            high_usage.join(", ")
        ));
    }

    let social_minutes: u64 = rows
        .iter()
        .filter(|r| app_category(&r.app_name) == "Social Media")
        .map(|r| u64::from(r.usage_minutes.unwrap_or(0)))
        .sum();
    if social_minutes > SOCIAL_MEDIA_TOTAL_MINUTES {
        out.push("High social media usage detected - consider digital detox periods".to_string());
    }

    let (weekend, weekday): (Vec<&UsageRecord>, Vec<&UsageRecord>) =
        rows.iter().copied().partition(|r| r.day().is_weekend());
    if !weekend.is_empty() && !weekday.is_empty() {
        let weekend_mean = mean(&weekend.iter().map(|r| minutes_of(r)).collect::<Vec<_>>());
        let weekday_mean = mean(&weekday.iter().map(|r| minutes_of(r)).collect::<Vec<_>>());
        if weekend_mean > weekday_mean * WEEKEND_RATIO {
            out.push(
                "Weekend usage is significantly higher - maintain consistent daily limits"
                    .to_string(),
            );
        }
    }

    out
}

fn minutes_of(record: &UsageRecord) -> f64 {
    f64::from(record.usage_minutes.unwrap_or(0))
}

fn daily_means(records: &[&UsageRecord]) -> BTreeMap<DayOfWeek, f64> {
    let mut by_day: BTreeMap<DayOfWeek, Vec<f64>> = BTreeMap::new();
    for record in records {
        by_day.entry(record.day()).or_default().push(minutes_of(record));
    }
    by_day
        .into_iter()
        .map(|(day, minutes)| (day, mean(&minutes)))
        .collect()
}

fn counts<K: Ord>(keys: impl Iterator<Item = K>) -> BTreeMap<K, usize> {
    let mut out = BTreeMap::new();
    for key in keys {
        *out.entry(key).or_insert(0) += 1;
    }
    out
}

/// Most frequent intensity; the mildest wins a tie.
fn preferred_intensity(counts: &BTreeMap<Intensity, usize>) -> Intensity {
    let mut best = (Intensity::Medium, 0);
    for (intensity, count) in counts {
        if *count > best.1 {
            best = (*intensity, *count);
        }
    }
    best.0
}

/// Key with the largest value; the first key in iteration order wins a tie.
fn max_key<K>(values: impl Iterator<Item = (K, f64)>) -> Option<K> {
    let mut best: Option<(K, f64)> = None;
    for (key, value) in values {
        if best.as_ref().map_or(true, |(_, top)| value > *top) {
            best = Some((key, value));
        }
    }
    best.map(|(key, _)| key)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn mean_count(values: &[usize]) -> f64 {
    mean(&values.iter().map(|v| *v as f64).collect::<Vec<_>>())
}

fn sample_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (squares / (values.len() - 1) as f64).sqrt()
}
