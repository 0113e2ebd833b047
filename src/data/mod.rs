pub mod insights;
pub mod loader;
pub mod models;
pub mod processor;
pub mod top_apps;

pub use insights::{AppUsageStats, Insights};
pub use loader::{DataLoader, DatasetInfo, LoadReport, RowIssue, REQUIRED_COLUMNS};
pub use models::{
    Dataset, DayOfWeek, Intensity, UsageCategory, UsageRecord, KNOWN_APPS,
    LIGHT_USAGE_MAX_MINUTES, MODERATE_USAGE_MAX_MINUTES,
};
pub use processor::{CleaningStats, DataProcessor};
pub use top_apps::{analyze_top_apps, AppProfile, AppRankings, TopAppsAnalysis, TOP_APPS};
