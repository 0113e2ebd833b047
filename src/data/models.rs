//! Screen-time records and the categorical values derived from them.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::RoastError;

/// Apps the dataset is expected to contain, in their canonical spelling.
pub const KNOWN_APPS: &[&str] = &[
    "Instagram",
    "TikTok",
    "YouTube",
    "Twitter",
    "Reddit",
    "Facebook",
    "Snapchat",
    "WhatsApp",
    "LinkedIn",
];

/// Usage strictly below this many minutes is `Light`.
pub const LIGHT_USAGE_MAX_MINUTES: u32 = 60;

/// Usage up to and including this many minutes is `Moderate`; above it is
/// `Heavy`, and the user counts as a heavy user.
pub const MODERATE_USAGE_MAX_MINUTES: u32 = 240;

/// Placeholder stored when the optional secondary category is blank.
pub const NO_SECONDARY_CATEGORY: &str = "None";

/// Returns the canonical spelling of a known app, matching case-insensitively.
pub fn canonical_app_name(name: &str) -> Option<&'static str> {
    let trimmed = name.trim();
    KNOWN_APPS
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(trimmed))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Light,
    Medium,
    Brutal,
}

impl Intensity {
    pub const ALL: [Intensity; 3] = [Intensity::Light, Intensity::Medium, Intensity::Brutal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intensity::Light => "light",
            Intensity::Medium => "medium",
            Intensity::Brutal => "brutal",
        }
    }

    /// Multiplier applied to usage minutes for the engagement score.
    pub fn engagement_weight(&self) -> u32 {
        match self {
            Intensity::Light => 1,
            Intensity::Medium => 2,
            Intensity::Brutal => 3,
        }
    }
}

impl FromStr for Intensity {
    type Err = RoastError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Intensity::Light),
            "medium" => Ok(Intensity::Medium),
            "brutal" => Ok(Intensity::Brutal),
            _ => Err(RoastError::UnknownIntensity(value.to_string())),
        }
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    pub fn from_date(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
            DayOfWeek::Sunday => "Sunday",
        }
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self, DayOfWeek::Saturday | DayOfWeek::Sunday)
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UsageCategory {
    Light,
    Moderate,
    Heavy,
}

impl UsageCategory {
    pub fn from_minutes(minutes: u32) -> Self {
        if minutes < LIGHT_USAGE_MAX_MINUTES {
            UsageCategory::Light
        } else if minutes <= MODERATE_USAGE_MAX_MINUTES {
            UsageCategory::Moderate
        } else {
            UsageCategory::Heavy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UsageCategory::Light => "light",
            UsageCategory::Moderate => "moderate",
            UsageCategory::Heavy => "heavy",
        }
    }
}

impl fmt::Display for UsageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the screen-time table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub user_id: String,
    pub app_name: String,
    /// `None` when the cell was blank in the source file.
    pub usage_minutes: Option<u32>,
    pub roast_intensity: Intensity,
    pub roast_category: String,
    pub secondary_category: Option<String>,
    pub date: NaiveDate,
    pub day_of_week: Option<DayOfWeek>, // Filled by engineer_features
    pub usage_category: Option<UsageCategory>, // Filled by engineer_features
}

impl UsageRecord {
    /// Day of week, falling back to the date when features are not engineered yet.
    pub fn day(&self) -> DayOfWeek {
        self.day_of_week
            .unwrap_or_else(|| DayOfWeek::from_date(self.date))
    }

    pub fn is_heavy_user(&self) -> bool {
        self.usage_minutes
            .map(|minutes| minutes > MODERATE_USAGE_MAX_MINUTES)
            .unwrap_or(false)
    }

    /// Usage minutes times the intensity weight, widened so any `u32` usage fits.
    pub fn engagement_score(&self) -> Option<u64> {
        self.usage_minutes
            .map(|minutes| u64::from(minutes) * u64::from(self.roast_intensity.engagement_weight()))
    }
}

/// Ordered collection of records for a single run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Dataset {
    records: Vec<UsageRecord>,
}

impl Dataset {
    pub fn new(records: Vec<UsageRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[UsageRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<UsageRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UsageRecord> {
        self.records.iter()
    }

    /// Rows at `indices`, in the given order. Out-of-range indices are skipped.
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            records: indices
                .iter()
                .filter_map(|&i| self.records.get(i).cloned())
                .collect(),
        }
    }

    /// First `n` rows, used to pick the demo users.
    pub fn head(&self, n: usize) -> Dataset {
        Dataset {
            records: self.records.iter().take(n).cloned().collect(),
        }
    }
}

impl FromIterator<UsageRecord> for Dataset {
    fn from_iter<I: IntoIterator<Item = UsageRecord>>(iter: I) -> Self {
        Dataset::new(iter.into_iter().collect())
    }
}
