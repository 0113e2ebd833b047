use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;

use crate::data::models::{Dataset, Intensity, UsageRecord};
use crate::error::{Result, RoastError};
use crate::{log_info, log_warn};

const ENABLE_LOGS: bool = true;

pub const COL_USER_ID: &str = "userId";
pub const COL_APP_NAME: &str = "app_name";
pub const COL_USAGE_MINUTES: &str = "usage_minutes";
pub const COL_INTENSITY: &str = "roast_intensity";
pub const COL_CATEGORY: &str = "roast_category_1";
pub const COL_SECONDARY_CATEGORY: &str = "roast_category_2";
pub const COL_DATE: &str = "date";

/// Columns every input file must carry.
pub const REQUIRED_COLUMNS: &[&str] = &[
    COL_USER_ID,
    COL_APP_NAME,
    COL_USAGE_MINUTES,
    COL_INTENSITY,
    COL_CATEGORY,
    COL_DATE,
];

/// Columns that are read when present; anything else is ignored.
const OPTIONAL_COLUMNS: &[&str] = &[COL_SECONDARY_CATEGORY, "fcmToken"];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A row that could not be coerced into a [`UsageRecord`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RowIssue {
    /// 1-based line in the source file (the header is line 1).
    pub line: u64,
    pub column: String,
    pub value: String,
    pub reason: String,
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: {} = {:?} ({})",
            self.line, self.column, self.value, self.reason
        )
    }
}

/// What happened while loading a file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_loaded: usize,
    pub rejected: Vec<RowIssue>,
    pub unexpected_columns: Vec<String>,
}

/// Reads the delimited screen-time table into a [`Dataset`].
///
/// In the default lenient mode rows that fail coercion are dropped and
/// reported; in strict mode the first bad row fails the whole load with
/// [`RoastError::DataValidation`] listing every offending row.
#[derive(Debug, Clone, Default)]
pub struct DataLoader {
    strict: bool,
}

/// Positions of the known columns in the header row.
struct ColumnIndex {
    user_id: usize,
    app_name: usize,
    usage_minutes: usize,
    intensity: usize,
    category: usize,
    date: usize,
    secondary_category: Option<usize>,
}

impl DataLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<Dataset> {
        self.load_with_report(path).map(|(dataset, _)| dataset)
    }

    pub fn load_with_report(&self, path: impl AsRef<Path>) -> Result<(Dataset, LoadReport)> {
        let path = path.as_ref();
        log_info!("[loader] loading data from {}", path.display());

        if !path.is_file() {
            return Err(RoastError::data_load(path, "file not found"));
        }

        let file = File::open(path).map_err(|err| RoastError::data_load(path, err.to_string()))?;
        self.load_from_reader(file, path)
    }

    /// Loads from any reader; `source` only labels errors and logs.
    pub fn load_from_reader<R: Read>(&self, reader: R, source: &Path) -> Result<(Dataset, LoadReport)> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|err| RoastError::data_load(source, err.to_string()))?
            .clone();
        let columns = resolve_columns(&headers, source)?;

        let mut report = LoadReport {
            unexpected_columns: headers
                .iter()
                .filter(|h| !REQUIRED_COLUMNS.contains(h) && !OPTIONAL_COLUMNS.contains(h))
                .map(str::to_string)
                .collect(),
            ..LoadReport::default()
        };
        if !report.unexpected_columns.is_empty() {
            log_info!(
                "[loader] ignoring unexpected columns: {:?}",
                report.unexpected_columns
            );
        }

        let mut records = Vec::new();
        for row in rdr.records() {
            let row = row.map_err(|err| RoastError::data_load(source, err.to_string()))?;
            report.rows_read += 1;
            let line = row.position().map(|p| p.line()).unwrap_or(0);

            match parse_row(&row, &columns, line) {
                Ok(record) => records.push(record),
                Err(issue) => {
                    log_warn!("[loader] rejected row: {}", issue);
                    report.rejected.push(issue);
                }
            }
        }

        if !report.rejected.is_empty() {
            if self.strict {
                return Err(RoastError::DataValidation {
                    rows: report.rejected,
                });
            }
            log_warn!(
                "[loader] dropped {} of {} rows that failed validation",
                report.rejected.len(),
                report.rows_read
            );
        }

        report.rows_loaded = records.len();
        log_info!(
            "[loader] loaded {} rows from {}",
            report.rows_loaded,
            source.display()
        );

        Ok((Dataset::new(records), report))
    }
}

fn resolve_columns(headers: &StringRecord, source: &Path) -> Result<ColumnIndex> {
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(RoastError::data_load(
            source,
            format!("missing required columns: {}", missing.join(", ")),
        ));
    }

    let position = |name: &str| headers.iter().position(|h| h == name);
    // Required columns were checked above.
    let required = |name: &str| position(name).unwrap_or_default();

    Ok(ColumnIndex {
        user_id: required(COL_USER_ID),
        app_name: required(COL_APP_NAME),
        usage_minutes: required(COL_USAGE_MINUTES),
        intensity: required(COL_INTENSITY),
        category: required(COL_CATEGORY),
        date: required(COL_DATE),
        secondary_category: position(COL_SECONDARY_CATEGORY),
    })
}

fn parse_row(
    row: &StringRecord,
    columns: &ColumnIndex,
    line: u64,
) -> std::result::Result<UsageRecord, RowIssue> {
    let cell = |index: usize| row.get(index).unwrap_or("").trim();
    let issue = |column: &str, value: &str, reason: &str| RowIssue {
        line,
        column: column.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let non_empty = |index: usize, column: &str| {
        let value = cell(index);
        if value.is_empty() {
            Err(issue(column, value, "missing value"))
        } else {
            Ok(value.to_string())
        }
    };

    let user_id = non_empty(columns.user_id, COL_USER_ID)?;
    let app_name = non_empty(columns.app_name, COL_APP_NAME)?;
    let roast_category = non_empty(columns.category, COL_CATEGORY)?;

    let raw_usage = cell(columns.usage_minutes);
    let usage_minutes = parse_usage_minutes(raw_usage)
        .map_err(|reason| issue(COL_USAGE_MINUTES, raw_usage, reason))?;

    let raw_intensity = cell(columns.intensity);
    let roast_intensity = raw_intensity
        .parse::<Intensity>()
        .map_err(|_| issue(COL_INTENSITY, raw_intensity, "expected light, medium or brutal"))?;

    let raw_date = cell(columns.date);
    let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT)
        .map_err(|_| issue(COL_DATE, raw_date, "expected YYYY-MM-DD"))?;

    let secondary_category = columns
        .secondary_category
        .map(cell)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    Ok(UsageRecord {
        user_id,
        app_name,
        usage_minutes,
        roast_intensity,
        roast_category,
        secondary_category,
        date,
        day_of_week: None,
        usage_category: None,
    })
}

/// Blank cells are missing values; decimals are rounded to whole minutes.
fn parse_usage_minutes(raw: &str) -> std::result::Result<Option<u32>, &'static str> {
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(minutes) = raw.parse::<u32>() {
        return Ok(Some(minutes));
    }
    match raw.parse::<f64>() {
        Ok(value) if !value.is_finite() => Err("not a finite number"),
        Ok(value) if value < 0.0 => Err("must be non-negative"),
        Ok(value) if value > u32::MAX as f64 => Err("too large"),
        Ok(value) => Ok(Some(value.round() as u32)),
        Err(_) => Err("not a number"),
    }
}

/// Descriptive overview of a loaded dataset.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub rows: usize,
    pub unique_users: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub total_days: i64,
    pub app_distribution: BTreeMap<String, usize>,
    pub intensity_distribution: BTreeMap<Intensity, usize>,
}

impl DatasetInfo {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let mut users = std::collections::HashSet::new();
        let mut app_distribution = BTreeMap::new();
        let mut intensity_distribution = BTreeMap::new();

        for record in dataset.iter() {
            users.insert(record.user_id.as_str());
            *app_distribution.entry(record.app_name.clone()).or_insert(0) += 1;
            *intensity_distribution
                .entry(record.roast_intensity)
                .or_insert(0) += 1;
        }

        let start_date = dataset.iter().map(|r| r.date).min();
        let end_date = dataset.iter().map(|r| r.date).max();
        let total_days = match (start_date, end_date) {
            (Some(start), Some(end)) => (end - start).num_days() + 1,
            _ => 0,
        };

        Self {
            rows: dataset.len(),
            unique_users: users.len(),
            start_date,
            end_date,
            total_days,
            app_distribution,
            intensity_distribution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "userId,app_name,usage_minutes,roast_intensity,roast_category_1,roast_category_2,date";

    fn write_csv(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        write!(file, "{body}").unwrap();
        file
    }

    #[test]
    fn loads_valid_rows() {
        let file = write_csv(
            "user_001,Instagram,120,medium,health,,2025-07-15\n\
             user_002,TikTok,180,brutal,career,health,2025-07-16\n",
        );

        let (dataset, report) = DataLoader::new().load_with_report(file.path()).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(report.rows_read, 2);
        assert!(report.rejected.is_empty());

        let first = &dataset.records()[0];
        assert_eq!(first.user_id, "user_001");
        assert_eq!(first.usage_minutes, Some(120));
        assert_eq!(first.roast_intensity, Intensity::Medium);
        assert_eq!(first.secondary_category, None);
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2025, 7, 15).unwrap());
        assert_eq!(
            dataset.records()[1].secondary_category.as_deref(),
            Some("health")
        );
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let err = DataLoader::new()
            .load("/definitely/not/here/usage.csv")
            .unwrap_err();
        assert!(matches!(err, RoastError::DataLoad { .. }));
    }

    #[test]
    fn missing_required_column_is_a_load_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "userId,app_name,roast_intensity,date").unwrap();
        writeln!(file, "u1,Instagram,light,2025-07-15").unwrap();

        let err = DataLoader::new().load(file.path()).unwrap_err();
        match err {
            RoastError::DataLoad { reason, .. } => {
                assert!(reason.contains("usage_minutes"));
                assert!(reason.contains("roast_category_1"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn lenient_mode_drops_bad_rows() {
        let file = write_csv(
            "u1,Instagram,abc,medium,health,,2025-07-15\n\
             u2,TikTok,90,medium,career,,15/07/2025\n\
             u3,YouTube,45,savage,career,,2025-07-15\n\
             u4,Reddit,75.6,light,laziness,,2025-07-17\n",
        );

        let (dataset, report) = DataLoader::new().load_with_report(file.path()).unwrap();

        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.records()[0].usage_minutes, Some(76));
        assert_eq!(report.rejected.len(), 3);
        assert_eq!(report.rejected[0].column, COL_USAGE_MINUTES);
        assert_eq!(report.rejected[0].line, 2);
        assert_eq!(report.rejected[1].column, COL_DATE);
        assert_eq!(report.rejected[2].column, COL_INTENSITY);
    }

    #[test]
    fn strict_mode_lists_offending_rows() {
        let file = write_csv(
            "u1,Instagram,-5,medium,health,,2025-07-15\n\
             u2,TikTok,90,medium,career,,2025-07-16\n",
        );

        let err = DataLoader::new().strict(true).load(file.path()).unwrap_err();
        match err {
            RoastError::DataValidation { rows } => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].reason, "must be non-negative");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn blank_usage_is_missing_not_invalid() {
        let file = write_csv("u1,Instagram,,medium,health,,2025-07-15\n");

        let (dataset, report) = DataLoader::new().load_with_report(file.path()).unwrap();
        assert!(report.rejected.is_empty());
        assert_eq!(dataset.records()[0].usage_minutes, None);
    }

    #[test]
    fn dataset_info_summarizes_rows() {
        let file = write_csv(
            "u1,Instagram,120,medium,health,,2025-07-15\n\
             u1,TikTok,30,light,career,,2025-07-20\n\
             u2,Instagram,200,brutal,health,,2025-07-16\n",
        );
        let dataset = DataLoader::new().load(file.path()).unwrap();
        let info = DatasetInfo::from_dataset(&dataset);

        assert_eq!(info.rows, 3);
        assert_eq!(info.unique_users, 2);
        assert_eq!(info.total_days, 6);
        assert_eq!(info.app_distribution.get("Instagram"), Some(&2));
        assert_eq!(info.intensity_distribution.get(&Intensity::Brutal), Some(&1));
    }
}
