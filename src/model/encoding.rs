//! One-hot encoding of the categorical model inputs.
//!
//! The column layout is fixed when a model is trained and stored with it;
//! inference must encode through that stored [`FeatureSchema`] so a row
//! lines up with exactly the columns the regressor was fit on.

use std::collections::BTreeSet;
use std::fmt;

use ndarray::{Array1, Array2, ArrayViewMut1};
use serde::{Deserialize, Serialize};

use crate::data::models::{DayOfWeek, Intensity, UsageRecord};

/// The categorical inputs of a single prediction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub app_name: String,
    pub roast_intensity: Intensity,
    pub day_of_week: DayOfWeek,
}

impl FeatureRow {
    pub fn new(app_name: impl Into<String>, roast_intensity: Intensity, day_of_week: DayOfWeek) -> Self {
        Self {
            app_name: app_name.into(),
            roast_intensity,
            day_of_week,
        }
    }

    fn value_of(&self, feature: Feature) -> &str {
        match feature {
            Feature::AppName => &self.app_name,
            Feature::RoastIntensity => self.roast_intensity.as_str(),
            Feature::DayOfWeek => self.day_of_week.as_str(),
        }
    }
}

impl From<&UsageRecord> for FeatureRow {
    fn from(record: &UsageRecord) -> Self {
        Self {
            app_name: record.app_name.clone(),
            roast_intensity: record.roast_intensity,
            day_of_week: record.day(),
        }
    }
}

/// Source field of a one-hot column, in schema order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    AppName,
    RoastIntensity,
    DayOfWeek,
}

impl Feature {
    pub const ALL: [Feature; 3] = [Feature::AppName, Feature::RoastIntensity, Feature::DayOfWeek];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::AppName => "app_name",
            Feature::RoastIntensity => "roast_intensity",
            Feature::DayOfWeek => "day_of_week",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotColumn {
    pub feature: Feature,
    pub value: String,
}

impl fmt::Display for OneHotColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.feature.as_str(), self.value)
    }
}

/// Ordered one-hot columns: app names, then intensities, then days, each
/// block sorted by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<OneHotColumn>,
}

impl FeatureSchema {
    /// Builds the schema from the values seen in `rows`.
    pub fn fit<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a FeatureRow>,
    {
        let mut seen: [BTreeSet<String>; 3] = Default::default();
        for row in rows {
            for (slot, feature) in seen.iter_mut().zip(Feature::ALL) {
                slot.insert(row.value_of(feature).to_string());
            }
        }

        let columns = Feature::ALL
            .into_iter()
            .zip(seen)
            .flat_map(|(feature, values)| {
                values
                    .into_iter()
                    .map(move |value| OneHotColumn { feature, value })
            })
            .collect();

        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[OneHotColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(ToString::to_string).collect()
    }

    /// Encodes `row` into `0.0`/`1.0` values, one per column. A value never
    /// seen at fit time leaves its whole block at zero.
    pub fn encode(&self, row: &FeatureRow) -> Array1<f64> {
        let mut encoded = Array1::zeros(self.columns.len());
        self.fill(row, encoded.view_mut());
        encoded
    }

    /// Design matrix with one encoded row per item of `rows`.
    pub fn encode_rows<'a, I>(&self, rows: I) -> Array2<f64>
    where
        I: IntoIterator<Item = &'a FeatureRow>,
        I::IntoIter: ExactSizeIterator,
    {
        let rows = rows.into_iter();
        let mut matrix = Array2::zeros((rows.len(), self.columns.len()));
        for (row, out) in rows.zip(matrix.rows_mut()) {
            self.fill(row, out);
        }
        matrix
    }

    fn fill(&self, row: &FeatureRow, mut out: ArrayViewMut1<f64>) {
        for (slot, column) in out.iter_mut().zip(&self.columns) {
            if row.value_of(column.feature) == column.value {
                *slot = 1.0;
            }
        }
    }

    /// True when every categorical value of `row` has a column.
    pub fn covers(&self, row: &FeatureRow) -> bool {
        Feature::ALL.into_iter().all(|feature| {
            self.columns
                .iter()
                .any(|c| c.feature == feature && c.value == row.value_of(feature))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, s};

    fn rows() -> Vec<FeatureRow> {
        vec![
            FeatureRow::new("TikTok", Intensity::Brutal, DayOfWeek::Sunday),
            FeatureRow::new("Instagram", Intensity::Light, DayOfWeek::Monday),
            FeatureRow::new("Instagram", Intensity::Brutal, DayOfWeek::Sunday),
        ]
    }

    #[test]
    fn schema_orders_features_then_values() {
        let schema = FeatureSchema::fit(&rows());
        assert_eq!(
            schema.column_names(),
            vec![
                "app_name=Instagram",
                "app_name=TikTok",
                "roast_intensity=brutal",
                "roast_intensity=light",
                "day_of_week=Monday",
                "day_of_week=Sunday",
            ]
        );
    }

    #[test]
    fn schema_is_independent_of_row_order() {
        let mut reversed = rows();
        reversed.reverse();
        assert_eq!(FeatureSchema::fit(&rows()), FeatureSchema::fit(&reversed));
    }

    #[test]
    fn encode_sets_one_column_per_feature() {
        let schema = FeatureSchema::fit(&rows());
        let encoded = schema.encode(&FeatureRow::new("TikTok", Intensity::Light, DayOfWeek::Sunday));
        assert_eq!(encoded, array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn encode_rows_stacks_encoded_rows() {
        let schema = FeatureSchema::fit(&rows());
        let matrix = schema.encode_rows(&rows());

        assert_eq!(matrix.dim(), (3, schema.len()));
        assert_eq!(matrix.row(1), schema.encode(&rows()[1]));
        assert_eq!(matrix.sum(), 9.0);
    }

    #[test]
    fn unseen_values_encode_as_zero() {
        let schema = FeatureSchema::fit(&rows());
        let row = FeatureRow::new("UnknownApp123", Intensity::Medium, DayOfWeek::Sunday);

        let encoded = schema.encode(&row);

        assert_eq!(encoded.len(), schema.len());
        assert_eq!(encoded.slice(s![..4]), array![0.0, 0.0, 0.0, 0.0]);
        assert_eq!(encoded[5], 1.0);
        assert!(!schema.covers(&row));
    }
}
