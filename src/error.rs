use std::path::PathBuf;

use thiserror::Error;

use crate::data::RowIssue;

/// The result type used by the pipeline stages.
pub type Result<T> = std::result::Result<T, RoastError>;

/// Errors raised by the pipeline stages.
///
/// `DataLoad`, `InsufficientData` and `InvalidConfig` abort a run.
/// `DataValidation` is only surfaced in strict loading mode; the lenient
/// loader drops the offending rows instead. The roast lookup errors only
/// affect the user being rendered, and the API errors are recovered by the
/// Gemini client's offline placeholder.
#[derive(Debug, Error)]
pub enum RoastError {
    #[error("failed to load dataset from {}: {reason}", path.display())]
    DataLoad { path: PathBuf, reason: String },

    #[error("{} row(s) failed validation, first: {}", rows.len(), first_issue(rows))]
    DataValidation { rows: Vec<RowIssue> },

    #[error("insufficient data for {stage}: need at least {required} rows, got {available}")]
    InsufficientData {
        stage: &'static str,
        required: usize,
        available: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown app: {0}")]
    UnknownApp(String),

    #[error("unknown roast category: {0}")]
    UnknownCategory(String),

    #[error("unknown roast intensity: {0}")]
    UnknownIntensity(String),

    #[error("text generation API unavailable: {0}")]
    ApiUnavailable(String),

    #[error("text generation API rejected credentials: {0}")]
    Auth(String),
}

fn first_issue(rows: &[RowIssue]) -> String {
    rows.first()
        .map(ToString::to_string)
        .unwrap_or_else(|| "none".to_string())
}

impl RoastError {
    pub(crate) fn data_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        RoastError::DataLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that only invalidate a single user's roast.
    pub fn is_per_user(&self) -> bool {
        matches!(
            self,
            RoastError::UnknownApp(_)
                | RoastError::UnknownCategory(_)
                | RoastError::UnknownIntensity(_)
        )
    }
}
