use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single analysis.
///
/// None of these is fatal: the analyzer records the failing analysis as not
/// run and carries on with the rest of the batch.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisError {
    /// Too few paired observations for a correlation.
    #[error("insufficient data: {required} paired observations required, but only {found} available")]
    InsufficientData { required: usize, found: usize },

    /// Too few groups left for a one-way comparison.
    #[error("insufficient groups: at least 2 groups required, but only {found} remain")]
    InsufficientGroups { found: usize },

    /// Grouping field does not resolve to exactly two categories.
    #[error("invalid group count: exactly 2 groups required, but found {found}")]
    InvalidGroupCount { found: usize },

    /// Statistic is undefined for the given values.
    #[error("undefined statistic: {reason}")]
    UndefinedStatistic { reason: String },

    #[error("unknown field {field:?}")]
    UnknownField { field: String },

    #[error("field {field:?} is not {expected}")]
    FieldType { field: String, expected: String },

    #[error("invalid dataset schema: {reason}")]
    Schema { reason: String },
}

impl AnalysisError {
    pub fn undefined(reason: impl Into<String>) -> Self {
        Self::UndefinedStatistic {
            reason: reason.into(),
        }
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
