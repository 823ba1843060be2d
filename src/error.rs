//! Error taxonomy shared by the collaborator boundary, the aggregator and the
//! marking workflow.

use chrono::NaiveDate;
use std::time::Duration;
use thiserror::Error;

/// A single record-source request failed or returned data that could not be
/// decoded into typed records.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("record source unavailable: {0}")]
    Unavailable(String),

    #[error("backend returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("backend rejected request: {0}")]
    Rejected(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Malformed(err.to_string())
        } else {
            FetchError::Unavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Malformed(err.to_string())
    }
}

/// A monthly report could not be built. Partial results are never returned.
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("failed to fetch attendance for {date}")]
    Fetch {
        date: NaiveDate,
        #[source]
        source: FetchError,
    },

    #[error("failed to resolve student profiles for class {class_id}")]
    Directory {
        class_id: String,
        #[source]
        source: FetchError,
    },

    #[error("report not finished within {after:?}")]
    TimedOut { after: Duration },

    #[error("fetch task was cancelled")]
    Cancelled,
}

/// Input rejected before any read or write is attempted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("student {student_id} is marked in more than one bucket")]
    DuplicateStudent { student_id: String },

    #[error("unknown student {student_id}")]
    UnknownStudent { student_id: String },

    #[error("{field} must not be empty")]
    EmptyIdentifier { field: &'static str },

    #[error("{date} is not the first day of a month")]
    NotMonthStart { date: NaiveDate },

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("unknown mark '{0}'")]
    UnknownMark(String),
}
