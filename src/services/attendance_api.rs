//! Traits for the collaborators the aggregator and the marking workflow
//! depend on.

use crate::error::FetchError;
use crate::marking::NewAttendanceRecord;
use crate::model::{AttendanceFilter, AttendanceRecord, StudentRef};
use chrono::NaiveDate;
use std::sync::Arc;

/// Source of daily attendance records.
///
/// Must be safe to call concurrently for distinct dates.
#[async_trait::async_trait]
pub trait AttendanceSource: Send + Sync {
    /// Returns every record for `date` that matches `filter`. No match is an
    /// empty list, not an error.
    async fn fetch_attendance_records(
        &self,
        date: NaiveDate,
        filter: &AttendanceFilter,
    ) -> Result<Vec<AttendanceRecord>, FetchError>;
}

/// Lookup of class rosters.
#[async_trait::async_trait]
pub trait StudentDirectory: Send + Sync {
    async fn fetch_students_by_class(&self, class_id: &str) -> Result<Vec<StudentRef>, FetchError>;
}

/// Persists validated attendance records.
#[async_trait::async_trait]
pub trait AttendanceSink: Send + Sync {
    async fn write_attendance_record(&self, record: &NewAttendanceRecord) -> Result<(), FetchError>;
}

#[async_trait::async_trait]
impl<T: AttendanceSource + ?Sized> AttendanceSource for Arc<T> {
    async fn fetch_attendance_records(
        &self,
        date: NaiveDate,
        filter: &AttendanceFilter,
    ) -> Result<Vec<AttendanceRecord>, FetchError> {
        (**self).fetch_attendance_records(date, filter).await
    }
}

#[async_trait::async_trait]
impl<T: StudentDirectory + ?Sized> StudentDirectory for Arc<T> {
    async fn fetch_students_by_class(&self, class_id: &str) -> Result<Vec<StudentRef>, FetchError> {
        (**self).fetch_students_by_class(class_id).await
    }
}

#[async_trait::async_trait]
impl<T: AttendanceSink + ?Sized> AttendanceSink for Arc<T> {
    async fn write_attendance_record(
        &self,
        record: &NewAttendanceRecord,
    ) -> Result<(), FetchError> {
        (**self).write_attendance_record(record).await
    }
}
