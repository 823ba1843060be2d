use crate::error::FetchError;
use crate::marking::NewAttendanceRecord;
use crate::model::{AttendanceFilter, AttendanceRecord};
use crate::services::attendance_api::{AttendanceSink, AttendanceSource};
use async_trait::async_trait;
use chrono::NaiveDate;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

type DayKey = (NaiveDate, AttendanceFilter);

/// Caches daily record lookups of an inner source.
///
/// Entries are keyed on `(date, filter)`. Writing a record through this
/// wrapper drops every cached lookup whose filter covers the written
/// class/timeslot on that date, so reads after a write always see it.
///
/// A lookup that misses only stores its result if no write finished while it
/// was in flight; `writes` is the write count, held shared by inserting reads
/// and exclusively by invalidating writes.
pub struct CachedSource<S> {
    inner: S,
    days: Cache<DayKey, Arc<Vec<AttendanceRecord>>>,
    writes: RwLock<u64>,
}

impl<S> CachedSource<S> {
    pub fn new(inner: S, ttl: Duration, max_capacity: u64) -> Self {
        Self {
            inner,
            days: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            writes: RwLock::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Drops every cached lookup that could contain a record for
    /// `class_id`/`timeslot_id` on `date`.
    pub async fn invalidate_bucket(&self, date: NaiveDate, class_id: &str, timeslot_id: &str) {
        let class = [None, Some(class_id.to_string())];
        let timeslot = [None, Some(timeslot_id.to_string())];
        for c in &class {
            for t in &timeslot {
                if let Ok(filter) = AttendanceFilter::new(c.clone(), t.clone()) {
                    self.days.invalidate(&(date, filter)).await;
                }
            }
        }
    }
}

#[async_trait]
impl<S: AttendanceSource> AttendanceSource for CachedSource<S> {
    async fn fetch_attendance_records(
        &self,
        date: NaiveDate,
        filter: &AttendanceFilter,
    ) -> Result<Vec<AttendanceRecord>, FetchError> {
        let key = (date, filter.clone());
        if let Some(hit) = self.days.get(&key).await {
            debug!(date = %date, "Daily lookup served from cache");
            return Ok(hit.as_ref().clone());
        }

        let seen = *self.writes.read().await;
        let records = self.inner.fetch_attendance_records(date, filter).await?;

        let writes = self.writes.read().await;
        if *writes == seen {
            self.days.insert(key, Arc::new(records.clone())).await;
        } else {
            debug!(date = %date, "Write landed during lookup, not caching");
        }
        Ok(records)
    }
}

#[async_trait]
impl<S: AttendanceSink> AttendanceSink for CachedSource<S> {
    async fn write_attendance_record(
        &self,
        record: &NewAttendanceRecord,
    ) -> Result<(), FetchError> {
        let result = self.inner.write_attendance_record(record).await;
        // The write may have landed even if the acknowledgement failed.
        let mut writes = self.writes.write().await;
        *writes = writes.wrapping_add(1);
        self.invalidate_bucket(record.date, &record.class_id, &record.timeslot_id)
            .await;
        result
    }
}
