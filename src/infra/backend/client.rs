use crate::analyzers::utility::format_ymd;
use crate::error::FetchError;
use crate::fetch::{BasicClient, HttpClient, fetch_bytes, post_json};
use crate::marking::NewAttendanceRecord;
use crate::model::{AttendanceFilter, AttendanceRecord, StudentRef};
use crate::parser::{parse_ack, parse_records, parse_students};
use crate::services::attendance_api::{AttendanceSink, AttendanceSource, StudentDirectory};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Url;
use std::time::Duration;

/// Page size requested when loading a class roster.
const ROSTER_LIMIT: &str = "500";

/// REST client for the school-management backend.
///
/// Implements every collaborator the aggregator and the marking workflow use.
pub struct BackendClient<C = BasicClient> {
    base_url: Url,
    http: C,
}

impl BackendClient<BasicClient> {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http = BasicClient::with_timeout(timeout)?;
        Self::with_client(base_url, http)
    }
}

impl<C: HttpClient> BackendClient<C> {
    pub fn with_client(base_url: &str, http: C) -> Result<Self, FetchError> {
        let base_url = Url::parse(base_url.trim_end_matches('/')).map_err(|e| {
            FetchError::Unavailable(format!("invalid backend url '{base_url}': {e}"))
        })?;
        Ok(Self { base_url, http })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                FetchError::Unavailable(format!("backend url '{}' cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn attendance_url(
        &self,
        date: NaiveDate,
        filter: &AttendanceFilter,
    ) -> Result<Url, FetchError> {
        let mut url = self.endpoint(&["api", "attendance"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("date", &format_ymd(date));
            if let Some(class_id) = filter.class_id() {
                query.append_pair("classId", class_id);
            }
            if let Some(timeslot_id) = filter.timeslot_id() {
                query.append_pair("timeslotId", timeslot_id);
            }
        }
        Ok(url)
    }

    pub(crate) fn roster_url(&self, class_id: &str) -> Result<Url, FetchError> {
        let mut url = self.endpoint(&["api", "students", "class", class_id])?;
        url.query_pairs_mut()
            .append_pair("limit", ROSTER_LIMIT)
            .append_pair("sortBy", "name")
            .append_pair("sortOrder", "asc");
        Ok(url)
    }
}

#[async_trait]
impl<C: HttpClient> AttendanceSource for BackendClient<C> {
    #[tracing::instrument(skip(self), fields(date = %date))]
    async fn fetch_attendance_records(
        &self,
        date: NaiveDate,
        filter: &AttendanceFilter,
    ) -> Result<Vec<AttendanceRecord>, FetchError> {
        let url = self.attendance_url(date, filter)?;
        let bytes = fetch_bytes(&self.http, url).await?;
        parse_records(&bytes)
    }
}

#[async_trait]
impl<C: HttpClient> StudentDirectory for BackendClient<C> {
    #[tracing::instrument(skip(self))]
    async fn fetch_students_by_class(&self, class_id: &str) -> Result<Vec<StudentRef>, FetchError> {
        let url = self.roster_url(class_id)?;
        let bytes = fetch_bytes(&self.http, url).await?;
        parse_students(&bytes)
    }
}

#[async_trait]
impl<C: HttpClient> AttendanceSink for BackendClient<C> {
    #[tracing::instrument(
        skip(self, record),
        fields(date = %record.date, class_id = %record.class_id)
    )]
    async fn write_attendance_record(
        &self,
        record: &NewAttendanceRecord,
    ) -> Result<(), FetchError> {
        let url = self.endpoint(&["api", "attendance"])?;
        let bytes = post_json(&self.http, url, record).await?;
        parse_ack(&bytes)
    }
}
