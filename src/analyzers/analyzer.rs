use crate::analyzers::aggregate::TallyTable;
use crate::analyzers::types::StudentTally;
use crate::error::{AggregationError, FetchError};
use crate::model::{AttendanceFilter, AttendanceRecord, MonthStart};
use crate::services::attendance_api::{AttendanceSource, StudentDirectory};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, warn};

pub const DEFAULT_CONCURRENCY: usize = 8;

/// Builds daily summaries and monthly per-student reports from an
/// [`AttendanceSource`].
///
/// Each call owns its tally table; nothing is shared between calls.
pub struct AttendanceAggregator<S: ?Sized> {
    source: Arc<S>,
    directory: Option<Arc<dyn StudentDirectory>>,
    concurrency: usize,
    deadline: Option<Duration>,
}

impl<S> AttendanceAggregator<S>
where
    S: AttendanceSource + ?Sized + 'static,
{
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            directory: None,
            concurrency: DEFAULT_CONCURRENCY,
            deadline: None,
        }
    }

    /// Resolves names for students that appear in records as bare ids.
    pub fn with_directory(mut self, directory: Arc<dyn StudentDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Maximum number of per-day fetches in flight. Clamped to at least 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Fails a monthly report that is not finished within `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// All records of `date` matching `filter`, in source order.
    #[tracing::instrument(skip(self), fields(date = %date))]
    pub async fn compute_daily_summary(
        &self,
        date: NaiveDate,
        filter: &AttendanceFilter,
    ) -> Result<Vec<AttendanceRecord>, FetchError> {
        fetch_day(self.source.as_ref(), date, filter).await
    }

    /// Per-student tallies over every day of `month`, sorted by name.
    ///
    /// All-or-nothing: the first failed day fails the whole report and the
    /// remaining fetches are abandoned.
    #[tracing::instrument(skip(self), fields(month = %month.date()))]
    pub async fn compute_monthly_report(
        &self,
        month: MonthStart,
        filter: &AttendanceFilter,
    ) -> Result<Vec<StudentTally>, AggregationError> {
        let report = self.build_monthly_report(month, filter);
        match self.deadline {
            Some(after) => tokio::time::timeout(after, report)
                .await
                .map_err(|_| AggregationError::TimedOut { after })?,
            None => report.await,
        }
    }

    async fn build_monthly_report(
        &self,
        month: MonthStart,
        filter: &AttendanceFilter,
    ) -> Result<Vec<StudentTally>, AggregationError> {
        let records = self.fetch_month(month, filter).await?;
        let mut table = TallyTable::fold(&records);
        self.resolve_profiles(&mut table).await?;

        let tallies = table.into_tallies();
        info!(
            records = records.len(),
            students = tallies.len(),
            "Monthly report built"
        );
        Ok(tallies)
    }

    async fn fetch_month(
        &self,
        month: MonthStart,
        filter: &AttendanceFilter,
    ) -> Result<Vec<AttendanceRecord>, AggregationError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        // Dropping the set aborts every fetch still in flight.
        let mut tasks = JoinSet::new();

        for date in month.days() {
            let sem = semaphore.clone();
            let source = self.source.clone();
            let filter = filter.clone();
            let day_span = tracing::info_span!("fetch_day", date = %date);

            tasks.spawn(
                async move {
                    let Ok(_permit) = sem.acquire().await else {
                        let closed = FetchError::Unavailable("fetch pool closed".into());
                        return (date, Err(closed));
                    };
                    let result = fetch_day(source.as_ref(), date, &filter).await;
                    (date, result)
                }
                .instrument(day_span),
            );
        }

        let mut records = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (date, result) = joined.map_err(|e| {
                warn!(error = %e, "Fetch task did not complete");
                AggregationError::Cancelled
            })?;
            match result {
                Ok(day) => records.extend(day),
                Err(source) => {
                    warn!(date = %date, error = %source, "Daily fetch failed, abandoning report");
                    tasks.abort_all();
                    return Err(AggregationError::Fetch { date, source });
                }
            }
        }

        Ok(records)
    }

    async fn resolve_profiles(&self, table: &mut TallyTable) -> Result<(), AggregationError> {
        let lookups = table.pending_lookups();
        if lookups.is_empty() {
            return Ok(());
        }
        let Some(directory) = &self.directory else {
            debug!(
                classes = lookups.len(),
                "No student directory attached, leaving unresolved profiles"
            );
            return Ok(());
        };

        for (class_id, missing) in lookups {
            debug!(class_id = %class_id, missing, "Resolving student profiles");
            let roster = directory
                .fetch_students_by_class(&class_id)
                .await
                .map_err(|source| AggregationError::Directory {
                    class_id: class_id.clone(),
                    source,
                })?;
            table.resolve_from_roster(&roster);
        }
        Ok(())
    }
}

/// Everything the source returned for `date` under `filter`.
///
/// The source owns bucketing: a record it files under `date` is kept even if
/// its own timestamp normalizes to a neighbouring UTC day.
async fn fetch_day<S: AttendanceSource + ?Sized>(
    source: &S,
    date: NaiveDate,
    filter: &AttendanceFilter,
) -> Result<Vec<AttendanceRecord>, FetchError> {
    let records = source.fetch_attendance_records(date, filter).await?;
    let off_date = records.iter().filter(|r| r.date() != date).count();
    if off_date > 0 {
        debug!(off_date, "Source filed records dated on another day");
    }
    Ok(records)
}
