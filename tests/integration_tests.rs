use attendance_rater::analyzers::analyzer::AttendanceAggregator;
use attendance_rater::error::{AggregationError, FetchError, ValidationError};
use attendance_rater::marking::{MarkSheet, NewAttendanceRecord, submit_marking};
use attendance_rater::model::{AttendanceFilter, AttendanceRecord, Mark, MonthStart, StudentRef};
use attendance_rater::services::attendance_api::{
    AttendanceSink, AttendanceSource, StudentDirectory,
};
use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn april(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
}

fn april_2024() -> MonthStart {
    MonthStart::new(april(1)).unwrap()
}

/// In-memory record source with optional per-day delay and failure injection.
#[derive(Default)]
struct MemorySource {
    days: HashMap<NaiveDate, Vec<AttendanceRecord>>,
    failing: Option<NaiveDate>,
    delay: Option<fn(NaiveDate) -> Duration>,
    reversed: bool,
}

impl MemorySource {
    fn with_records(records: Vec<AttendanceRecord>) -> Self {
        let mut days: HashMap<NaiveDate, Vec<AttendanceRecord>> = HashMap::new();
        for record in records {
            days.entry(record.date()).or_default().push(record);
        }
        Self {
            days,
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl AttendanceSource for MemorySource {
    async fn fetch_attendance_records(
        &self,
        date: NaiveDate,
        filter: &AttendanceFilter,
    ) -> Result<Vec<AttendanceRecord>, FetchError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay(date)).await;
        }
        if self.failing == Some(date) {
            return Err(FetchError::Status {
                status: 503,
                message: "Service Unavailable".into(),
            });
        }
        let mut records: Vec<_> = self
            .days
            .get(&date)
            .map(|r| r.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();
        if self.reversed {
            records.reverse();
        }
        Ok(records)
    }
}

fn record(
    day: u32,
    class: &str,
    timeslot: &str,
    present: Vec<StudentRef>,
    absent: Vec<StudentRef>,
    late: Vec<StudentRef>,
) -> AttendanceRecord {
    AttendanceRecord::builder(april(day), class, timeslot)
        .total_students((present.len() + absent.len() + late.len()) as u32)
        .present(present)
        .absent(absent)
        .late(late)
        .build()
        .unwrap()
}

fn student_s() -> StudentRef {
    StudentRef::new("s", "Sam Student", "REG-100")
}

/// One record per April day: 20 present, 5 absent, 5 late.
fn april_for_student_s() -> Vec<AttendanceRecord> {
    (1..=30)
        .map(|day| match day {
            1..=20 => record(day, "c1", "t1", vec![student_s()], vec![], vec![]),
            21..=25 => record(day, "c1", "t1", vec![], vec![student_s()], vec![]),
            _ => record(day, "c1", "t1", vec![], vec![], vec![student_s()]),
        })
        .collect()
}

/// A mixed month: three students, two classes, two timeslots.
fn mixed_month() -> Vec<AttendanceRecord> {
    let ann = StudentRef::new("a", "Ann", "R-1");
    let bob = StudentRef::new("b", "Bob", "R-2");
    let cid = StudentRef::new("c", "Cid", "R-3");

    let mut records = Vec::new();
    for day in 1..=30 {
        let (p, a, l) = match day % 3 {
            0 => (vec![ann.clone(), bob.clone()], vec![], vec![cid.clone()]),
            1 => (vec![ann.clone()], vec![bob.clone()], vec![]),
            _ => (vec![], vec![ann.clone()], vec![bob.clone(), cid.clone()]),
        };
        records.push(record(day, "c1", "t1", p, a, l));
        if day % 2 == 0 {
            records.push(record(day, "c2", "t2", vec![cid.clone()], vec![], vec![]));
        }
    }
    records
}

#[tokio::test]
async fn test_april_scenario_percentage() {
    let source = MemorySource::with_records(april_for_student_s());
    let aggregator = AttendanceAggregator::new(Arc::new(source));

    let tallies = aggregator
        .compute_monthly_report(april_2024(), &AttendanceFilter::all())
        .await
        .expect("report should build");

    assert_eq!(tallies.len(), 1);
    let s = &tallies[0];
    assert_eq!(s.student_id, "s");
    assert_eq!(s.name, "Sam Student");
    assert_eq!(s.reg_no, "REG-100");
    assert_eq!((s.present, s.absent, s.late), (20, 5, 5));
    assert_eq!(s.percentage, 67);
}

#[tokio::test]
async fn test_one_failed_day_fails_whole_month() {
    let mut source = MemorySource::with_records(april_for_student_s());
    source.failing = Some(april(14));
    let aggregator = AttendanceAggregator::new(Arc::new(source));

    let result = aggregator
        .compute_monthly_report(april_2024(), &AttendanceFilter::all())
        .await;

    match result {
        Err(AggregationError::Fetch { date, source }) => {
            assert_eq!(date, april(14));
            assert!(matches!(source, FetchError::Status { status: 503, .. }));
        }
        other => panic!("expected fetch failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_day_is_empty_list() {
    let source = MemorySource::with_records(april_for_student_s());
    let aggregator = AttendanceAggregator::new(Arc::new(source));
    let may_first = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

    let records = aggregator
        .compute_daily_summary(may_first, &AttendanceFilter::all())
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_report_independent_of_fetch_order() {
    let sequential = AttendanceAggregator::new(Arc::new(MemorySource::with_records(mixed_month())))
        .with_concurrency(1);

    let mut shuffled = MemorySource::with_records(mixed_month());
    shuffled.reversed = true;
    // Later days finish first.
    shuffled.delay = Some(|date| Duration::from_millis(u64::from(31 - date.day())));
    let concurrent = AttendanceAggregator::new(Arc::new(shuffled)).with_concurrency(30);

    let filter = AttendanceFilter::all();
    let a = sequential.compute_monthly_report(april_2024(), &filter).await.unwrap();
    let b = concurrent.compute_monthly_report(april_2024(), &filter).await.unwrap();

    assert_eq!(a, b);
    assert_eq!(a.len(), 3);
}

#[tokio::test]
async fn test_report_is_idempotent() {
    let aggregator =
        AttendanceAggregator::new(Arc::new(MemorySource::with_records(mixed_month())));
    let filter = AttendanceFilter::all();

    let first = aggregator.compute_monthly_report(april_2024(), &filter).await.unwrap();
    let second = aggregator.compute_monthly_report(april_2024(), &filter).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_percentages_in_range_and_consistent() {
    let aggregator =
        AttendanceAggregator::new(Arc::new(MemorySource::with_records(mixed_month())));

    let tallies = aggregator
        .compute_monthly_report(april_2024(), &AttendanceFilter::all())
        .await
        .unwrap();

    for t in &tallies {
        let total = t.total_marks();
        assert!(total > 0, "students without marks must not be reported");
        assert!(t.percentage <= 100);
        let expected = (f64::from(t.present) / f64::from(total) * 100.0).round() as u8;
        assert_eq!(t.percentage, expected, "student {}", t.student_id);
    }

    let names: Vec<_> = tallies.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Ann", "Bob", "Cid"]);
}

#[tokio::test]
async fn test_filter_narrows_monthly_report() {
    let aggregator =
        AttendanceAggregator::new(Arc::new(MemorySource::with_records(mixed_month())));
    let filter = AttendanceFilter::new(Some("c2".into()), Some("t2".into())).unwrap();

    let tallies = aggregator.compute_monthly_report(april_2024(), &filter).await.unwrap();

    assert_eq!(tallies.len(), 1);
    assert_eq!(tallies[0].name, "Cid");
    assert_eq!((tallies[0].present, tallies[0].absent, tallies[0].late), (15, 0, 0));
    assert_eq!(tallies[0].percentage, 100);
}

#[tokio::test]
async fn test_report_deadline() {
    let mut source = MemorySource::with_records(april_for_student_s());
    source.delay = Some(|date| {
        if date.day() == 30 {
            Duration::from_secs(30)
        } else {
            Duration::ZERO
        }
    });
    let aggregator =
        AttendanceAggregator::new(Arc::new(source)).with_deadline(Duration::from_millis(50));

    let result = aggregator
        .compute_monthly_report(april_2024(), &AttendanceFilter::all())
        .await;

    assert!(matches!(result, Err(AggregationError::TimedOut { .. })));
}

#[test]
fn test_month_start_must_be_first_day() {
    assert_eq!(
        MonthStart::new(april(15)).unwrap_err(),
        ValidationError::NotMonthStart { date: april(15) }
    );
}

#[derive(Default)]
struct MemoryBackend {
    roster: Vec<StudentRef>,
    written: Mutex<Vec<NewAttendanceRecord>>,
}

#[async_trait::async_trait]
impl StudentDirectory for MemoryBackend {
    async fn fetch_students_by_class(
        &self,
        _class_id: &str,
    ) -> Result<Vec<StudentRef>, FetchError> {
        Ok(self.roster.clone())
    }
}

#[async_trait::async_trait]
impl AttendanceSink for MemoryBackend {
    async fn write_attendance_record(
        &self,
        record: &NewAttendanceRecord,
    ) -> Result<(), FetchError> {
        self.written.lock().unwrap().push(record.clone());
        Ok(())
    }
}

fn backend() -> MemoryBackend {
    MemoryBackend {
        roster: vec![
            StudentRef::new("x", "Xena", "R-X"),
            StudentRef::new("y", "Yuri", "R-Y"),
        ],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_marking_present_and_late_is_rejected_without_write() {
    let backend = backend();
    let marks = vec![("x".to_string(), Mark::Present), ("x".to_string(), Mark::Late)];

    let result = submit_marking(&backend, &backend, "c1", "t1", april(8), &marks, None).await;

    let err = result.unwrap_err();
    assert_eq!(
        err.downcast_ref::<ValidationError>(),
        Some(&ValidationError::DuplicateStudent {
            student_id: "x".into()
        })
    );
    assert!(backend.written.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_marking_writes_validated_record() {
    let backend = backend();
    let marks = vec![("y".to_string(), Mark::Absent), ("x".to_string(), Mark::Present)];

    let record = submit_marking(
        &backend,
        &backend,
        "c1",
        "t1",
        april(8),
        &marks,
        Some("rainy day"),
    )
    .await
    .unwrap();

    assert_eq!(record.present_students, vec!["x"]);
    assert_eq!(record.absent_students, vec!["y"]);
    assert_eq!(record.total_students, 2);
    assert_eq!(record.notes.as_deref(), Some("rainy day"));
    assert_eq!(backend.written.lock().unwrap().as_slice(), &[record]);
}

#[tokio::test]
async fn test_marks_file_with_repeated_student_is_rejected_without_write() {
    let backend = backend();
    let sheet: MarkSheet = serde_json::from_str(r#"{"x":"present","y":"absent","x":"late"}"#)
        .expect("marks file should decode");

    let result = submit_marking(&backend, &backend, "c1", "t1", april(8), &sheet.0, None).await;

    let err = result.unwrap_err();
    assert_eq!(
        err.downcast_ref::<ValidationError>(),
        Some(&ValidationError::DuplicateStudent {
            student_id: "x".into()
        })
    );
    assert!(backend.written.lock().unwrap().is_empty());
}
