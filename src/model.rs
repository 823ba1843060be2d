//! Typed attendance data as seen by the aggregator.
//!
//! Nothing in here is untyped: the [`parser`](crate::parser) module is the only
//! place that looks at raw backend JSON, and it produces these types or a
//! [`FetchError`](crate::error::FetchError).

use crate::analyzers::utility::{month_days, parse_ymd};
use crate::error::ValidationError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Display placeholder for a student whose profile could not be resolved.
pub const UNKNOWN_PROFILE: &str = "—";

/// A student as referenced from an attendance record or a class roster.
///
/// `name` and `reg_no` are `None` when the backend returned a bare id instead
/// of a populated profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentRef {
    pub id: String,
    pub name: Option<String>,
    pub reg_no: Option<String>,
}

impl StudentRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, reg_no: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            reg_no: Some(reg_no.into()),
        }
    }

    pub fn bare(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            reg_no: None,
        }
    }

    pub fn has_profile(&self) -> bool {
        self.name.is_some() || self.reg_no.is_some()
    }
}

/// One marking session outcome for a class and timeslot on one day.
///
/// The three buckets are pairwise disjoint; this is checked by
/// [`AttendanceRecordBuilder::build`] and cannot be broken afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    date: NaiveDate,
    class_id: String,
    timeslot_id: String,
    total_students: u32,
    present: Vec<StudentRef>,
    absent: Vec<StudentRef>,
    late: Vec<StudentRef>,
    notes: Option<String>,
}

impl AttendanceRecord {
    pub fn builder(
        date: NaiveDate,
        class_id: impl Into<String>,
        timeslot_id: impl Into<String>,
    ) -> AttendanceRecordBuilder {
        AttendanceRecordBuilder {
            date,
            class_id: class_id.into(),
            timeslot_id: timeslot_id.into(),
            total_students: 0,
            present: Vec::new(),
            absent: Vec::new(),
            late: Vec::new(),
            notes: None,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    pub fn timeslot_id(&self) -> &str {
        &self.timeslot_id
    }

    pub fn total_students(&self) -> u32 {
        self.total_students
    }

    pub fn present(&self) -> &[StudentRef] {
        &self.present
    }

    pub fn absent(&self) -> &[StudentRef] {
        &self.absent
    }

    pub fn late(&self) -> &[StudentRef] {
        &self.late
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// All marked students of this record together with their mark.
    pub fn marked(&self) -> impl Iterator<Item = (&StudentRef, Mark)> {
        self.present
            .iter()
            .map(|s| (s, Mark::Present))
            .chain(self.absent.iter().map(|s| (s, Mark::Absent)))
            .chain(self.late.iter().map(|s| (s, Mark::Late)))
    }
}

#[derive(Debug)]
pub struct AttendanceRecordBuilder {
    date: NaiveDate,
    class_id: String,
    timeslot_id: String,
    total_students: u32,
    present: Vec<StudentRef>,
    absent: Vec<StudentRef>,
    late: Vec<StudentRef>,
    notes: Option<String>,
}

impl AttendanceRecordBuilder {
    pub fn total_students(mut self, total: u32) -> Self {
        self.total_students = total;
        self
    }

    pub fn present(mut self, students: Vec<StudentRef>) -> Self {
        self.present = students;
        self
    }

    pub fn absent(mut self, students: Vec<StudentRef>) -> Self {
        self.absent = students;
        self
    }

    pub fn late(mut self, students: Vec<StudentRef>) -> Self {
        self.late = students;
        self
    }

    pub fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Validates the record.
    ///
    /// Repeated entries inside one bucket collapse to the first occurrence, so a
    /// record never contributes more than one mark per student. A student found
    /// in two different buckets is rejected.
    pub fn build(self) -> Result<AttendanceRecord, ValidationError> {
        if self.class_id.trim().is_empty() {
            return Err(ValidationError::EmptyIdentifier { field: "class id" });
        }
        if self.timeslot_id.trim().is_empty() {
            return Err(ValidationError::EmptyIdentifier {
                field: "timeslot id",
            });
        }

        let present = dedup_bucket(self.present);
        let absent = dedup_bucket(self.absent);
        let late = dedup_bucket(self.late);

        let mut seen = HashSet::new();
        for student in present.iter().chain(&absent).chain(&late) {
            if !seen.insert(student.id.as_str()) {
                return Err(ValidationError::DuplicateStudent {
                    student_id: student.id.clone(),
                });
            }
        }

        Ok(AttendanceRecord {
            date: self.date,
            class_id: self.class_id,
            timeslot_id: self.timeslot_id,
            total_students: self.total_students,
            present,
            absent,
            late,
            notes: self.notes,
        })
    }
}

fn dedup_bucket(students: Vec<StudentRef>) -> Vec<StudentRef> {
    let mut seen = HashSet::new();
    students
        .into_iter()
        .filter(|s| seen.insert(s.id.clone()))
        .collect()
}

/// Per-student outcome chosen in the marking workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    Present,
    Absent,
    Late,
    Unmarked,
}

impl FromStr for Mark {
    type Err = ValidationError;

    /// Accepts exactly the lowercase names used on the wire.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(Mark::Present),
            "absent" => Ok(Mark::Absent),
            "late" => Ok(Mark::Late),
            "unmarked" => Ok(Mark::Unmarked),
            other => Err(ValidationError::UnknownMark(other.to_string())),
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mark::Present => "present",
            Mark::Absent => "absent",
            Mark::Late => "late",
            Mark::Unmarked => "unmarked",
        };
        f.write_str(s)
    }
}

/// Optional class/timeslot narrowing for record lookups.
///
/// Also the cache key component of a daily lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AttendanceFilter {
    class_id: Option<String>,
    timeslot_id: Option<String>,
}

impl AttendanceFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Builds a filter, rejecting identifiers that are present but blank.
    pub fn new(
        class_id: Option<String>,
        timeslot_id: Option<String>,
    ) -> Result<Self, ValidationError> {
        let class_id = non_empty(class_id, "class filter")?;
        let timeslot_id = non_empty(timeslot_id, "timeslot filter")?;
        Ok(Self {
            class_id,
            timeslot_id,
        })
    }

    pub fn class_id(&self) -> Option<&str> {
        self.class_id.as_deref()
    }

    pub fn timeslot_id(&self) -> Option<&str> {
        self.timeslot_id.as_deref()
    }

    /// Whether `record` falls into this filter.
    pub fn matches(&self, record: &AttendanceRecord) -> bool {
        self.class_id
            .as_deref()
            .is_none_or(|c| c == record.class_id())
            && self
                .timeslot_id
                .as_deref()
                .is_none_or(|t| t == record.timeslot_id())
    }
}

fn non_empty(
    value: Option<String>,
    field: &'static str,
) -> Result<Option<String>, ValidationError> {
    match value {
        Some(v) if v.trim().is_empty() => Err(ValidationError::EmptyIdentifier { field }),
        Some(v) => Ok(Some(v.trim().to_string())),
        None => Ok(None),
    }
}

/// The first day of a calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthStart(NaiveDate);

impl MonthStart {
    /// Accepts only first-of-month dates; other days are rejected, not rounded.
    pub fn new(date: NaiveDate) -> Result<Self, ValidationError> {
        if date.day() == 1 {
            Ok(Self(date))
        } else {
            Err(ValidationError::NotMonthStart { date })
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Every calendar day of the month, in order.
    pub fn days(&self) -> Vec<NaiveDate> {
        month_days(self.0)
    }
}

impl FromStr for MonthStart {
    type Err = ValidationError;

    /// Parses `YYYY-MM` or `YYYY-MM-01`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let date = if s.len() == 7 {
            parse_ymd(&format!("{s}-01"))?
        } else {
            parse_ymd(s)?
        };
        Self::new(date)
    }
}

impl fmt::Display for MonthStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%B %Y"))
    }
}
