//! Validation and submission of a marking session.

use crate::error::ValidationError;
use crate::model::{Mark, StudentRef};
use crate::services::attendance_api::{AttendanceSink, StudentDirectory};
use chrono::NaiveDate;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::info;

/// Payload written to the backend for one class/timeslot/date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAttendanceRecord {
    pub date: NaiveDate,
    #[serde(rename = "class")]
    pub class_id: String,
    #[serde(rename = "timeslot")]
    pub timeslot_id: String,
    pub total_students: u32,
    pub present_students: Vec<String>,
    pub absent_students: Vec<String>,
    pub late_students: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewAttendanceRecord {
    /// Attaches free-text notes; blank notes are dropped.
    pub fn with_notes(mut self, notes: Option<&str>) -> Self {
        self.notes = notes
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        self
    }
}

/// Marks of one session as `(student id, mark)` pairs, in input order.
///
/// Decodes from a `{ "<student id>": "<mark>" }` object without merging
/// repeated keys, so a student listed twice still reaches
/// [`validate_marking_payload`] twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkSheet(pub Vec<(String, Mark)>);

impl<'de> Deserialize<'de> for MarkSheet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SheetVisitor;

        impl<'de> Visitor<'de> for SheetVisitor {
            type Value = MarkSheet;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of student id to mark")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<MarkSheet, A::Error> {
                let mut marks = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, Mark>()? {
                    marks.push(entry);
                }
                Ok(MarkSheet(marks))
            }
        }

        deserializer.deserialize_map(SheetVisitor)
    }
}

/// Splits a roster into present/absent/late id lists according to `marks`.
///
/// Students without a mark, or marked `Unmarked`, land in no list. The whole
/// payload is rejected when a mark names a student outside the roster, when a
/// student is marked more than once, or when a student would end up in more
/// than one list.
pub fn validate_marking_payload(
    students: &[StudentRef],
    marks: &[(String, Mark)],
    class_id: &str,
    timeslot_id: &str,
    date: NaiveDate,
) -> Result<NewAttendanceRecord, ValidationError> {
    if class_id.trim().is_empty() {
        return Err(ValidationError::EmptyIdentifier { field: "class id" });
    }
    if timeslot_id.trim().is_empty() {
        return Err(ValidationError::EmptyIdentifier {
            field: "timeslot id",
        });
    }

    let roster: HashSet<&str> = students.iter().map(|s| s.id.as_str()).collect();
    let mut by_student: HashMap<&str, Mark> = HashMap::with_capacity(marks.len());
    for (student_id, mark) in marks {
        if !roster.contains(student_id.as_str()) {
            return Err(ValidationError::UnknownStudent {
                student_id: student_id.clone(),
            });
        }
        if by_student.insert(student_id.as_str(), *mark).is_some() {
            return Err(ValidationError::DuplicateStudent {
                student_id: student_id.clone(),
            });
        }
    }

    let mut present = Vec::new();
    let mut absent = Vec::new();
    let mut late = Vec::new();
    for student in students {
        match by_student.get(student.id.as_str()) {
            Some(Mark::Present) => present.push(student.id.clone()),
            Some(Mark::Absent) => absent.push(student.id.clone()),
            Some(Mark::Late) => late.push(student.id.clone()),
            Some(Mark::Unmarked) | None => {}
        }
    }

    let mut seen = HashSet::new();
    for id in present.iter().chain(&absent).chain(&late) {
        if !seen.insert(id.as_str()) {
            return Err(ValidationError::DuplicateStudent {
                student_id: id.clone(),
            });
        }
    }

    Ok(NewAttendanceRecord {
        date,
        class_id: class_id.trim().to_string(),
        timeslot_id: timeslot_id.trim().to_string(),
        total_students: students.len() as u32,
        present_students: present,
        absent_students: absent,
        late_students: late,
        notes: None,
    })
}

/// Fetches the class roster, validates `marks` against it and writes the
/// record. Nothing is written when validation fails.
#[tracing::instrument(skip(directory, sink, marks, notes), fields(date = %date))]
pub async fn submit_marking<D, W>(
    directory: &D,
    sink: &W,
    class_id: &str,
    timeslot_id: &str,
    date: NaiveDate,
    marks: &[(String, Mark)],
    notes: Option<&str>,
) -> anyhow::Result<NewAttendanceRecord>
where
    D: StudentDirectory + ?Sized,
    W: AttendanceSink + ?Sized,
{
    let roster = directory.fetch_students_by_class(class_id).await?;
    let record = validate_marking_payload(&roster, marks, class_id, timeslot_id, date)?
        .with_notes(notes);

    sink.write_attendance_record(&record).await?;
    info!(
        present = record.present_students.len(),
        absent = record.absent_students.len(),
        late = record.late_students.len(),
        "Attendance saved"
    );
    Ok(record)
}
