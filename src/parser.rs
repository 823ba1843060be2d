//! Decoder for backend JSON responses.
//!
//! Every backend payload is wrapped as `{ "success": bool, "data": ..., "message": ... }`.
//! Referenced documents (class, timeslot, students) may arrive populated or as
//! bare ids. Everything is checked here so the aggregator only ever sees typed
//! [`AttendanceRecord`]s.

use crate::analyzers::utility::normalize_date;
use crate::error::FetchError;
use crate::model::{AttendanceRecord, StudentRef};
use serde::Deserialize;
use serde::de::DeserializeOwned;

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Populated<T> {
    Id(String),
    Doc(T),
}

#[derive(Deserialize)]
struct IdDoc {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Deserialize)]
struct StudentDoc {
    #[serde(rename = "_id")]
    id: String,
    name: Option<String>,
    #[serde(rename = "regNo")]
    reg_no: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordDoc {
    date: String,
    class: Option<Populated<IdDoc>>,
    timeslot: Option<Populated<IdDoc>>,
    #[serde(default)]
    total_students: u32,
    #[serde(default)]
    present_students: Vec<Populated<StudentDoc>>,
    #[serde(default)]
    absent_students: Vec<Populated<StudentDoc>>,
    #[serde(default)]
    late_students: Vec<Populated<StudentDoc>>,
    notes: Option<String>,
}

impl Populated<IdDoc> {
    fn into_id(self) -> String {
        match self {
            Populated::Id(id) => id,
            Populated::Doc(doc) => doc.id,
        }
    }
}

impl From<Populated<StudentDoc>> for StudentRef {
    fn from(p: Populated<StudentDoc>) -> Self {
        match p {
            Populated::Id(id) => StudentRef::bare(id),
            Populated::Doc(doc) => StudentRef {
                id: doc.id,
                name: doc.name.filter(|n| !n.trim().is_empty()),
                reg_no: doc.reg_no.filter(|r| !r.trim().is_empty()),
            },
        }
    }
}

fn open_envelope<T: DeserializeOwned>(bytes: &[u8]) -> Result<Option<T>, FetchError> {
    let envelope: Envelope<T> = serde_json::from_slice(bytes)?;
    if !envelope.success {
        return Err(FetchError::Rejected(
            envelope
                .message
                .unwrap_or_else(|| "request failed".to_string()),
        ));
    }
    Ok(envelope.data)
}

fn into_record(doc: RecordDoc) -> Result<AttendanceRecord, FetchError> {
    let date = normalize_date(&doc.date)
        .ok_or_else(|| FetchError::Malformed(format!("invalid record date '{}'", doc.date)))?;
    let class_id = doc
        .class
        .map(Populated::into_id)
        .ok_or_else(|| FetchError::Malformed("record without class".into()))?;
    let timeslot_id = doc
        .timeslot
        .map(Populated::into_id)
        .ok_or_else(|| FetchError::Malformed("record without timeslot".into()))?;

    AttendanceRecord::builder(date, class_id, timeslot_id)
        .total_students(doc.total_students)
        .present(doc.present_students.into_iter().map(Into::into).collect())
        .absent(doc.absent_students.into_iter().map(Into::into).collect())
        .late(doc.late_students.into_iter().map(Into::into).collect())
        .notes(doc.notes.filter(|n| !n.trim().is_empty()))
        .build()
        .map_err(|e| FetchError::Malformed(e.to_string()))
}

/// Decodes a list of attendance records.
///
/// # Errors
///
/// Returns [`FetchError::Rejected`] when the backend reports failure and
/// [`FetchError::Malformed`] when any record cannot be decoded or violates
/// bucket disjointness.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<AttendanceRecord>, FetchError> {
    let docs: Vec<RecordDoc> = open_envelope(bytes)?
        .ok_or_else(|| FetchError::Malformed("missing data".into()))?;
    docs.into_iter().map(into_record).collect()
}

/// Decodes a class roster.
pub fn parse_students(bytes: &[u8]) -> Result<Vec<StudentRef>, FetchError> {
    let docs: Vec<Populated<StudentDoc>> = open_envelope(bytes)?
        .ok_or_else(|| FetchError::Malformed("missing data".into()))?;
    Ok(docs.into_iter().map(Into::into).collect())
}

/// Checks a write acknowledgement.
pub fn parse_ack(bytes: &[u8]) -> Result<(), FetchError> {
    open_envelope::<serde_json::Value>(bytes).map(|_| ())
}

/// Best-effort message from an error response body.
pub fn error_message(bytes: &[u8]) -> String {
    let parsed: Result<Envelope<serde_json::Value>, _> = serde_json::from_slice(bytes);
    if let Ok(Envelope {
        message: Some(message),
        ..
    }) = parsed
    {
        return message;
    }
    let text = String::from_utf8_lossy(bytes);
    text.chars().take(200).collect()
}
