//! Data types produced by the aggregation pipeline.

use crate::analyzers::grade::{Standing, standing};
use serde::Serialize;

/// Per-student counters and attendance percentage over a date range.
///
/// Built fresh for every aggregation call and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentTally {
    pub student_id: String,
    pub name: String,
    pub reg_no: String,
    pub present: u32,
    pub absent: u32,
    pub late: u32,
    pub percentage: u8,
}

impl StudentTally {
    pub fn total_marks(&self) -> u32 {
        self.present + self.absent + self.late
    }

    pub fn standing(&self) -> Standing {
        standing(self.percentage)
    }
}

/// One row of a monthly report as exported to CSV.
#[derive(Debug, Serialize)]
pub struct ReportRow<'a> {
    pub student_id: &'a str,
    pub name: &'a str,
    pub reg_no: &'a str,
    pub present: u32,
    pub absent: u32,
    pub late: u32,
    pub percentage: u8,
    pub standing: Standing,
}

impl<'a> From<&'a StudentTally> for ReportRow<'a> {
    fn from(t: &'a StudentTally) -> Self {
        Self {
            student_id: &t.student_id,
            name: &t.name,
            reg_no: &t.reg_no,
            present: t.present,
            absent: t.absent,
            late: t.late,
            percentage: t.percentage,
            standing: t.standing(),
        }
    }
}
