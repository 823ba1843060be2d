use serde::Serialize;

use crate::analyzers::utility::round_percentage;
use crate::model::AttendanceRecord;

/// Quick statistics over the records of a single day.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DailyStats {
    pub records: usize,
    pub present: u32,
    pub absent: u32,
    pub late: u32,
    pub average_percentage: u8,
    pub largest_roster: u32,
}

impl DailyStats {
    pub fn from_records(records: &[AttendanceRecord]) -> Self {
        let mut s = DailyStats {
            records: records.len(),
            ..Default::default()
        };

        for r in records {
            s.present += r.present().len() as u32;
            s.absent += r.absent().len() as u32;
            s.late += r.late().len() as u32;
            s.largest_roster = s.largest_roster.max(r.total_students());
        }

        s.average_percentage = round_percentage(s.present, s.total_marks());
        s
    }

    pub fn total_marks(&self) -> u32 {
        self.present + self.absent + self.late
    }
}
