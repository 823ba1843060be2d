use crate::analyzers::types::StudentTally;
use crate::analyzers::utility::round_percentage;
use crate::model::{AttendanceRecord, Mark, StudentRef, UNKNOWN_PROFILE};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Display profile of a student together with the date it was observed on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Profile {
    seen_on: NaiveDate,
    name: Option<String>,
    reg_no: Option<String>,
}

#[derive(Debug, Default)]
struct TallyEntry {
    profile: Option<Profile>,
    present: u32,
    absent: u32,
    late: u32,
    // Classes the student was marked in, kept only while no profile is known.
    classes: BTreeSet<String>,
}

/// Per-request accumulation of attendance records into student tallies.
///
/// Folding is commutative and associative: any order or chunking of the same
/// records yields the same counters and the same chosen profiles. When a
/// student's profile differs across records, the one from the latest date
/// wins; same-date ties go to the greatest `(name, reg_no)`.
#[derive(Debug, Default)]
pub struct TallyTable {
    entries: HashMap<String, TallyEntry>,
}

impl TallyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a sequence of records into a new table.
    pub fn fold<'a>(records: impl IntoIterator<Item = &'a AttendanceRecord>) -> Self {
        let mut table = Self::new();
        for record in records {
            table.fold_record(record);
        }
        table
    }

    /// Adds one mark per student listed in any bucket of `record`.
    pub fn fold_record(&mut self, record: &AttendanceRecord) {
        for (student, mark) in record.marked() {
            let entry = self.entries.entry(student.id.clone()).or_default();
            match mark {
                Mark::Present => entry.present += 1,
                Mark::Absent => entry.absent += 1,
                Mark::Late => entry.late += 1,
                Mark::Unmarked => continue,
            }
            observe_profile(entry, student, record.date());
            if entry.profile.is_none() {
                entry.classes.insert(record.class_id().to_string());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Classes whose roster is needed to fill in students lacking a profile,
    /// with the number of such students per class.
    pub fn pending_lookups(&self) -> BTreeMap<String, usize> {
        let mut lookups = BTreeMap::new();
        for entry in self.entries.values().filter(|e| e.profile.is_none()) {
            for class in &entry.classes {
                *lookups.entry(class.clone()).or_insert(0) += 1;
            }
        }
        lookups
    }

    /// Fills in profiles from a class roster for students that have none yet.
    /// Students already carrying a profile from a record are left untouched.
    pub fn resolve_from_roster(&mut self, roster: &[StudentRef]) {
        for student in roster.iter().filter(|s| s.has_profile()) {
            if let Some(entry) = self.entries.get_mut(&student.id) {
                if entry.profile.is_none() {
                    entry.profile = Some(Profile {
                        seen_on: NaiveDate::MIN,
                        name: student.name.clone(),
                        reg_no: student.reg_no.clone(),
                    });
                    entry.classes.clear();
                }
            }
        }
    }

    /// Computes percentages and returns tallies sorted by name, then id.
    pub fn into_tallies(self) -> Vec<StudentTally> {
        let mut tallies: Vec<StudentTally> = self
            .entries
            .into_iter()
            .filter_map(|(student_id, e)| {
                let total = e.present + e.absent + e.late;
                if total == 0 {
                    return None;
                }
                let (name, reg_no) = match e.profile {
                    Some(p) => (p.name, p.reg_no),
                    None => (None, None),
                };
                Some(StudentTally {
                    student_id,
                    name: name.unwrap_or_else(|| UNKNOWN_PROFILE.to_string()),
                    reg_no: reg_no.unwrap_or_else(|| UNKNOWN_PROFILE.to_string()),
                    present: e.present,
                    absent: e.absent,
                    late: e.late,
                    percentage: round_percentage(e.present, total),
                })
            })
            .collect();

        tallies.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.student_id.cmp(&b.student_id))
        });
        tallies
    }
}

fn observe_profile(entry: &mut TallyEntry, student: &StudentRef, date: NaiveDate) {
    if !student.has_profile() {
        return;
    }
    let candidate = Profile {
        seen_on: date,
        name: student.name.clone(),
        reg_no: student.reg_no.clone(),
    };
    if entry.profile.as_ref().is_none_or(|p| candidate > *p) {
        entry.profile = Some(candidate);
        entry.classes.clear();
    }
}

/// Folds `records` and returns the finished, sorted tallies.
pub fn aggregate_records<'a>(
    records: impl IntoIterator<Item = &'a AttendanceRecord>,
) -> Vec<StudentTally> {
    TallyTable::fold(records).into_tallies()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    fn record(
        day: u32,
        present: Vec<StudentRef>,
        absent: Vec<StudentRef>,
        late: Vec<StudentRef>,
    ) -> AttendanceRecord {
        AttendanceRecord::builder(date(day), "c1", "t1")
            .total_students(3)
            .present(present)
            .absent(absent)
            .late(late)
            .build()
            .unwrap()
    }

    fn ann() -> StudentRef {
        StudentRef::new("s1", "Ann", "R-001")
    }

    fn bob() -> StudentRef {
        StudentRef::new("s2", "Bob", "R-002")
    }

    #[test]
    fn test_fold_counts_one_per_record() {
        let records = vec![
            record(1, vec![ann()], vec![bob()], vec![]),
            record(2, vec![ann(), bob()], vec![], vec![]),
            record(3, vec![], vec![], vec![ann()]),
        ];

        let tallies = aggregate_records(&records);

        assert_eq!(tallies.len(), 2);
        assert_eq!(tallies[0].name, "Ann");
        assert_eq!((tallies[0].present, tallies[0].absent, tallies[0].late), (2, 0, 1));
        assert_eq!(tallies[0].percentage, 67);
        assert_eq!(tallies[1].name, "Bob");
        assert_eq!((tallies[1].present, tallies[1].absent, tallies[1].late), (1, 1, 0));
        assert_eq!(tallies[1].percentage, 50);
    }

    #[test]
    fn test_empty_input_has_no_tallies() {
        let tallies = aggregate_records(std::iter::empty());
        assert!(tallies.is_empty());
    }

    #[test]
    fn test_order_independent() {
        let records = vec![
            record(1, vec![ann()], vec![bob()], vec![]),
            record(2, vec![bob()], vec![], vec![ann()]),
            record(3, vec![], vec![ann()], vec![bob()]),
        ];
        let forward = aggregate_records(&records);
        let backward = aggregate_records(records.iter().rev());

        assert_eq!(forward, backward);
    }

    #[test]
    fn test_latest_profile_wins() {
        let renamed = StudentRef::new("s1", "Ann-Marie", "R-001");
        let records = vec![
            record(10, vec![renamed.clone()], vec![], vec![]),
            record(2, vec![ann()], vec![], vec![]),
        ];

        let forward = aggregate_records(&records);
        let backward = aggregate_records(records.iter().rev());

        assert_eq!(forward[0].name, "Ann-Marie");
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_bare_reference_uses_placeholder() {
        let records = vec![record(1, vec![StudentRef::bare("s9")], vec![], vec![])];
        let tallies = aggregate_records(&records);

        assert_eq!(tallies[0].name, UNKNOWN_PROFILE);
        assert_eq!(tallies[0].reg_no, UNKNOWN_PROFILE);
    }

    #[test]
    fn test_resolve_from_roster_fills_missing_profile() {
        let records = vec![
            record(1, vec![StudentRef::bare("s9")], vec![], vec![]),
            record(2, vec![ann()], vec![], vec![]),
        ];
        let mut table = TallyTable::fold(&records);

        let lookups = table.pending_lookups();
        assert_eq!(lookups.len(), 1);
        assert_eq!(lookups.get("c1"), Some(&1));

        table.resolve_from_roster(&[
            StudentRef::new("s9", "Zed", "R-009"),
            StudentRef::new("s1", "Someone Else", "R-999"),
        ]);
        assert!(table.pending_lookups().is_empty());

        let tallies = table.into_tallies();
        assert_eq!(tallies[0].name, "Ann");
        assert_eq!(tallies[1].name, "Zed");
        assert_eq!(tallies[1].reg_no, "R-009");
    }

    #[test]
    fn test_same_name_sorted_by_id() {
        let a = StudentRef::new("b-id", "Sam", "R1");
        let b = StudentRef::new("a-id", "Sam", "R2");
        let records = vec![record(1, vec![a, b], vec![], vec![])];

        let tallies = aggregate_records(&records);
        assert_eq!(tallies[0].student_id, "a-id");
        assert_eq!(tallies[1].student_id, "b-id");
    }
}
