use std::collections::{BTreeSet, HashMap};
use std::fmt;

use async_graphql::{ComplexObject, InputObject, SimpleObject};

use crate::models::date_key::DateKey;

pub mod roster;

/// Who was present on one meeting date.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub date: DateKey,
    pub present_member_ids: BTreeSet<i64>,
    pub present_guest_ids: BTreeSet<i64>,
}

/// The shape records take in the store, with the date still unparsed.
///
/// `total_count` is how many people could have attended, fixed when the
/// record was saved so later roster changes don't rewrite past meetings.
#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct StoredAttendanceRecord {
    pub date: String,
    pub present_member_ids: Vec<i64>,
    pub present_guest_ids: Vec<i64>,
    pub total_count: i64,
}

impl StoredAttendanceRecord {
    /// `roster_size` is the number of active members plus the guests present.
    pub fn snapshot(record: &AttendanceRecord, roster_size: usize) -> Self {
        Self {
            date: record.date.to_string(),
            present_member_ids: record.present_member_ids.iter().copied().collect(),
            present_guest_ids: record.present_guest_ids.iter().copied().collect(),
            total_count: roster_size as i64,
        }
    }
}

#[derive(InputObject)]
pub struct AttendanceInput {
    /// The meeting date being recorded
    pub date: DateKey,
    /// The IDs of the members who were present
    pub present_member_ids: Vec<i64>,
    /// The IDs of the guests who were present
    pub present_guest_ids: Vec<i64>,
}

impl From<AttendanceInput> for AttendanceRecord {
    fn from(input: AttendanceInput) -> Self {
        Self {
            date: input.date,
            present_member_ids: input.present_member_ids.into_iter().collect(),
            present_guest_ids: input.present_guest_ids.into_iter().collect(),
        }
    }
}

/// One scheduled meeting and who attended it.
#[derive(Clone, Debug, PartialEq, Eq, SimpleObject)]
pub struct ReconciledEntry {
    /// The meeting date
    pub date: DateKey,
    /// How many members and guests were present
    pub present_count: usize,
    /// How many members and guests could have been present, or 0 if
    /// nothing was recorded for this date
    pub total_count: usize,
    /// The IDs of the members present
    pub present_member_ids: BTreeSet<i64>,
    /// The IDs of the guests present
    pub present_guest_ids: BTreeSet<i64>,
}

impl ReconciledEntry {
    /// The entry for a date that has a stored record. The total never drops
    /// below the number of people present.
    pub fn recorded(date: DateKey, record: &StoredAttendanceRecord) -> Self {
        let present_member_ids: BTreeSet<i64> =
            record.present_member_ids.iter().copied().collect();
        let present_guest_ids: BTreeSet<i64> =
            record.present_guest_ids.iter().copied().collect();
        let present_count = present_member_ids.len() + present_guest_ids.len();
        let total_count = usize::try_from(record.total_count).unwrap_or(0);

        Self {
            date,
            present_count,
            total_count: total_count.max(present_count),
            present_member_ids,
            present_guest_ids,
        }
    }

    pub fn empty(date: DateKey) -> Self {
        Self {
            date,
            present_count: 0,
            total_count: 0,
            present_member_ids: BTreeSet::new(),
            present_guest_ids: BTreeSet::new(),
        }
    }
}

/// A problem with stored data that reconciliation worked around.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataWarning {
    /// The record's date couldn't be parsed, so the record was dropped.
    MalformedDate { raw: String },
    /// More than one record was stored for a date; the last one was kept.
    DuplicateDate { date: DateKey },
}

impl fmt::Display for DataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataWarning::MalformedDate { raw } => {
                write!(f, "dropped attendance record with malformed date {:?}", raw)
            }
            DataWarning::DuplicateDate { date } => {
                write!(f, "found more than one attendance record for {}", date)
            }
        }
    }
}

/// The full meeting history: one entry per scheduled date, in order.
#[derive(Clone, Debug, PartialEq, Eq, SimpleObject)]
#[graphql(complex)]
pub struct Reconciliation {
    /// Every scheduled meeting, oldest first
    pub entries: Vec<ReconciledEntry>,

    #[graphql(skip)]
    pub warnings: Vec<DataWarning>,
}

#[ComplexObject]
impl Reconciliation {
    /// Problems found in the stored attendance data
    async fn warnings(&self) -> Vec<String> {
        self.warnings.iter().map(ToString::to_string).collect()
    }
}

impl Reconciliation {
    pub fn entry_for(&self, date: DateKey) -> Option<&ReconciledEntry> {
        self.entries.iter().find(|entry| entry.date == date)
    }
}

/// Lays the stored records over the meeting schedule.
///
/// Always yields exactly one entry per scheduled date, in schedule order.
/// Dates without a record get an empty entry, records outside the schedule
/// are ignored and records whose dates don't parse are dropped with a warning.
pub fn reconcile(schedule_dates: &[DateKey], records: &[StoredAttendanceRecord]) -> Reconciliation {
    let mut warnings = Vec::new();
    let mut by_date: HashMap<DateKey, &StoredAttendanceRecord> = HashMap::new();

    for record in records {
        match record.date.parse::<DateKey>() {
            Ok(date) => {
                if by_date.insert(date, record).is_some() {
                    log::warn!("Found duplicate attendance records for {}", date);
                    warnings.push(DataWarning::DuplicateDate { date });
                }
            }
            Err(_) => {
                log::warn!(
                    "Dropping attendance record with malformed date {:?}",
                    record.date
                );
                warnings.push(DataWarning::MalformedDate {
                    raw: record.date.clone(),
                });
            }
        }
    }

    let entries = schedule_dates
        .iter()
        .map(|date| match by_date.get(date) {
            Some(record) => ReconciledEntry::recorded(*date, record),
            None => ReconciledEntry::empty(*date),
        })
        .collect();

    Reconciliation { entries, warnings }
}
