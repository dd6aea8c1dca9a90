//! The attendance tracker: ties the schedule, the store and the pure
//! reconciliation and stats code together, and caches what it derives.

use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::SimpleObject;
use time::UtcOffset;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::{AttendanceStore, DynStore, RosterStore, Store, Versions};
use crate::error::{RollcallError, RollcallResult};
use crate::memo::Memo;
use crate::models::attendance::roster::{
    build_record, load_for_date, toggle_guest, toggle_member, Roster, RosterEntry,
};
use crate::models::attendance::{
    reconcile, AttendanceRecord, ReconciledEntry, Reconciliation, StoredAttendanceRecord,
};
use crate::models::date_key::DateKey;
use crate::models::guest::Guest;
use crate::models::member::Member;
use crate::models::schedule::Schedule;
use crate::models::stats::{PastEntries, StatsReport};

/// One lock per meeting date, so two saves for the same date never
/// interleave their writes.
#[derive(Default)]
struct SaveLocks {
    locks: Mutex<HashMap<DateKey, Arc<Mutex<()>>>>,
}

impl SaveLocks {
    async fn acquire(&self, date: DateKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(date).or_default())
        };
        lock.lock_owned().await
    }
}

/// The roster for one meeting date, with everyone marked present or absent.
#[derive(Clone, Debug, PartialEq, Eq, SimpleObject)]
pub struct DateAttendance {
    /// The meeting date
    pub date: DateKey,
    /// Every active member
    pub members: Vec<RosterEntry<Member>>,
    /// Every guest
    pub guests: Vec<RosterEntry<Guest>>,
}

pub struct Tracker {
    store: DynStore,
    schedule: Schedule,
    schedule_dates: Vec<DateKey>,
    offset: UtcOffset,
    save_locks: SaveLocks,
    history: Mutex<Memo<Versions, Arc<Reconciliation>>>,
    stats: Mutex<Memo<(Versions, DateKey), Arc<StatsReport>>>,
}

impl Tracker {
    /// `offset` is the club's local offset, used to decide what "today" is.
    pub fn new(store: DynStore, schedule: Schedule, offset: UtcOffset) -> Self {
        let schedule_dates = schedule.generate();
        log::info!(
            "Tracking {} meetings from {} to {}",
            schedule_dates.len(),
            schedule.start,
            schedule.end
        );

        Self {
            store,
            schedule,
            schedule_dates,
            offset,
            save_locks: SaveLocks::default(),
            history: Mutex::default(),
            stats: Mutex::default(),
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn meeting_dates(&self) -> &[DateKey] {
        &self.schedule_dates
    }

    pub fn today(&self) -> DateKey {
        DateKey::today(self.offset)
    }

    /// The reconciled meeting history, recomputed only after the stored
    /// attendance or the roster changes.
    pub async fn history(&self) -> RollcallResult<Arc<Reconciliation>> {
        let versions = self.store.versions().await?;
        if let Some(history) = self.history.lock().await.get(&versions) {
            return Ok(history);
        }

        let records = self.store.list_attendance_records().await?;
        let history = Arc::new(reconcile(&self.schedule_dates, &records));
        self.history.lock().await.set(versions, Arc::clone(&history));

        Ok(history)
    }

    /// Statistics over the meetings on or before `as_of`, which defaults to today.
    pub async fn stats(&self, as_of: Option<DateKey>) -> RollcallResult<Arc<StatsReport>> {
        let as_of = as_of.unwrap_or_else(|| self.today());
        let key = (self.store.versions().await?, as_of);
        if let Some(report) = self.stats.lock().await.get(&key) {
            return Ok(report);
        }

        let history = self.history().await?;
        let members = self.active_members().await?;
        let past = PastEntries::as_of(&history.entries, as_of);
        let report = Arc::new(StatsReport::compute(&members, &past));
        self.stats.lock().await.set(key, Arc::clone(&report));

        Ok(report)
    }

    pub async fn attendance_for(&self, date: DateKey) -> RollcallResult<DateAttendance> {
        let (members, guests) = self.rosters_for(date).await?;

        Ok(DateAttendance {
            date,
            members: members.into_entries(),
            guests: guests.into_entries(),
        })
    }

    /// Persists the record and returns the date's entry as it now stands.
    ///
    /// Saves for the same date are applied one after another. The write runs
    /// on its own task, so it completes even if the caller goes away.
    pub async fn save(&self, record: &AttendanceRecord) -> RollcallResult<ReconciledEntry> {
        self.ensure_scheduled(record.date)?;

        let guard = self.save_locks.acquire(record.date).await;
        self.write(record, guard).await
    }

    /// Flips one member's presence on `date` and saves the result. An id
    /// that isn't an active member writes nothing.
    pub async fn toggle_member(
        &self,
        date: DateKey,
        member_id: i64,
    ) -> RollcallResult<ReconciledEntry> {
        self.ensure_scheduled(date)?;

        let guard = self.save_locks.acquire(date).await;
        let (members, guests) = self.rosters_for(date).await?;
        let before = members.present_ids();
        let members = toggle_member(members, member_id);
        if members.present_ids() == before {
            return self.current_entry(date).await;
        }

        let record = build_record(date, &members, &guests);
        self.write(&record, guard).await
    }

    /// Flips one guest's presence on `date` and saves the result. An id
    /// that isn't a guest writes nothing.
    pub async fn toggle_guest(
        &self,
        date: DateKey,
        guest_id: i64,
    ) -> RollcallResult<ReconciledEntry> {
        self.ensure_scheduled(date)?;

        let guard = self.save_locks.acquire(date).await;
        let (members, guests) = self.rosters_for(date).await?;
        let before = guests.present_ids();
        let guests = toggle_guest(guests, guest_id);
        if guests.present_ids() == before {
            return self.current_entry(date).await;
        }

        let record = build_record(date, &members, &guests);
        self.write(&record, guard).await
    }

    fn ensure_scheduled(&self, date: DateKey) -> RollcallResult<()> {
        if self.schedule.contains(date) {
            Ok(())
        } else {
            Err(RollcallError::UnscheduledDate(date))
        }
    }

    async fn current_entry(&self, date: DateKey) -> RollcallResult<ReconciledEntry> {
        let history = self.history().await?;

        Ok(history
            .entry_for(date)
            .cloned()
            .unwrap_or_else(|| ReconciledEntry::empty(date)))
    }

    async fn rosters_for(
        &self,
        date: DateKey,
    ) -> RollcallResult<(Roster<Member>, Roster<Guest>)> {
        let history = self.history().await?;
        let members = Roster::absent(self.active_members().await?);
        let guests = Roster::absent(self.store.list_guests().await?);

        Ok(load_for_date(date, &history.entries, members, guests))
    }

    /// Writes on a detached task that holds the date's lock until the store
    /// has answered. The total is fixed here: active members plus the guests
    /// present.
    async fn write(
        &self,
        record: &AttendanceRecord,
        guard: OwnedMutexGuard<()>,
    ) -> RollcallResult<ReconciledEntry> {
        let date = record.date;
        let roster_size = self.active_members().await?.len() + record.present_guest_ids.len();
        let stored = StoredAttendanceRecord::snapshot(record, roster_size);
        let entry = ReconciledEntry::recorded(date, &stored);
        let store = Arc::clone(&self.store);

        let result = tokio::spawn(async move {
            let result = store.upsert_attendance_record(&stored).await;
            drop(guard);
            result
        })
        .await
        .map_err(|err| RollcallError::Task(err.to_string()))?;

        match result {
            Ok(()) => log::info!(
                "Saved attendance for {}: {} members, {} guests",
                date,
                record.present_member_ids.len(),
                record.present_guest_ids.len()
            ),
            Err(err) => {
                log::error!("Failed to save attendance for {}: {}", date, err);
                return Err(err);
            }
        }

        Ok(entry)
    }

    async fn active_members(&self) -> RollcallResult<Vec<Member>> {
        Ok(Member::active_only(self.store.list_members().await?))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use time::macros::date;

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::attendance::DataWarning;

    fn key(date: time::Date) -> DateKey {
        DateKey::from_date(date)
    }

    fn january() -> Schedule {
        Schedule::weekly_on_wednesday(key(date!(2025-01-01)), key(date!(2025-01-29)))
    }

    fn record(date: time::Date, members: &[i64], guests: &[i64]) -> AttendanceRecord {
        AttendanceRecord {
            date: key(date),
            present_member_ids: members.iter().copied().collect(),
            present_guest_ids: guests.iter().copied().collect(),
        }
    }

    async fn tracker_with_roster(store: Arc<MemoryStore>) -> Tracker {
        for name in ["Ada", "Barbara", "Grace"] {
            store.add_member(name).await.unwrap();
        }
        store.add_guest("Alan", None).await.unwrap();

        Tracker::new(store, january(), UtcOffset::UTC)
    }

    #[tokio::test]
    async fn history_covers_every_meeting() {
        let tracker = tracker_with_roster(Arc::new(MemoryStore::default())).await;

        let history = tracker.history().await.unwrap();

        assert_eq!(history.entries.len(), 5);
        assert!(history.entries.iter().all(|entry| entry.total_count == 0));
    }

    #[tokio::test]
    async fn saving_updates_the_history() {
        let tracker = tracker_with_roster(Arc::new(MemoryStore::default())).await;

        let entry = tracker
            .save(&record(date!(2025-01-08), &[1, 2], &[4]))
            .await
            .unwrap();

        assert_eq!(entry.present_count, 3);
        assert_eq!(entry.total_count, 4);
        let attendance = tracker.attendance_for(key(date!(2025-01-08))).await.unwrap();
        let present: Vec<&str> = attendance
            .members
            .iter()
            .filter(|entry| entry.present)
            .map(|entry| entry.attendee.name.as_str())
            .collect();
        assert_eq!(present, vec!["Ada", "Barbara"]);
        assert!(attendance.guests[0].present);
    }

    #[tokio::test]
    async fn unscheduled_dates_are_rejected() {
        let store = Arc::new(MemoryStore::default());
        let tracker = tracker_with_roster(Arc::clone(&store)).await;

        assert!(matches!(
            tracker.save(&record(date!(2025-01-09), &[1], &[])).await,
            Err(RollcallError::UnscheduledDate(_))
        ));
        assert!(store.list_attendance_records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_saves_for_one_date_leave_one_record() {
        let store = Arc::new(MemoryStore::with_write_delay(Duration::from_millis(20)));
        let tracker = tracker_with_roster(Arc::clone(&store)).await;
        let first = record(date!(2025-01-15), &[1], &[]);
        let second = record(date!(2025-01-15), &[2, 3], &[]);

        let (a, b) = tokio::join!(tracker.save(&first), tracker.save(&second));
        a.unwrap();
        b.unwrap();

        let records = store.list_attendance_records().await.unwrap();
        assert_eq!(records.len(), 1);
        let saved: BTreeSet<i64> = records[0].present_member_ids.iter().copied().collect();
        assert!(saved == first.present_member_ids || saved == second.present_member_ids);
    }

    #[tokio::test]
    async fn failed_saves_are_reported() {
        let store = Arc::new(MemoryStore::default());
        let tracker = tracker_with_roster(Arc::clone(&store)).await;
        let attempted = record(date!(2025-01-22), &[1, 3], &[]);

        store.fail_writes(true);
        assert!(matches!(
            tracker.save(&attempted).await,
            Err(RollcallError::Persistence(_))
        ));

        store.fail_writes(false);
        let entry = tracker.save(&attempted).await.unwrap();
        assert_eq!(entry.present_member_ids, attempted.present_member_ids);
    }

    #[tokio::test]
    async fn toggles_flip_one_person_and_save() {
        let tracker = tracker_with_roster(Arc::new(MemoryStore::default())).await;
        let date = key(date!(2025-01-08));
        tracker
            .save(&record(date!(2025-01-08), &[1], &[]))
            .await
            .unwrap();

        tracker.toggle_member(date, 2).await.unwrap();
        tracker.toggle_member(date, 1).await.unwrap();
        let entry = tracker.toggle_guest(date, 4).await.unwrap();

        assert_eq!(entry.present_member_ids, [2].into_iter().collect());
        assert_eq!(entry.present_guest_ids, [4].into_iter().collect());

        let unchanged = tracker.toggle_member(date, 999).await.unwrap();
        assert_eq!(unchanged, entry);
    }

    #[tokio::test]
    async fn history_is_cached_until_the_store_changes() {
        let store = Arc::new(MemoryStore::default());
        let tracker = tracker_with_roster(Arc::clone(&store)).await;

        let first = tracker.history().await.unwrap();
        let second = tracker.history().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        store.add_guest("Donald", None).await.unwrap();
        let third = tracker.history().await.unwrap();
        assert!(!Arc::ptr_eq(&second, &third));
    }

    #[tokio::test]
    async fn stats_only_count_past_meetings() {
        let tracker = tracker_with_roster(Arc::new(MemoryStore::default())).await;
        tracker
            .save(&record(date!(2025-01-01), &[1], &[4]))
            .await
            .unwrap();
        tracker
            .save(&record(date!(2025-01-29), &[1, 2, 3], &[4]))
            .await
            .unwrap();

        let report = tracker.stats(Some(key(date!(2025-01-15)))).await.unwrap();

        assert_eq!(report.past_meetings, 3);
        assert_eq!(report.average_attendance_percent, 50.0);
        assert_eq!(report.total_days, 15);
        assert_eq!(report.member_stats[2].presence_count, 0);
    }

    #[tokio::test]
    async fn later_roster_changes_keep_past_totals() {
        let store = Arc::new(MemoryStore::default());
        let tracker = tracker_with_roster(Arc::clone(&store)).await;
        tracker
            .save(&record(date!(2025-01-08), &[1, 2, 3], &[]))
            .await
            .unwrap();

        store.add_guest("Donald", None).await.unwrap();
        store.add_guest("Margaret", None).await.unwrap();
        store.add_member("Edsger").await.unwrap();

        let history = tracker.history().await.unwrap();
        let entry = history.entry_for(key(date!(2025-01-08))).unwrap();
        assert_eq!(entry.total_count, 3);
        let report = tracker.stats(Some(key(date!(2025-01-08)))).await.unwrap();
        assert_eq!(report.average_attendance_percent, 100.0);
    }

    #[tokio::test]
    async fn toggling_an_unknown_id_writes_nothing() {
        let store = Arc::new(MemoryStore::default());
        let tracker = tracker_with_roster(Arc::clone(&store)).await;
        tracker
            .save(&record(date!(2025-01-01), &[1, 2, 3], &[]))
            .await
            .unwrap();
        let as_of = Some(key(date!(2025-01-15)));
        let before = tracker.stats(as_of).await.unwrap();

        let member = tracker
            .toggle_member(key(date!(2025-01-08)), 999)
            .await
            .unwrap();
        let guest = tracker
            .toggle_guest(key(date!(2025-01-08)), 999)
            .await
            .unwrap();

        assert_eq!(member, ReconciledEntry::empty(key(date!(2025-01-08))));
        assert_eq!(guest, member);
        assert_eq!(store.list_attendance_records().await.unwrap().len(), 1);
        let after = tracker.stats(as_of).await.unwrap();
        assert_eq!(after, before);
        assert_eq!(after.average_attendance_percent, 100.0);
    }

    #[tokio::test]
    async fn saves_do_not_read_the_history_back() {
        let store = Arc::new(MemoryStore::default());
        let tracker = tracker_with_roster(Arc::clone(&store)).await;

        store.fail_reads(true);
        let entry = tracker
            .save(&record(date!(2025-01-15), &[1], &[4]))
            .await
            .unwrap();

        assert_eq!(entry.present_count, 2);
        assert_eq!(entry.total_count, 4);
        store.fail_reads(false);
        assert_eq!(store.list_attendance_records().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_stored_dates_surface_as_warnings() {
        let store = Arc::new(MemoryStore::default());
        let tracker = tracker_with_roster(Arc::clone(&store)).await;
        store
            .insert_raw_record(StoredAttendanceRecord {
                date: String::from("Jan 8"),
                present_member_ids: vec![1],
                present_guest_ids: vec![],
                total_count: 3,
            })
            .await;

        let history = tracker.history().await.unwrap();

        assert_eq!(history.entries.len(), 5);
        assert!(history.entries.iter().all(|entry| entry.total_count == 0));
        assert_eq!(
            history.warnings,
            vec![DataWarning::MalformedDate {
                raw: String::from("Jan 8")
            }]
        );
    }
}
