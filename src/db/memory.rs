use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::db::{AccountStore, AttendanceStore, RosterStore, Store, Versions};
use crate::error::{RollcallError, RollcallResult};
use crate::models::account::{Account, Credentials, MemberLink, Role};
use crate::models::attendance::StoredAttendanceRecord;
use crate::models::guest::Guest;
use crate::models::member::Member;

#[derive(Default)]
struct MemoryData {
    records: Vec<StoredAttendanceRecord>,
    members: Vec<Member>,
    guests: Vec<Guest>,
    accounts: Vec<Credentials>,
    sessions: HashMap<String, i64>,
    links: Vec<MemberLink>,
    next_id: i64,
    versions: Versions,
}

impl MemoryData {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// A store that keeps everything in process memory.
///
/// Attendance upserts look the date up and write in two separate steps, the
/// same way a plain read-then-write client would against a remote store.
/// `write_delay` widens the gap between the two.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<MemoryData>,
    write_delay: Duration,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn with_write_delay(write_delay: Duration) -> Self {
        Self {
            write_delay,
            ..Self::default()
        }
    }

    /// Makes every following attendance write fail, as if the store were down.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every following attendance read fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Stores a record without any checks, e.g. one written by an older client.
    pub async fn insert_raw_record(&self, record: StoredAttendanceRecord) {
        let mut data = self.data.lock().await;
        data.records.push(record);
        data.versions.history += 1;
    }

    /// Stores a link without the uniqueness checks `link_member` performs.
    pub async fn force_link(&self, link: MemberLink) {
        self.data.lock().await.links.push(link);
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn list_attendance_records(&self) -> RollcallResult<Vec<StoredAttendanceRecord>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RollcallError::Persistence(sqlx::Error::PoolTimedOut));
        }

        Ok(self.data.lock().await.records.clone())
    }

    async fn upsert_attendance_record(&self, record: &StoredAttendanceRecord) -> RollcallResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RollcallError::Persistence(sqlx::Error::PoolTimedOut));
        }

        let existing = self
            .data
            .lock()
            .await
            .records
            .iter()
            .position(|stored| stored.date == record.date);

        if !self.write_delay.is_zero() {
            tokio::time::sleep(self.write_delay).await;
        }

        let mut data = self.data.lock().await;
        match existing {
            Some(index) => data.records[index] = record.clone(),
            None => data.records.push(record.clone()),
        }
        data.versions.history += 1;

        Ok(())
    }
}

#[async_trait]
impl RosterStore for MemoryStore {
    async fn list_members(&self) -> RollcallResult<Vec<Member>> {
        let mut members = self.data.lock().await.members.clone();
        members.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(members)
    }

    async fn add_member(&self, name: &str) -> RollcallResult<Member> {
        let mut data = self.data.lock().await;
        let member = Member {
            id: data.next_id(),
            name: name.to_owned(),
            active: true,
        };
        data.members.push(member.clone());
        data.versions.roster += 1;

        Ok(member)
    }

    async fn remove_member(&self, id: i64) -> RollcallResult<()> {
        let mut data = self.data.lock().await;
        let before = data.members.len();
        data.members.retain(|member| member.id != id);
        if data.members.len() == before {
            return Err(RollcallError::UnknownId { kind: "member", id });
        }
        data.links.retain(|link| link.member_id != id);
        data.versions.roster += 1;

        Ok(())
    }

    async fn set_member_active(&self, id: i64, active: bool) -> RollcallResult<()> {
        let mut data = self.data.lock().await;
        let member = data
            .members
            .iter_mut()
            .find(|member| member.id == id)
            .ok_or(RollcallError::UnknownId { kind: "member", id })?;
        member.active = active;
        data.versions.roster += 1;

        Ok(())
    }

    async fn list_guests(&self) -> RollcallResult<Vec<Guest>> {
        let mut guests = self.data.lock().await.guests.clone();
        guests.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(guests)
    }

    async fn add_guest(&self, name: &str, notes: Option<&str>) -> RollcallResult<Guest> {
        let mut data = self.data.lock().await;
        let guest = Guest {
            id: data.next_id(),
            name: name.to_owned(),
            notes: notes.map(ToOwned::to_owned),
        };
        data.guests.push(guest.clone());
        data.versions.roster += 1;

        Ok(guest)
    }

    async fn remove_guest(&self, id: i64) -> RollcallResult<()> {
        let mut data = self.data.lock().await;
        let before = data.guests.len();
        data.guests.retain(|guest| guest.id != id);
        if data.guests.len() == before {
            return Err(RollcallError::UnknownId { kind: "guest", id });
        }
        data.versions.roster += 1;

        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn list_accounts(&self) -> RollcallResult<Vec<Account>> {
        let data = self.data.lock().await;
        let mut accounts: Vec<Account> = data.accounts.iter().map(Credentials::account).collect();
        accounts.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(accounts)
    }

    async fn account_count(&self) -> RollcallResult<i64> {
        Ok(self.data.lock().await.accounts.len() as i64)
    }

    async fn credentials_for(&self, email: &str) -> RollcallResult<Option<Credentials>> {
        Ok(self
            .data
            .lock()
            .await
            .accounts
            .iter()
            .find(|credentials| credentials.email == email)
            .cloned())
    }

    async fn create_account(
        &self,
        email: &str,
        pass_hash: &str,
        role: Role,
        member_id: Option<i64>,
    ) -> RollcallResult<Account> {
        let mut data = self.data.lock().await;
        if data.accounts.iter().any(|account| account.email == email) {
            return Err(RollcallError::DuplicateEmail(email.to_owned()));
        }
        if let Some(taken) = member_id.and_then(|member_id| {
            data.links.iter().find(|link| link.member_id == member_id)
        }) {
            return Err(RollcallError::LinkConflict {
                member_id: taken.member_id,
                account_id: taken.account_id,
            });
        }

        let credentials = Credentials {
            id: data.next_id(),
            email: email.to_owned(),
            role,
            pass_hash: pass_hash.to_owned(),
        };
        let account = credentials.account();
        data.accounts.push(credentials);
        if let Some(member_id) = member_id {
            data.links.push(MemberLink {
                member_id,
                account_id: account.id,
            });
        }

        Ok(account)
    }

    async fn set_account_role(&self, account_id: i64, role: Role) -> RollcallResult<()> {
        let mut data = self.data.lock().await;
        let account = data
            .accounts
            .iter_mut()
            .find(|account| account.id == account_id)
            .ok_or(RollcallError::UnknownId {
                kind: "account",
                id: account_id,
            })?;
        account.role = role;

        Ok(())
    }

    async fn create_session(&self, account_id: i64, token: &str) -> RollcallResult<()> {
        self.data
            .lock()
            .await
            .sessions
            .insert(token.to_owned(), account_id);
        Ok(())
    }

    async fn account_for_token(&self, token: &str) -> RollcallResult<Option<Account>> {
        let data = self.data.lock().await;
        let account = data.sessions.get(token).and_then(|account_id| {
            data.accounts
                .iter()
                .find(|account| account.id == *account_id)
                .map(Credentials::account)
        });

        Ok(account)
    }

    async fn remove_session(&self, token: &str) -> RollcallResult<()> {
        self.data.lock().await.sessions.remove(token);
        Ok(())
    }

    async fn list_links(&self) -> RollcallResult<Vec<MemberLink>> {
        Ok(self.data.lock().await.links.clone())
    }

    async fn links_for_account(&self, account_id: i64) -> RollcallResult<Vec<MemberLink>> {
        Ok(self
            .data
            .lock()
            .await
            .links
            .iter()
            .filter(|link| link.account_id == account_id)
            .copied()
            .collect())
    }

    async fn link_member(&self, link: MemberLink) -> RollcallResult<()> {
        let mut data = self.data.lock().await;
        if data.links.iter().any(|existing| {
            existing.member_id == link.member_id || existing.account_id == link.account_id
        }) {
            return Err(RollcallError::LinkConflict {
                member_id: link.member_id,
                account_id: link.account_id,
            });
        }
        data.links.push(link);

        Ok(())
    }

    async fn unlink_member(&self, member_id: i64) -> RollcallResult<()> {
        self.data
            .lock()
            .await
            .links
            .retain(|link| link.member_id != member_id);
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn versions(&self) -> RollcallResult<Versions> {
        Ok(self.data.lock().await.versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mock::stored_record;

    #[tokio::test]
    async fn upsert_replaces_by_date() {
        let store = MemoryStore::default();

        store
            .upsert_attendance_record(&stored_record("2025-01-08", &[1], &[], 4))
            .await
            .unwrap();
        store
            .upsert_attendance_record(&stored_record("2025-01-08", &[1, 2], &[3], 4))
            .await
            .unwrap();

        assert_eq!(
            store.list_attendance_records().await.unwrap(),
            vec![stored_record("2025-01-08", &[1, 2], &[3], 4)]
        );
        assert_eq!(store.versions().await.unwrap().history, 2);
    }

    #[tokio::test]
    async fn roster_changes_bump_the_roster_version() {
        let store = MemoryStore::default();

        let member = store.add_member("Ada").await.unwrap();
        store.set_member_active(member.id, false).await.unwrap();
        store.add_guest("Bob", Some("Ada's friend")).await.unwrap();

        let versions = store.versions().await.unwrap();
        assert_eq!(versions.roster, 3);
        assert_eq!(versions.history, 0);
        assert!(!store.list_members().await.unwrap()[0].active);
    }

    #[tokio::test]
    async fn removing_unknown_ids_fails() {
        let store = MemoryStore::default();

        assert!(matches!(
            store.remove_member(5).await,
            Err(RollcallError::UnknownId { kind: "member", id: 5 })
        ));
        assert!(matches!(
            store.remove_guest(6).await,
            Err(RollcallError::UnknownId { kind: "guest", id: 6 })
        ));
    }

    #[tokio::test]
    async fn links_are_one_to_one() {
        let store = MemoryStore::default();
        let link = MemberLink {
            member_id: 1,
            account_id: 2,
        };

        store.link_member(link).await.unwrap();

        assert!(matches!(
            store
                .link_member(MemberLink {
                    member_id: 1,
                    account_id: 3
                })
                .await,
            Err(RollcallError::LinkConflict { .. })
        ));
        assert!(matches!(
            store
                .link_member(MemberLink {
                    member_id: 4,
                    account_id: 2
                })
                .await,
            Err(RollcallError::LinkConflict { .. })
        ));

        store.unlink_member(1).await.unwrap();
        assert!(store.list_links().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_writes_surface_as_persistence_errors() {
        let store = MemoryStore::default();
        store.fail_writes(true);

        assert!(matches!(
            store
                .upsert_attendance_record(&stored_record("2025-01-08", &[1], &[], 4))
                .await,
            Err(RollcallError::Persistence(_))
        ));
        assert!(store.list_attendance_records().await.unwrap().is_empty());
    }
}
