//! Data access. Everything the service reads or writes goes through the
//! traits here, backed by PostgreSQL in production and by memory in tests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RollcallResult;
use crate::models::account::{Account, Credentials, MemberLink, Role};
use crate::models::attendance::StoredAttendanceRecord;
use crate::models::guest::Guest;
use crate::models::member::Member;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Counters bumped on every write, so derived data can be cached until the
/// data it was derived from changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, sqlx::FromRow)]
pub struct Versions {
    /// Bumped whenever an attendance record is written
    pub history: i64,
    /// Bumped whenever a member or guest is added, changed or removed
    pub roster: i64,
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn list_attendance_records(&self) -> RollcallResult<Vec<StoredAttendanceRecord>>;

    /// Inserts the record, or replaces the one already stored for its date.
    async fn upsert_attendance_record(&self, record: &StoredAttendanceRecord) -> RollcallResult<()>;
}

#[async_trait]
pub trait RosterStore: Send + Sync {
    async fn list_members(&self) -> RollcallResult<Vec<Member>>;
    async fn add_member(&self, name: &str) -> RollcallResult<Member>;
    async fn remove_member(&self, id: i64) -> RollcallResult<()>;
    async fn set_member_active(&self, id: i64, active: bool) -> RollcallResult<()>;

    async fn list_guests(&self) -> RollcallResult<Vec<Guest>>;
    async fn add_guest(&self, name: &str, notes: Option<&str>) -> RollcallResult<Guest>;
    async fn remove_guest(&self, id: i64) -> RollcallResult<()>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn list_accounts(&self) -> RollcallResult<Vec<Account>>;
    async fn account_count(&self) -> RollcallResult<i64>;
    async fn credentials_for(&self, email: &str) -> RollcallResult<Option<Credentials>>;
    /// Creates the account and, with a `member_id`, its link in one step.
    /// Nothing is stored if the link conflicts.
    async fn create_account(
        &self,
        email: &str,
        pass_hash: &str,
        role: Role,
        member_id: Option<i64>,
    ) -> RollcallResult<Account>;
    async fn set_account_role(&self, account_id: i64, role: Role) -> RollcallResult<()>;

    async fn create_session(&self, account_id: i64, token: &str) -> RollcallResult<()>;
    async fn account_for_token(&self, token: &str) -> RollcallResult<Option<Account>>;
    async fn remove_session(&self, token: &str) -> RollcallResult<()>;

    async fn list_links(&self) -> RollcallResult<Vec<MemberLink>>;
    async fn links_for_account(&self, account_id: i64) -> RollcallResult<Vec<MemberLink>>;
    /// Fails with `LinkConflict` if the member or the account is already linked.
    async fn link_member(&self, link: MemberLink) -> RollcallResult<()>;
    async fn unlink_member(&self, member_id: i64) -> RollcallResult<()>;
}

#[async_trait]
pub trait Store: AttendanceStore + RosterStore + AccountStore {
    async fn versions(&self) -> RollcallResult<Versions>;
}

pub type DynStore = Arc<dyn Store>;

/// Connects to PostgreSQL if a URL is given, otherwise falls back to a
/// store that lives and dies with the process.
pub async fn connect(database_url: Option<&str>) -> RollcallResult<DynStore> {
    match database_url {
        Some(url) => {
            let store = PgStore::connect(url).await?;
            log::info!("Connected to the database");
            Ok(Arc::new(store))
        }
        None => {
            log::warn!("No DATABASE_URL set, keeping all data in memory");
            Ok(Arc::new(MemoryStore::default()))
        }
    }
}
