use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};

use crate::db::{AccountStore, AttendanceStore, RosterStore, Store, Versions};
use crate::error::{RollcallError, RollcallResult};
use crate::models::account::{Account, Credentials, MemberLink, Role};
use crate::models::attendance::StoredAttendanceRecord;
use crate::models::guest::Guest;
use crate::models::member::Member;

const MAX_CONNECTIONS: u32 = 5;

/// The production store, backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects and brings the schema up to date.
    pub async fn connect(database_url: &str) -> RollcallResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    async fn bump_version(
        transaction: &mut Transaction<'_, Postgres>,
        name: &str,
    ) -> RollcallResult<()> {
        sqlx::query("UPDATE data_versions SET version = version + 1 WHERE name = $1")
            .bind(name)
            .execute(&mut *transaction)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl AttendanceStore for PgStore {
    async fn list_attendance_records(&self) -> RollcallResult<Vec<StoredAttendanceRecord>> {
        sqlx::query_as::<_, StoredAttendanceRecord>(
            "SELECT date, present_member_ids, present_guest_ids, total_count
             FROM attendance ORDER BY date",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn upsert_attendance_record(&self, record: &StoredAttendanceRecord) -> RollcallResult<()> {
        let mut transaction = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO attendance (date, present_member_ids, present_guest_ids, total_count)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (date) DO UPDATE SET
                 present_member_ids = EXCLUDED.present_member_ids,
                 present_guest_ids = EXCLUDED.present_guest_ids,
                 total_count = EXCLUDED.total_count",
        )
        .bind(&record.date)
        .bind(&record.present_member_ids)
        .bind(&record.present_guest_ids)
        .bind(record.total_count)
        .execute(&mut transaction)
        .await?;
        Self::bump_version(&mut transaction, "history").await?;

        transaction.commit().await.map_err(Into::into)
    }
}

#[async_trait]
impl RosterStore for PgStore {
    async fn list_members(&self) -> RollcallResult<Vec<Member>> {
        sqlx::query_as::<_, Member>("SELECT id, name, active FROM members ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn add_member(&self, name: &str) -> RollcallResult<Member> {
        let mut transaction = self.pool.begin().await?;

        let member = sqlx::query_as::<_, Member>(
            "INSERT INTO members (name) VALUES ($1) RETURNING id, name, active",
        )
        .bind(name)
        .fetch_one(&mut transaction)
        .await?;
        Self::bump_version(&mut transaction, "roster").await?;

        transaction.commit().await?;
        Ok(member)
    }

    async fn remove_member(&self, id: i64) -> RollcallResult<()> {
        let mut transaction = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM members WHERE id = $1")
            .bind(id)
            .execute(&mut transaction)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RollcallError::UnknownId { kind: "member", id });
        }
        Self::bump_version(&mut transaction, "roster").await?;

        transaction.commit().await.map_err(Into::into)
    }

    async fn set_member_active(&self, id: i64, active: bool) -> RollcallResult<()> {
        let mut transaction = self.pool.begin().await?;

        let result = sqlx::query("UPDATE members SET active = $1 WHERE id = $2")
            .bind(active)
            .bind(id)
            .execute(&mut transaction)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RollcallError::UnknownId { kind: "member", id });
        }
        Self::bump_version(&mut transaction, "roster").await?;

        transaction.commit().await.map_err(Into::into)
    }

    async fn list_guests(&self) -> RollcallResult<Vec<Guest>> {
        sqlx::query_as::<_, Guest>("SELECT id, name, notes FROM guests ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn add_guest(&self, name: &str, notes: Option<&str>) -> RollcallResult<Guest> {
        let mut transaction = self.pool.begin().await?;

        let guest = sqlx::query_as::<_, Guest>(
            "INSERT INTO guests (name, notes) VALUES ($1, $2) RETURNING id, name, notes",
        )
        .bind(name)
        .bind(notes)
        .fetch_one(&mut transaction)
        .await?;
        Self::bump_version(&mut transaction, "roster").await?;

        transaction.commit().await?;
        Ok(guest)
    }

    async fn remove_guest(&self, id: i64) -> RollcallResult<()> {
        let mut transaction = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM guests WHERE id = $1")
            .bind(id)
            .execute(&mut transaction)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RollcallError::UnknownId { kind: "guest", id });
        }
        Self::bump_version(&mut transaction, "roster").await?;

        transaction.commit().await.map_err(Into::into)
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn list_accounts(&self) -> RollcallResult<Vec<Account>> {
        sqlx::query_as::<_, Account>("SELECT id, email, role FROM accounts ORDER BY email")
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn account_count(&self) -> RollcallResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn credentials_for(&self, email: &str) -> RollcallResult<Option<Credentials>> {
        sqlx::query_as::<_, Credentials>(
            "SELECT id, email, role, pass_hash FROM accounts WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn create_account(
        &self,
        email: &str,
        pass_hash: &str,
        role: Role,
        member_id: Option<i64>,
    ) -> RollcallResult<Account> {
        if self.credentials_for(email).await?.is_some() {
            return Err(RollcallError::DuplicateEmail(email.to_owned()));
        }

        let mut transaction = self.pool.begin().await?;

        let account = sqlx::query_as::<_, Account>(
            "INSERT INTO accounts (email, pass_hash, role) VALUES ($1, $2, $3)
             RETURNING id, email, role",
        )
        .bind(email)
        .bind(pass_hash)
        .bind(role)
        .fetch_one(&mut transaction)
        .await?;

        if let Some(member_id) = member_id {
            let result = sqlx::query(
                "INSERT INTO member_links (member_id, account_id) VALUES ($1, $2)
                 ON CONFLICT DO NOTHING",
            )
            .bind(member_id)
            .bind(account.id)
            .execute(&mut transaction)
            .await?;
            if result.rows_affected() == 0 {
                return Err(RollcallError::LinkConflict {
                    member_id,
                    account_id: account.id,
                });
            }
        }

        transaction.commit().await?;
        Ok(account)
    }

    async fn set_account_role(&self, account_id: i64, role: Role) -> RollcallResult<()> {
        let result = sqlx::query("UPDATE accounts SET role = $1 WHERE id = $2")
            .bind(role)
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RollcallError::UnknownId {
                kind: "account",
                id: account_id,
            });
        }

        Ok(())
    }

    async fn create_session(&self, account_id: i64, token: &str) -> RollcallResult<()> {
        sqlx::query("INSERT INTO sessions (token, account_id) VALUES ($1, $2)")
            .bind(token)
            .bind(account_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn account_for_token(&self, token: &str) -> RollcallResult<Option<Account>> {
        sqlx::query_as::<_, Account>(
            "SELECT accounts.id, accounts.email, accounts.role FROM accounts
             INNER JOIN sessions ON sessions.account_id = accounts.id
             WHERE sessions.token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn remove_session(&self, token: &str) -> RollcallResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_links(&self) -> RollcallResult<Vec<MemberLink>> {
        sqlx::query_as::<_, MemberLink>(
            "SELECT member_id, account_id FROM member_links ORDER BY member_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn links_for_account(&self, account_id: i64) -> RollcallResult<Vec<MemberLink>> {
        sqlx::query_as::<_, MemberLink>(
            "SELECT member_id, account_id FROM member_links WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn link_member(&self, link: MemberLink) -> RollcallResult<()> {
        let result = sqlx::query(
            "INSERT INTO member_links (member_id, account_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(link.member_id)
        .bind(link.account_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RollcallError::LinkConflict {
                member_id: link.member_id,
                account_id: link.account_id,
            });
        }

        Ok(())
    }

    async fn unlink_member(&self, member_id: i64) -> RollcallResult<()> {
        sqlx::query("DELETE FROM member_links WHERE member_id = $1")
            .bind(member_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn versions(&self) -> RollcallResult<Versions> {
        sqlx::query_as::<_, Versions>(
            "SELECT
                 COALESCE(MAX(version) FILTER (WHERE name = 'history'), 0) AS history,
                 COALESCE(MAX(version) FILTER (WHERE name = 'roster'), 0) AS roster
             FROM data_versions",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }
}
