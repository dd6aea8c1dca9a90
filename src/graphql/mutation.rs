use std::sync::Arc;

use async_graphql::{Context, Object, Result};

use crate::db::{AccountStore, RosterStore};
use crate::graphql::guards::{HasRole, LoggedIn};
use crate::graphql::SUCCESS_MESSAGE;
use crate::models::account::session::{self, SessionContext};
use crate::models::account::{Account, NewAccount, Role};
use crate::models::attendance::{AttendanceInput, AttendanceRecord, ReconciledEntry};
use crate::models::date_key::DateKey;
use crate::models::guest::{Guest, NewGuest};
use crate::models::member::{Member, NewMember};
use crate::tracker::Tracker;

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Gets a login token on successful login
    pub async fn login(
        &self,
        ctx: &Context<'_>,
        email: String,
        password: String,
    ) -> Result<String> {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        session::login(&email, &password, tracker.store())
            .await
            .map_err(Into::into)
    }

    /// Ends the current session
    #[graphql(guard = "LoggedIn")]
    pub async fn logout(&self, ctx: &Context<'_>) -> Result<&'static str> {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        let user: &SessionContext = ctx.data_unchecked();
        session::logout(user, tracker.store()).await?;

        Ok(SUCCESS_MESSAGE)
    }

    /// Records exactly who was present on a meeting date, replacing
    /// whatever was recorded before
    #[graphql(guard = "HasRole::MANAGER")]
    pub async fn save_attendance(
        &self,
        ctx: &Context<'_>,
        attendance: AttendanceInput,
    ) -> Result<ReconciledEntry> {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        let record = AttendanceRecord::from(attendance);

        tracker.save(&record).await.map_err(Into::into)
    }

    /// Marks a member present if they were absent on the date, or absent if
    /// they were present
    #[graphql(guard = "HasRole::MANAGER")]
    pub async fn toggle_member(
        &self,
        ctx: &Context<'_>,
        date: DateKey,
        member_id: i64,
    ) -> Result<ReconciledEntry> {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        tracker
            .toggle_member(date, member_id)
            .await
            .map_err(Into::into)
    }

    #[graphql(guard = "HasRole::MANAGER")]
    pub async fn toggle_guest(
        &self,
        ctx: &Context<'_>,
        date: DateKey,
        guest_id: i64,
    ) -> Result<ReconciledEntry> {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        tracker
            .toggle_guest(date, guest_id)
            .await
            .map_err(Into::into)
    }

    #[graphql(guard = "HasRole::MANAGER")]
    pub async fn add_member(&self, ctx: &Context<'_>, new_member: NewMember) -> Result<Member> {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        let member = tracker.store().add_member(&new_member.name).await?;
        log::info!("Added member {} ({})", member.name, member.id);

        Ok(member)
    }

    /// Deletes a member outright. Prefer `setMemberActive` for members who
    /// have attended before.
    #[graphql(guard = "HasRole::MANAGER")]
    pub async fn remove_member(&self, ctx: &Context<'_>, id: i64) -> Result<&'static str> {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        tracker.store().remove_member(id).await?;

        Ok(SUCCESS_MESSAGE)
    }

    #[graphql(guard = "HasRole::MANAGER")]
    pub async fn set_member_active(
        &self,
        ctx: &Context<'_>,
        id: i64,
        active: bool,
    ) -> Result<&'static str> {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        tracker.store().set_member_active(id, active).await?;

        Ok(SUCCESS_MESSAGE)
    }

    #[graphql(guard = "HasRole::MANAGER")]
    pub async fn add_guest(&self, ctx: &Context<'_>, new_guest: NewGuest) -> Result<Guest> {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        tracker
            .store()
            .add_guest(&new_guest.name, new_guest.notes.as_deref())
            .await
            .map_err(Into::into)
    }

    #[graphql(guard = "HasRole::MANAGER")]
    pub async fn remove_guest(&self, ctx: &Context<'_>, id: i64) -> Result<&'static str> {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        tracker.store().remove_guest(id).await?;

        Ok(SUCCESS_MESSAGE)
    }

    #[graphql(guard = "HasRole::ADMIN")]
    pub async fn create_account(
        &self,
        ctx: &Context<'_>,
        new_account: NewAccount,
    ) -> Result<Account> {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        Account::create(new_account, tracker.store())
            .await
            .map_err(Into::into)
    }

    #[graphql(guard = "HasRole::ADMIN")]
    pub async fn set_role(
        &self,
        ctx: &Context<'_>,
        account_id: i64,
        role: Role,
    ) -> Result<&'static str> {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        tracker.store().set_account_role(account_id, role).await?;
        log::info!("Account {} is now a {}", account_id, role);

        Ok(SUCCESS_MESSAGE)
    }

    #[graphql(guard = "HasRole::ADMIN")]
    pub async fn link_member(
        &self,
        ctx: &Context<'_>,
        member_id: i64,
        account_id: i64,
    ) -> Result<&'static str> {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        Account::link(member_id, account_id, tracker.store()).await?;

        Ok(SUCCESS_MESSAGE)
    }

    #[graphql(guard = "HasRole::ADMIN")]
    pub async fn unlink_member(&self, ctx: &Context<'_>, member_id: i64) -> Result<&'static str> {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        tracker.store().unlink_member(member_id).await?;

        Ok(SUCCESS_MESSAGE)
    }
}
