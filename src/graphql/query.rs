use std::sync::Arc;

use async_graphql::{Context, Object, Result};

use crate::db::{AccountStore, RosterStore};
use crate::graphql::guards::{HasRole, LoggedIn};
use crate::models::account::session::SessionContext;
use crate::models::account::{Account, MemberLink};
use crate::models::attendance::Reconciliation;
use crate::models::date_key::DateKey;
use crate::models::guest::Guest;
use crate::models::member::Member;
use crate::models::schedule::Schedule;
use crate::models::stats::StatsReport;
use crate::tracker::{DateAttendance, Tracker};

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// The logged-in account and its linked member, if logged in
    pub async fn user<'c>(&self, ctx: &'c Context<'c>) -> Option<SessionContext> {
        ctx.data_opt::<SessionContext>().cloned()
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn schedule(&self, ctx: &Context<'_>) -> Schedule {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        tracker.schedule().clone()
    }

    /// Every scheduled meeting date, oldest first
    #[graphql(guard = "LoggedIn")]
    pub async fn meeting_dates(&self, ctx: &Context<'_>) -> Vec<DateKey> {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        tracker.meeting_dates().to_vec()
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn history(&self, ctx: &Context<'_>) -> Result<Reconciliation> {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        let history = tracker.history().await?;

        Ok(history.as_ref().clone())
    }

    /// Who was present on the given date
    #[graphql(guard = "LoggedIn")]
    pub async fn attendance(&self, ctx: &Context<'_>, date: DateKey) -> Result<DateAttendance> {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        tracker.attendance_for(date).await.map_err(Into::into)
    }

    /// Statistics over the meetings up to `asOf`, or up to today if not given
    #[graphql(guard = "LoggedIn")]
    pub async fn stats(&self, ctx: &Context<'_>, as_of: Option<DateKey>) -> Result<StatsReport> {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        let report = tracker.stats(as_of).await?;

        Ok(report.as_ref().clone())
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn members(
        &self,
        ctx: &Context<'_>,
        #[graphql(default = false)] include_inactive: bool,
    ) -> Result<Vec<Member>> {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        let members = tracker.store().list_members().await?;

        if include_inactive {
            Ok(members)
        } else {
            Ok(Member::active_only(members))
        }
    }

    #[graphql(guard = "LoggedIn")]
    pub async fn guests(&self, ctx: &Context<'_>) -> Result<Vec<Guest>> {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        tracker.store().list_guests().await.map_err(Into::into)
    }

    #[graphql(guard = "HasRole::ADMIN")]
    pub async fn accounts(&self, ctx: &Context<'_>) -> Result<Vec<Account>> {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        tracker.store().list_accounts().await.map_err(Into::into)
    }

    #[graphql(guard = "HasRole::ADMIN")]
    pub async fn member_links(&self, ctx: &Context<'_>) -> Result<Vec<MemberLink>> {
        let tracker: &Arc<Tracker> = ctx.data_unchecked();
        tracker.store().list_links().await.map_err(Into::into)
    }
}
