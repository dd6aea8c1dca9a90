//! Startup configuration, read from the environment.

use std::net::SocketAddr;

use anyhow::{anyhow, bail, Context, Result};
use time::{UtcOffset, Weekday};

use crate::models::date_key::DateKey;
use crate::models::schedule::Schedule;

const DEFAULT_ADDRESS: &str = "0.0.0.0:3000";
const DEFAULT_SCHEDULE_START: &str = "2024-09-04";
const DEFAULT_SCHEDULE_END: &str = "2025-06-25";
const DEFAULT_MEETING_DAY: &str = "wednesday";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminLogin {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Where to find PostgreSQL. Without one, all data lives in memory.
    pub database_url: Option<String>,
    pub address: SocketAddr,
    pub schedule_start: DateKey,
    pub schedule_end: DateKey,
    pub meeting_day: Weekday,
    pub utc_offset: UtcOffset,
    /// The admin to create when the store has no accounts yet.
    pub admin: Option<AdminLogin>,
}

impl Config {
    /// Must run before any threads are spawned, since the local UTC offset
    /// can't be read safely afterwards. Load `.env` first if there is one.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let or_default = |name: &str, default: &str| {
            lookup(name).unwrap_or_else(|| default.to_owned())
        };

        let address = or_default("ROLLCALL_ADDR", DEFAULT_ADDRESS)
            .parse()
            .context("`ROLLCALL_ADDR` is not a socket address")?;
        let schedule_start = DateKey::parse(&or_default(
            "ROLLCALL_SCHEDULE_START",
            DEFAULT_SCHEDULE_START,
        ))
        .context("Invalid `ROLLCALL_SCHEDULE_START`")?;
        let schedule_end =
            DateKey::parse(&or_default("ROLLCALL_SCHEDULE_END", DEFAULT_SCHEDULE_END))
                .context("Invalid `ROLLCALL_SCHEDULE_END`")?;
        if schedule_end < schedule_start {
            bail!(
                "The schedule ends ({}) before it starts ({})",
                schedule_end,
                schedule_start
            );
        }
        let meeting_day =
            parse_weekday(&or_default("ROLLCALL_MEETING_DAY", DEFAULT_MEETING_DAY))?;

        let utc_offset = match lookup("ROLLCALL_UTC_OFFSET") {
            Some(hours) => {
                let hours: i8 = hours
                    .trim()
                    .parse()
                    .context("`ROLLCALL_UTC_OFFSET` must be a whole number of hours")?;
                UtcOffset::from_hms(hours, 0, 0)
                    .context("`ROLLCALL_UTC_OFFSET` is out of range")?
            }
            None => UtcOffset::current_local_offset().unwrap_or_else(|_| {
                log::warn!("Couldn't determine the local UTC offset, using UTC");
                UtcOffset::UTC
            }),
        };

        let admin = match (lookup("ROLLCALL_ADMIN_EMAIL"), lookup("ROLLCALL_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminLogin { email, password }),
            (None, None) => None,
            _ => bail!(
                "`ROLLCALL_ADMIN_EMAIL` and `ROLLCALL_ADMIN_PASSWORD` must be set together"
            ),
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL"),
            address,
            schedule_start,
            schedule_end,
            meeting_day,
            utc_offset,
            admin,
        })
    }

    pub fn schedule(&self) -> Schedule {
        Schedule::new(self.schedule_start, self.schedule_end, self.meeting_day)
    }
}

fn parse_weekday(name: &str) -> Result<Weekday> {
    let weekday = match name.trim().to_lowercase().as_str() {
        "monday" => Weekday::Monday,
        "tuesday" => Weekday::Tuesday,
        "wednesday" => Weekday::Wednesday,
        "thursday" => Weekday::Thursday,
        "friday" => Weekday::Friday,
        "saturday" => Weekday::Saturday,
        "sunday" => Weekday::Sunday,
        other => {
            return Err(anyhow!(
                "`ROLLCALL_MEETING_DAY` has unknown weekday {:?}",
                other
            ))
        }
    };

    Ok(weekday)
}
