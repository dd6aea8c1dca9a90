use std::fmt;
use std::str::FromStr;

use async_graphql::{InputValueError, InputValueResult, Scalar, ScalarType, Value};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::FormatItem;
use time::macros::{format_description, time};
use time::{Date, Duration, OffsetDateTime, Time, UtcOffset, Weekday};

use crate::error::{RollcallError, RollcallResult};

pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Every key maps back to this time of day. Noon keeps a date on the same
/// calendar day when a DST transition shifts the offset by an hour.
pub const REFERENCE_HOUR: Time = time!(12:00);

/// A calendar day with no time-of-day or offset attached.
///
/// Used wherever dates are compared, used as map keys or persisted.
/// Serializes as `YYYY-MM-DD`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(Date);

impl DateKey {
    pub const fn from_date(date: Date) -> Self {
        Self(date)
    }

    /// The calendar day of `instant` in its own offset.
    ///
    /// Convert the instant into the club's offset before normalizing it.
    pub fn normalize(instant: OffsetDateTime) -> Self {
        Self(instant.date())
    }

    pub fn today(offset: UtcOffset) -> Self {
        Self::normalize(OffsetDateTime::now_utc().to_offset(offset))
    }

    pub fn parse(key: &str) -> RollcallResult<Self> {
        key.parse()
    }

    pub fn weekday(&self) -> Weekday {
        self.0.weekday()
    }

    /// Noon on this day in the given offset.
    pub fn reference_instant(&self, offset: UtcOffset) -> OffsetDateTime {
        self.0.with_time(REFERENCE_HOUR).assume_offset(offset)
    }

    /// Whole days from `self` to `other`; negative if `other` is earlier.
    pub fn days_until(&self, other: DateKey) -> i64 {
        (other.0 - self.0).whole_days()
    }

    pub fn checked_add_days(&self, days: i64) -> Option<Self> {
        self.0.checked_add(Duration::days(days)).map(Self)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl FromStr for DateKey {
    type Err = RollcallError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        Date::parse(key, DATE_FORMAT)
            .map(Self)
            .map_err(|_err| RollcallError::MalformedDate(key.to_owned()))
    }
}

impl From<Date> for DateKey {
    fn from(date: Date) -> Self {
        Self(date)
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        key.parse().map_err(D::Error::custom)
    }
}

/// A calendar date in `YYYY-MM-DD` format
#[Scalar(name = "Date")]
impl ScalarType for DateKey {
    fn parse(value: Value) -> InputValueResult<Self> {
        if let Value::String(key) = &value {
            if let Ok(date) = key.parse() {
                return Ok(date);
            }
        }

        Err(InputValueError::expected_type(value))
    }

    fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }
}
