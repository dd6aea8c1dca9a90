use async_graphql::SimpleObject;
use time::Weekday;

use crate::models::date_key::DateKey;

/// The club's meeting calendar: one meeting every `meeting_day` from
/// `start` to `end`, inclusive.
#[derive(Clone, Debug, PartialEq, Eq, SimpleObject)]
pub struct Schedule {
    /// The first day of the meeting range
    pub start: DateKey,
    /// The last day of the meeting range
    pub end: DateKey,
    #[graphql(skip)]
    pub meeting_day: Weekday,
}

impl Schedule {
    pub fn new(start: DateKey, end: DateKey, meeting_day: Weekday) -> Self {
        Self {
            start,
            end,
            meeting_day,
        }
    }

    pub fn weekly_on_wednesday(start: DateKey, end: DateKey) -> Self {
        Self::new(start, end, Weekday::Wednesday)
    }

    /// Every meeting date in the range, ascending. Empty if the range is backwards.
    pub fn generate(&self) -> Vec<DateKey> {
        if self.end < self.start {
            return Vec::new();
        }

        let days_ahead = (7 + self.meeting_day.number_days_from_monday()
            - self.start.weekday().number_days_from_monday())
            % 7;
        let first_meeting = self.start.checked_add_days(days_ahead as i64);
        let end = self.end;

        std::iter::successors(first_meeting, |meeting| meeting.checked_add_days(7))
            .take_while(|meeting| *meeting <= end)
            .collect()
    }

    pub fn contains(&self, date: DateKey) -> bool {
        date >= self.start && date <= self.end && date.weekday() == self.meeting_day
    }
}
