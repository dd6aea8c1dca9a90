use async_graphql::SimpleObject;

use crate::models::attendance::ReconciledEntry;
use crate::models::date_key::DateKey;
use crate::models::member::Member;

/// The history entries on or before a single evaluation date.
///
/// Every aggregate takes this instead of the raw history so that one report
/// never mixes two different notions of "now".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PastEntries {
    as_of: DateKey,
    entries: Vec<ReconciledEntry>,
}

impl PastEntries {
    pub fn as_of(history: &[ReconciledEntry], as_of: DateKey) -> Self {
        Self {
            as_of,
            entries: history
                .iter()
                .filter(|entry| entry.date <= as_of)
                .cloned()
                .collect(),
        }
    }

    pub fn evaluated_on(&self) -> DateKey {
        self.as_of
    }

    pub fn entries(&self) -> &[ReconciledEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Days from the first to the last past meeting, counting both ends.
    /// Zero when there are no past meetings.
    pub fn total_days(&self) -> i64 {
        let first = self.entries.iter().map(|entry| entry.date).min();
        let last = self.entries.iter().map(|entry| entry.date).max();

        match (first, last) {
            (Some(first), Some(last)) => first.days_until(last) + 1,
            _ => 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, SimpleObject)]
pub struct MemberStat {
    /// The member these stats are for
    pub member_id: i64,
    /// How many past meetings the member attended
    pub presence_count: usize,
    /// The share of past meetings the member attended, out of 100
    pub presence_percentage: f64,
    /// Meetings attended per day of the club's elapsed calendar, out of 100
    pub total_participation: f64,
}

/// Mean attendance percentage over the past meetings that had anyone to count.
///
/// Meetings with nothing recorded (a total of zero) are left out of the mean.
pub fn average_attendance_percent(past: &PastEntries) -> f64 {
    let percentages: Vec<f64> = past
        .entries()
        .iter()
        .filter(|entry| entry.total_count > 0)
        .map(|entry| entry.present_count as f64 / entry.total_count as f64 * 100.0)
        .collect();

    if percentages.is_empty() {
        0.0
    } else {
        percentages.iter().sum::<f64>() / percentages.len() as f64
    }
}

/// Mean number of people present per past meeting.
pub fn average_presence(past: &PastEntries) -> f64 {
    if past.is_empty() {
        return 0.0;
    }

    let total_present: usize = past.entries().iter().map(|entry| entry.present_count).sum();
    total_present as f64 / past.len() as f64
}

pub fn per_member_stats(members: &[Member], past: &PastEntries) -> Vec<MemberStat> {
    let meetings = past.len();
    let total_days = past.total_days();

    members
        .iter()
        .map(|member| {
            let presence_count = past
                .entries()
                .iter()
                .filter(|entry| entry.present_member_ids.contains(&member.id))
                .count();

            MemberStat {
                member_id: member.id,
                presence_count,
                presence_percentage: percent_of(presence_count, meetings as f64),
                total_participation: percent_of(presence_count, total_days as f64),
            }
        })
        .collect()
}

fn percent_of(count: usize, out_of: f64) -> f64 {
    if out_of > 0.0 {
        count as f64 / out_of * 100.0
    } else {
        0.0
    }
}

/// Everything the statistics view shows, computed against one evaluation date.
#[derive(Clone, Debug, PartialEq, SimpleObject)]
pub struct StatsReport {
    /// The date the report was evaluated on
    pub as_of: DateKey,
    /// How many scheduled meetings happened on or before `as_of`
    pub past_meetings: usize,
    /// The mean attendance percentage across those meetings
    pub average_attendance_percent: f64,
    /// The mean number of people present per meeting
    pub average_presence: f64,
    /// Days from the first to the last of those meetings, inclusive
    pub total_days: i64,
    /// Per-member attendance
    pub member_stats: Vec<MemberStat>,
}

impl StatsReport {
    pub fn compute(members: &[Member], past: &PastEntries) -> Self {
        Self {
            as_of: past.evaluated_on(),
            past_meetings: past.len(),
            average_attendance_percent: average_attendance_percent(past),
            average_presence: average_presence(past),
            total_days: past.total_days(),
            member_stats: per_member_stats(members, past),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;
    use crate::tests::mock::{entry, mock_members};

    fn key(date: time::Date) -> DateKey {
        DateKey::from_date(date)
    }

    #[test]
    fn empty_history_gives_zeroes() {
        let past = PastEntries::as_of(&[], key(date!(2025-01-08)));

        assert_eq!(average_attendance_percent(&past), 0.0);
        assert_eq!(average_presence(&past), 0.0);
        assert_eq!(past.total_days(), 0);
        for stat in per_member_stats(&mock_members(), &past) {
            assert_eq!(stat.presence_count, 0);
            assert_eq!(stat.presence_percentage, 0.0);
            assert_eq!(stat.total_participation, 0.0);
        }
    }

    #[test]
    fn average_attendance_is_mean_of_percentages() {
        let history = vec![
            entry(date!(2025-01-01), &[1, 2], 4),
            entry(date!(2025-01-08), &[1, 2, 3, 4], 4),
        ];
        let past = PastEntries::as_of(&history, key(date!(2025-01-08)));

        assert_eq!(average_attendance_percent(&past), 75.0);
        assert_eq!(average_presence(&past), 3.0);
    }

    #[test]
    fn unrecorded_meetings_are_left_out_of_the_percentage() {
        let history = vec![
            entry(date!(2025-01-01), &[1, 2], 4),
            ReconciledEntry::empty(key(date!(2025-01-08))),
        ];
        let past = PastEntries::as_of(&history, key(date!(2025-01-08)));

        let average = average_attendance_percent(&past);
        assert!(average.is_finite());
        assert_eq!(average, 50.0);
        assert_eq!(average_presence(&past), 1.0);
    }

    #[test]
    fn only_past_meetings_count() {
        let history = vec![
            entry(date!(2025-01-01), &[1], 2),
            entry(date!(2025-01-08), &[1, 2], 2),
            entry(date!(2025-01-15), &[], 2),
        ];

        let past = PastEntries::as_of(&history, key(date!(2025-01-08)));

        assert_eq!(past.len(), 2);
        assert_eq!(past.evaluated_on(), key(date!(2025-01-08)));
        assert_eq!(average_attendance_percent(&past), 75.0);
    }

    #[test]
    fn per_member_counts_and_percentages() {
        let history = vec![
            entry(date!(2025-01-01), &[1, 2], 4),
            entry(date!(2025-01-08), &[1], 4),
            entry(date!(2025-01-15), &[1, 3], 4),
            entry(date!(2025-01-22), &[], 4),
        ];
        let past = PastEntries::as_of(&history, key(date!(2025-01-31)));

        let stats = per_member_stats(&mock_members(), &past);

        assert_eq!(past.total_days(), 22);
        assert_eq!(stats[0].member_id, 1);
        assert_eq!(stats[0].presence_count, 3);
        assert_eq!(stats[0].presence_percentage, 75.0);
        assert_eq!(stats[0].total_participation, 3.0 / 22.0 * 100.0);
        assert_eq!(stats[1].presence_count, 1);
        assert_eq!(stats[1].presence_percentage, 25.0);
        assert_eq!(stats[3].presence_count, 0);
    }

    #[test]
    fn single_meeting_spans_one_day() {
        let history = vec![entry(date!(2025-01-08), &[1], 1)];
        let past = PastEntries::as_of(&history, key(date!(2025-01-08)));

        let stats = per_member_stats(&mock_members(), &past);

        assert_eq!(past.total_days(), 1);
        assert_eq!(stats[0].total_participation, 100.0);
    }

    #[test]
    fn report_bundles_everything() {
        let history = vec![
            entry(date!(2025-01-01), &[1, 2], 4),
            entry(date!(2025-01-08), &[1, 2, 3, 4], 4),
        ];
        let past = PastEntries::as_of(&history, key(date!(2025-01-10)));

        let report = StatsReport::compute(&mock_members(), &past);

        assert_eq!(report.as_of, key(date!(2025-01-10)));
        assert_eq!(report.past_meetings, 2);
        assert_eq!(report.average_attendance_percent, 75.0);
        assert_eq!(report.total_days, 8);
        assert_eq!(report.member_stats.len(), mock_members().len());
    }
}
