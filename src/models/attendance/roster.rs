use std::collections::BTreeSet;

use async_graphql::{OutputType, SimpleObject};

use crate::models::attendance::{AttendanceRecord, ReconciledEntry};
use crate::models::date_key::DateKey;
use crate::models::guest::Guest;
use crate::models::member::Member;

/// Anything that can be marked present at a meeting.
pub trait Attendee {
    /// Used in log messages, e.g. "member" or "guest"
    const KIND: &'static str;

    fn id(&self) -> i64;
}

impl Attendee for Member {
    const KIND: &'static str = "member";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Attendee for Guest {
    const KIND: &'static str = "guest";

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Clone, Debug, PartialEq, Eq, SimpleObject)]
#[graphql(concrete(name = "MemberRosterEntry", params(Member)))]
#[graphql(concrete(name = "GuestRosterEntry", params(Guest)))]
pub struct RosterEntry<T: OutputType> {
    /// Who this entry is for
    pub attendee: T,
    /// Whether they are marked present for the selected date
    pub present: bool,
}

/// The people who can attend, each marked present or absent for the
/// currently selected date.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Roster<T: OutputType>(Vec<RosterEntry<T>>);

impl<T: Attendee + OutputType> Roster<T> {
    /// Everyone starts out absent.
    pub fn absent(attendees: Vec<T>) -> Self {
        Self(
            attendees
                .into_iter()
                .map(|attendee| RosterEntry {
                    attendee,
                    present: false,
                })
                .collect(),
        )
    }

    pub fn entries(&self) -> &[RosterEntry<T>] {
        &self.0
    }

    pub fn into_entries(self) -> Vec<RosterEntry<T>> {
        self.0
    }

    /// Flips exactly one entry. An id that isn't on the roster leaves it
    /// unchanged, since a toggle can arrive after the roster was edited.
    #[must_use]
    pub fn toggle(mut self, id: i64) -> Self {
        match self.0.iter_mut().find(|entry| entry.attendee.id() == id) {
            Some(entry) => entry.present = !entry.present,
            None => log::debug!("Ignoring toggle for unknown {} {}", T::KIND, id),
        }

        self
    }

    /// Marks exactly the given ids present and everyone else absent.
    #[must_use]
    pub fn with_present(mut self, ids: &BTreeSet<i64>) -> Self {
        for entry in &mut self.0 {
            entry.present = ids.contains(&entry.attendee.id());
        }

        self
    }

    pub fn present_ids(&self) -> BTreeSet<i64> {
        self.0
            .iter()
            .filter(|entry| entry.present)
            .map(|entry| entry.attendee.id())
            .collect()
    }
}

pub fn toggle_member(roster: Roster<Member>, member_id: i64) -> Roster<Member> {
    roster.toggle(member_id)
}

pub fn toggle_guest(roster: Roster<Guest>, guest_id: i64) -> Roster<Guest> {
    roster.toggle(guest_id)
}

/// The record to persist for `date` given who is currently marked present.
pub fn build_record(
    date: DateKey,
    members: &Roster<Member>,
    guests: &Roster<Guest>,
) -> AttendanceRecord {
    AttendanceRecord {
        date,
        present_member_ids: members.present_ids(),
        present_guest_ids: guests.present_ids(),
    }
}

/// Marks the rosters with who attended `date`. If the history has no entry
/// for the date, everyone is marked absent.
pub fn load_for_date(
    date: DateKey,
    history: &[ReconciledEntry],
    members: Roster<Member>,
    guests: Roster<Guest>,
) -> (Roster<Member>, Roster<Guest>) {
    match history.iter().find(|entry| entry.date == date) {
        Some(entry) => (
            members.with_present(&entry.present_member_ids),
            guests.with_present(&entry.present_guest_ids),
        ),
        None => {
            log::debug!("No history entry for {}, marking everyone absent", date);
            (
                members.with_present(&BTreeSet::new()),
                guests.with_present(&BTreeSet::new()),
            )
        }
    }
}
