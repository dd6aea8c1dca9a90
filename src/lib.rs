//! Weekly attendance tracking for a club: a meeting schedule, who showed up
//! to each meeting, and statistics over the meetings so far.

pub mod config;
pub mod db;
pub mod error;
pub mod graphql;
pub mod memo;
pub mod models;
pub mod tracker;
