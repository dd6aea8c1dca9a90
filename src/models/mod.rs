pub mod account;
pub mod attendance;
pub mod date_key;
pub mod guest;
pub mod member;
pub mod schedule;
pub mod stats;
