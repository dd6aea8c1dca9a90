//! Error handling for the API.
//!
//! Prefer adding a variant to [RollcallError] over forcing a failure into
//! a generic one. Each variant maps to an HTTP status in [RollcallError::status].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::models::account::Role;
use crate::models::date_key::DateKey;

/// The error enum for all error handling across the crate.
#[derive(Debug, Error)]
pub enum RollcallError {
    /// A stored date string was not a `YYYY-MM-DD` calendar date.
    #[error("malformed date: {0:?}")]
    MalformedDate(String),
    /// A member, guest or account id that doesn't exist.
    #[error("no {kind} with id {id}")]
    UnknownId { kind: &'static str, id: i64 },
    /// Attendance can only be saved for dates on the meeting schedule.
    #[error("{0} is not a scheduled meeting date")]
    UnscheduledDate(DateKey),
    /// The request requires a logged-in account.
    #[error("login required")]
    Unauthorized,
    /// The current account's role is too low for the operation.
    #[error("the {0} role is required")]
    Forbidden(Role),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("the token header is not valid text: {0}")]
    InvalidTokenHeader(#[from] axum::http::header::ToStrError),
    /// An account is linked to more than one member. This is a data-entry
    /// error and has to be fixed by an admin.
    #[error("account {account_id} is linked to {count} members")]
    AmbiguousLink { account_id: i64, count: usize },
    /// Either side of a member link is already taken.
    #[error("member {member_id} or account {account_id} is already linked")]
    LinkConflict { member_id: i64, account_id: i64 },
    #[error("another account already uses the email {0}")]
    DuplicateEmail(String),
    /// The store rejected a read or a write.
    #[error("database error: {0}")]
    Persistence(#[from] sqlx::Error),
    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("failed to hash password: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    /// A detached save task panicked or was cancelled by the runtime.
    #[error("background task failed: {0}")]
    Task(String),
}

/// The return type for all fallible operations.
pub type RollcallResult<T> = Result<T, RollcallError>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    message: String,
    status_code: u16,
}

impl RollcallError {
    pub fn status(&self) -> StatusCode {
        match self {
            RollcallError::Unauthorized | RollcallError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            RollcallError::Forbidden(_) => StatusCode::FORBIDDEN,
            RollcallError::UnknownId { .. } => StatusCode::NOT_FOUND,
            RollcallError::MalformedDate(_)
            | RollcallError::UnscheduledDate(_)
            | RollcallError::InvalidTokenHeader(_)
            | RollcallError::DuplicateEmail(_)
            | RollcallError::LinkConflict { .. } => StatusCode::BAD_REQUEST,
            RollcallError::AmbiguousLink { .. } => StatusCode::CONFLICT,
            RollcallError::Persistence(_)
            | RollcallError::Migration(_)
            | RollcallError::Hash(_)
            | RollcallError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RollcallError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{}", self);
        }

        let body = ErrorBody {
            message: self.to_string(),
            status_code: status.as_u16(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_error_kind() {
        assert_eq!(RollcallError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            RollcallError::Forbidden(Role::Admin).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            RollcallError::UnknownId { kind: "member", id: 3 }.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RollcallError::Task("gone".to_owned()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn messages_name_the_problem() {
        assert_eq!(
            RollcallError::UnknownId { kind: "guest", id: 9 }.to_string(),
            "no guest with id 9"
        );
        assert_eq!(
            RollcallError::Forbidden(Role::Manager).to_string(),
            "the manager role is required"
        );
    }
}
