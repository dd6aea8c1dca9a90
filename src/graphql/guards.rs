use async_graphql::{Context, Guard, Result};

use crate::error::RollcallError;
use crate::models::account::session::SessionContext;
use crate::models::account::Role;

pub struct LoggedIn;

#[async_trait::async_trait]
impl Guard for LoggedIn {
    async fn check(&self, ctx: &Context<'_>) -> Result<()> {
        if ctx.data_opt::<SessionContext>().is_some() {
            Ok(())
        } else {
            Err(RollcallError::Unauthorized.into())
        }
    }
}

/// Passes for any logged-in account whose role is at least the given one.
pub struct HasRole(pub Role);

impl HasRole {
    pub const MANAGER: Self = Self(Role::Manager);
    pub const ADMIN: Self = Self(Role::Admin);
}

#[async_trait::async_trait]
impl Guard for HasRole {
    async fn check(&self, ctx: &Context<'_>) -> Result<()> {
        let session = ctx
            .data_opt::<SessionContext>()
            .ok_or(RollcallError::Unauthorized)?;
        session.ensure_role(self.0)?;

        Ok(())
    }
}
