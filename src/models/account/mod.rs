use std::fmt;

use async_graphql::{Enum, InputObject, SimpleObject};

use crate::db::{AccountStore, RosterStore, Store};
use crate::error::{RollcallError, RollcallResult};

pub mod session;

/// How much an account is allowed to do. Each role can do everything the
/// roles below it can.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Enum, sqlx::Type)]
#[sqlx(type_name = "role", rename_all = "lowercase")]
pub enum Role {
    /// Can view attendance, history and statistics
    User,
    /// Can also record attendance and manage members and guests
    Manager,
    /// Can also manage accounts, roles and member links
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }

    pub fn allows(&self, required: Role) -> bool {
        *self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A login for the site.
#[derive(Clone, Debug, PartialEq, Eq, SimpleObject, sqlx::FromRow)]
pub struct Account {
    /// The account's ID
    pub id: i64,
    /// The email used to log in, which must be unique
    pub email: String,
    /// What the account is allowed to do
    pub role: Role,
}

/// An account together with its password hash. Never leaves the server.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Credentials {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub pass_hash: String,
}

impl Credentials {
    pub fn account(&self) -> Account {
        Account {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Ties a member on the roster to the account they log in with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, SimpleObject, sqlx::FromRow)]
pub struct MemberLink {
    /// The linked member
    pub member_id: i64,
    /// The linked account
    pub account_id: i64,
}

#[derive(InputObject)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    #[graphql(default_with = "Role::User")]
    pub role: Role,
    /// The member to link the account to, if any
    pub member_id: Option<i64>,
}

pub const HASH_COST: u32 = 10;

impl Account {
    /// Creates the account and, if a member is named, links the two.
    pub async fn create(new_account: NewAccount, store: &dyn Store) -> RollcallResult<Account> {
        if store.credentials_for(&new_account.email).await?.is_some() {
            return Err(RollcallError::DuplicateEmail(new_account.email));
        }
        if let Some(member_id) = new_account.member_id {
            Self::ensure_member_exists(member_id, store).await?;
        }

        let pass_hash = bcrypt::hash(&new_account.password, HASH_COST)?;
        let account = store
            .create_account(
                &new_account.email,
                &pass_hash,
                new_account.role,
                new_account.member_id,
            )
            .await?;
        log::info!("Created {} account {}", account.role, account.email);

        Ok(account)
    }

    /// Creates the first admin, unless any account already exists.
    pub async fn bootstrap_admin(
        email: &str,
        password: &str,
        store: &dyn Store,
    ) -> RollcallResult<Option<Account>> {
        if store.account_count().await? > 0 {
            return Ok(None);
        }

        let admin = Self::create(
            NewAccount {
                email: email.to_owned(),
                password: password.to_owned(),
                role: Role::Admin,
                member_id: None,
            },
            store,
        )
        .await?;

        Ok(Some(admin))
    }

    pub async fn link(member_id: i64, account_id: i64, store: &dyn Store) -> RollcallResult<()> {
        Self::ensure_member_exists(member_id, store).await?;
        if !store
            .list_accounts()
            .await?
            .iter()
            .any(|account| account.id == account_id)
        {
            return Err(RollcallError::UnknownId {
                kind: "account",
                id: account_id,
            });
        }

        store
            .link_member(MemberLink {
                member_id,
                account_id,
            })
            .await
    }

    async fn ensure_member_exists(member_id: i64, store: &dyn Store) -> RollcallResult<()> {
        if store
            .list_members()
            .await?
            .iter()
            .any(|member| member.id == member_id)
        {
            Ok(())
        } else {
            Err(RollcallError::UnknownId {
                kind: "member",
                id: member_id,
            })
        }
    }
}
