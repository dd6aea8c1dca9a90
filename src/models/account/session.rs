use async_graphql::SimpleObject;
use uuid::Uuid;

use crate::db::{AccountStore, RosterStore, Store};
use crate::error::{RollcallError, RollcallResult};
use crate::models::account::{Account, Role};
use crate::models::member::Member;

/// Who is making a request: the logged-in account, its role, and the member
/// it is linked to. Resolved once per request and handed to whatever needs it.
#[derive(Clone, Debug, PartialEq, Eq, SimpleObject)]
pub struct SessionContext {
    /// The logged-in account
    pub account: Account,
    /// The member linked to the account, if there is one
    pub member: Option<Member>,

    #[graphql(skip)]
    pub token: String,
}

impl SessionContext {
    pub async fn resolve(token: &str, store: &dyn Store) -> RollcallResult<Self> {
        let account = store
            .account_for_token(token)
            .await?
            .ok_or(RollcallError::Unauthorized)?;
        let member = Self::linked_member(&account, store).await?;

        Ok(Self {
            account,
            member,
            token: token.to_owned(),
        })
    }

    /// The member explicitly linked to `account`. More than one link means
    /// somebody entered the data wrong, which is reported rather than guessed at.
    pub async fn linked_member(
        account: &Account,
        store: &dyn Store,
    ) -> RollcallResult<Option<Member>> {
        let links = store.links_for_account(account.id).await?;
        let link = match links.as_slice() {
            [] => return Ok(None),
            [link] => *link,
            _ => {
                log::warn!(
                    "Account {} is linked to {} members",
                    account.email,
                    links.len()
                );
                return Err(RollcallError::AmbiguousLink {
                    account_id: account.id,
                    count: links.len(),
                });
            }
        };

        Ok(store
            .list_members()
            .await?
            .into_iter()
            .find(|member| member.id == link.member_id))
    }

    pub fn role(&self) -> Role {
        self.account.role
    }

    pub fn ensure_role(&self, required: Role) -> RollcallResult<()> {
        if self.role().allows(required) {
            Ok(())
        } else {
            Err(RollcallError::Forbidden(required))
        }
    }
}

/// Checks the password and opens a new session, returning its token.
pub async fn login(email: &str, password: &str, store: &dyn Store) -> RollcallResult<String> {
    let credentials = store
        .credentials_for(email)
        .await?
        .ok_or(RollcallError::InvalidCredentials)?;
    if !bcrypt::verify(password, &credentials.pass_hash)? {
        return Err(RollcallError::InvalidCredentials);
    }

    let token = Uuid::new_v4().to_string();
    store.create_session(credentials.id, &token).await?;
    log::info!("{} logged in", email);

    Ok(token)
}

pub async fn logout(context: &SessionContext, store: &dyn Store) -> RollcallResult<()> {
    store.remove_session(&context.token).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::account::{MemberLink, NewAccount};

    async fn store_with_account() -> (MemoryStore, Account) {
        let store = MemoryStore::default();
        let account = Account::create(
            NewAccount {
                email: "grace@example.com".to_owned(),
                password: "correct horse".to_owned(),
                role: Role::Manager,
                member_id: None,
            },
            &store,
        )
        .await
        .unwrap();

        (store, account)
    }

    #[tokio::test]
    async fn login_then_resolve() {
        let (store, account) = store_with_account().await;

        let token = login("grace@example.com", "correct horse", &store)
            .await
            .unwrap();
        let context = SessionContext::resolve(&token, &store).await.unwrap();

        assert_eq!(context.account, account);
        assert_eq!(context.member, None);
        assert!(context.ensure_role(Role::Manager).is_ok());
        assert!(matches!(
            context.ensure_role(Role::Admin),
            Err(RollcallError::Forbidden(Role::Admin))
        ));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let (store, _account) = store_with_account().await;

        assert!(matches!(
            login("grace@example.com", "wrong", &store).await,
            Err(RollcallError::InvalidCredentials)
        ));
        assert!(matches!(
            login("nobody@example.com", "correct horse", &store).await,
            Err(RollcallError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn unknown_token_is_unauthorized() {
        let store = MemoryStore::default();

        assert!(matches!(
            SessionContext::resolve("not-a-token", &store).await,
            Err(RollcallError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn logout_ends_the_session() {
        let (store, _account) = store_with_account().await;
        let token = login("grace@example.com", "correct horse", &store)
            .await
            .unwrap();
        let context = SessionContext::resolve(&token, &store).await.unwrap();

        logout(&context, &store).await.unwrap();

        assert!(SessionContext::resolve(&token, &store).await.is_err());
    }

    #[tokio::test]
    async fn linked_member_is_resolved() {
        let (store, account) = store_with_account().await;
        let member = store.add_member("Grace").await.unwrap();
        Account::link(member.id, account.id, &store).await.unwrap();

        assert_eq!(
            SessionContext::linked_member(&account, &store).await.unwrap(),
            Some(member)
        );
    }

    #[tokio::test]
    async fn more_than_one_link_is_ambiguous() {
        let (store, account) = store_with_account().await;
        let first = store.add_member("Grace").await.unwrap();
        let second = store.add_member("Grace H.").await.unwrap();
        store
            .force_link(MemberLink {
                member_id: first.id,
                account_id: account.id,
            })
            .await;
        store
            .force_link(MemberLink {
                member_id: second.id,
                account_id: account.id,
            })
            .await;

        assert!(matches!(
            SessionContext::linked_member(&account, &store).await,
            Err(RollcallError::AmbiguousLink { count: 2, .. })
        ));
    }
}
