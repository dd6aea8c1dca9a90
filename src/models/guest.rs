use async_graphql::{InputObject, SimpleObject};

/// Someone who attends meetings without being a member.
#[derive(Clone, Debug, PartialEq, Eq, SimpleObject, sqlx::FromRow)]
pub struct Guest {
    /// The guest's ID
    pub id: i64,
    /// The guest's display name
    pub name: String,
    /// Free-form notes, like who invited them
    pub notes: Option<String>,
}

#[derive(InputObject)]
pub struct NewGuest {
    pub name: String,
    pub notes: Option<String>,
}
