use async_graphql::{InputObject, SimpleObject};

/// A club member. Members are deactivated rather than deleted so their
/// attendance history keeps its names.
#[derive(Clone, Debug, PartialEq, Eq, SimpleObject, sqlx::FromRow)]
pub struct Member {
    /// The member's ID, which is unique and stable
    pub id: i64,
    /// The member's display name
    pub name: String,
    /// Whether the member currently shows up on the attendance roster
    pub active: bool,
}

#[derive(InputObject)]
pub struct NewMember {
    pub name: String,
}

impl Member {
    pub fn active_only(members: Vec<Member>) -> Vec<Member> {
        members.into_iter().filter(|member| member.active).collect()
    }
}
