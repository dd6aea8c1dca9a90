use std::sync::Arc;

use async_graphql::{EmptySubscription, Schema};

use crate::graphql::mutation::MutationRoot;
use crate::graphql::query::QueryRoot;
use crate::tracker::Tracker;

pub mod guards;
pub mod mutation;
pub mod query;

pub const SUCCESS_MESSAGE: &str = "success";

pub type RollcallSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// The schema, with the tracker available to every resolver. The caller adds
/// the request's `SessionContext`, if it has one.
pub fn build_schema(tracker: Arc<Tracker>) -> RollcallSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(tracker)
        .finish()
}
