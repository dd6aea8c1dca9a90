use std::sync::Arc;

use anyhow::{Context, Result};
use async_graphql::http::{playground_source, GraphQLPlaygroundConfig};
use async_graphql::{Request, Response};
use axum::http::HeaderMap;
use axum::response::Html;
use axum::routing::get;
use axum::{Extension, Json, Router};
use tower_http::cors::CorsLayer;

use rollcall::config::Config;
use rollcall::db;
use rollcall::error::{RollcallError, RollcallResult};
use rollcall::graphql::{build_schema, RollcallSchema};
use rollcall::models::account::session::SessionContext;
use rollcall::models::account::Account;
use rollcall::tracker::Tracker;

const ROLLCALL_TOKEN: &str = "ROLLCALL_TOKEN";

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    // Read before the runtime starts any threads, see `Config::from_env`.
    let config = Config::from_env()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?
        .block_on(serve(config))
}

async fn serve(config: Config) -> Result<()> {
    let store = db::connect(config.database_url.as_deref())
        .await
        .context("Failed to set up the store")?;

    if let Some(admin) = &config.admin {
        let created = Account::bootstrap_admin(&admin.email, &admin.password, store.as_ref())
            .await
            .context("Failed to create the initial admin")?;
        if let Some(account) = created {
            log::info!("Created initial admin {}", account.email);
        }
    }

    let tracker = Arc::new(Tracker::new(store, config.schedule(), config.utc_offset));
    let schema = build_schema(Arc::clone(&tracker));

    let app = Router::new()
        .route("/", get(playground).post(query))
        .layer(Extension(schema))
        .layer(Extension(tracker))
        .layer(CorsLayer::permissive());

    log::info!("Listening on {}", config.address);
    axum::Server::bind(&config.address)
        .serve(app.into_make_service())
        .await
        .context("Server stopped unexpectedly")
}

async fn query(
    Extension(schema): Extension<RollcallSchema>,
    Extension(tracker): Extension<Arc<Tracker>>,
    headers: HeaderMap,
    Json(request): Json<Request>,
) -> RollcallResult<Json<Response>> {
    let request = match get_token(&headers)? {
        Some(token) => request.data(SessionContext::resolve(token, tracker.store()).await?),
        None => request,
    };

    Ok(Json(schema.execute(request).await))
}

async fn playground(headers: HeaderMap) -> RollcallResult<Html<String>> {
    let mut config = GraphQLPlaygroundConfig::new("/");
    if let Some(token) = get_token(&headers)? {
        config = config.with_header(ROLLCALL_TOKEN, token);
    }

    Ok(Html(playground_source(config)))
}

fn get_token(headers: &HeaderMap) -> RollcallResult<Option<&str>> {
    headers
        .get(ROLLCALL_TOKEN)
        .map(|value| value.to_str().map_err(RollcallError::from))
        .transpose()
}
