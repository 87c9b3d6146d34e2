//! Shared helpers for integration tests: an in-process HTTP fixture that
//! behaves like a handful of upstream stream servers, and database seeding.

#![allow(dead_code)]

use axum::Router;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Redirect};
use axum::routing::get;

use channel_dispatcher::database::Database;
use channel_dispatcher::database::repositories::{AccountSeaOrmRepository, FeedSeaOrmRepository};
use channel_dispatcher::models::{
    Account, AccountCreateRequest, Feed, FeedCreateRequest, IdentityField,
};

/// Sync byte of an MPEG-TS packet
const TS_SYNC: u8 = 0x47;

async fn ts_payload() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, HeaderValue::from_static("video/mp2t"))],
        vec![TS_SYNC; 4096],
    )
}

async fn json_payload() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        r#"{"stream":"not a transport stream"}"#,
    )
}

async fn method_not_allowed() -> StatusCode {
    StatusCode::METHOD_NOT_ALLOWED
}

async fn empty_body() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"))],
        Vec::<u8>::new(),
    )
}

fn build_router() -> Router {
    Router::new()
        // HEAD falls through to the GET handler
        .route("/ok.ts", get(ts_payload))
        .route("/no-head.ts", get(ts_payload).head(method_not_allowed))
        .route("/empty.ts", get(empty_body).head(method_not_allowed))
        .route("/odd-type", get(json_payload).head(method_not_allowed))
        .route("/hop", get(|| async { Redirect::temporary("/ok.ts") }))
        .route("/loop", get(|| async { Redirect::temporary("/loop") }))
}

/// Start the fixture on `127.0.0.1:0` and return its base URL without a
/// trailing slash. The server lives until the test runtime shuts down.
pub async fn spawn_fixture() -> String {
    let listener =
        std::net::TcpListener::bind("127.0.0.1:0").expect("failed to bind fixture server");
    listener
        .set_nonblocking(true)
        .expect("failed to set fixture listener non-blocking");
    let addr = listener.local_addr().expect("fixture has no local address");

    tokio::spawn(async move {
        let listener =
            tokio::net::TcpListener::from_std(listener).expect("failed to adopt fixture listener");
        axum::serve(listener, build_router())
            .await
            .expect("fixture server failed");
    });

    format!("http://{addr}")
}

pub async fn seed_account(db: &Database, name: &str) -> anyhow::Result<Account> {
    Ok(AccountSeaOrmRepository::new(db.connection())
        .create(AccountCreateRequest {
            name: name.to_string(),
            user_agent: None,
            file_path: None,
            is_active: true,
        })
        .await?)
}

pub async fn seed_feed(
    db: &Database,
    account: &Account,
    name: &str,
    url: &str,
) -> anyhow::Result<Feed> {
    Ok(FeedSeaOrmRepository::new(db.connection())
        .create(
            FeedCreateRequest {
                account_id: account.id,
                name: name.to_string(),
                url: url.to_string(),
                guide_id: None,
            },
            &[IdentityField::Name, IdentityField::Url, IdentityField::GuideId],
        )
        .await?)
}
