use std::sync::Arc;

use super::*;
use crate::test_support::{
    context_with, failing_context, memory_context, memory_storage, spawn_stand_in, unreachable,
    Failures, DEMO_TOKEN,
};
use axum::{http::StatusCode, routing::get, Json, Router};
use google_client::identity::normalize_subject;

async fn userinfo_stand_in() -> url::Url {
    let app = Router::new().route(
        "/userinfo",
        get(|| async {
            Json(serde_json::json!({
                "sub": "118000000000000000001",
                "name": "Choi Minseo",
                "email": "choi@company.com",
                "picture": "https://lh3.example/choi.jpg",
            }))
        }),
    );
    spawn_stand_in(app, "/userinfo").await
}

#[tokio::test]
async fn google_login_upserts_profile_and_records_session() {
    let storage = memory_storage().await;
    let ctx = context_with(
        Arc::new(storage.clone()),
        userinfo_stand_in().await,
        unreachable(),
    );

    let response = login_with_google(&ctx, "ya29.token", Some("tests")).await;

    assert!(!response.fallback);
    assert_eq!(response.access_token, "ya29.token");
    assert_eq!(response.user.id, normalize_subject("118000000000000000001"));
    assert_eq!(response.user.full_name, "Choi Minseo");

    let stored = storage
        .profile(response.user.id)
        .await
        .expect("profile")
        .expect("stored");
    assert_eq!(stored, response.user);
    let sessions = storage.session_count(response.user.id).await;
    assert_eq!(sessions.expect("count"), 1);
}

#[tokio::test]
async fn rejected_token_signs_in_as_fallback_admin() {
    let storage = memory_storage().await;
    let app = Router::new().route(
        "/userinfo",
        get(|| async { (StatusCode::UNAUTHORIZED, "expired") }),
    );
    let userinfo = spawn_stand_in(app, "/userinfo").await;
    let ctx = context_with(Arc::new(storage.clone()), userinfo, unreachable());

    let response = login_with_google(&ctx, "expired", None).await;

    assert!(response.fallback);
    assert_eq!(response.user, fallback_admin());
    let sessions = storage.session_count(response.user.id).await;
    assert_eq!(sessions.expect("count"), 1);
}

#[tokio::test]
async fn demo_login_returns_the_demo_credential() {
    let (ctx, storage) = memory_context().await;

    let response = login_demo(&ctx, None).await;

    assert_eq!(response.user, demo_user());
    assert_eq!(response.access_token, DEMO_TOKEN);
    assert!(!response.fallback);
    let users = storage.list_profiles().await.expect("profiles");
    assert_eq!(users, vec![demo_user()]);
}

#[tokio::test]
async fn session_failure_does_not_block_sign_in() {
    let (ctx, storage) = failing_context(Failures {
        record_session: true,
        ..Failures::default()
    })
    .await;

    let response = login_demo(&ctx, Some("tests")).await;

    assert_eq!(response.user, demo_user());
    let profile = storage.profile(response.user.id).await.expect("profile");
    assert!(profile.is_some());
    let sessions = storage.session_count(response.user.id).await;
    assert_eq!(sessions.expect("count"), 0);
}

#[tokio::test]
async fn profile_failure_skips_the_session_record() {
    let (ctx, storage) = failing_context(Failures {
        upsert_profile: true,
        ..Failures::default()
    })
    .await;

    let response = login_demo(&ctx, None).await;

    assert_eq!(response.user, demo_user());
    let profile = storage.profile(response.user.id).await.expect("profile");
    assert!(profile.is_none());
    let sessions = storage.session_count(response.user.id).await;
    assert_eq!(sessions.expect("count"), 0);
}
