//! Integration tests for personal notes.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, build_test_app, delete_auth, get_auth, post_json_auth, put_json_auth,
    register_user,
};
use sqlx::PgPool;

async fn create_note(pool: &PgPool, token: &str, title: &str, content: &str) -> i64 {
    let response = post_json_auth(
        build_test_app(pool.clone()),
        "/api/v1/notes",
        serde_json::json!({ "title": title, "content": content }),
        token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn note_crud_round_trip(pool: PgPool) {
    let token = register_user(&pool, "notes@example.com").await;
    let id = create_note(&pool, &token, "  Follow up ", "Call Acme on Tuesday").await;

    let response = get_auth(build_test_app(pool.clone()), &format!("/api/v1/notes/{id}"), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["title"], "Follow up");
    assert_eq!(json["data"]["content"], "Call Acme on Tuesday");

    let response = put_json_auth(
        build_test_app(pool.clone()),
        &format!("/api/v1/notes/{id}"),
        serde_json::json!({ "content": "Called, send quote" }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["title"], "Follow up");
    assert_eq!(json["data"]["content"], "Called, send quote");

    let response = get_auth(build_test_app(pool.clone()), "/api/v1/notes", &token).await;
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);

    let response =
        delete_auth(build_test_app(pool.clone()), &format!("/api/v1/notes/{id}"), &token).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = get_auth(build_test_app(pool), &format!("/api/v1/notes/{id}"), &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn notes_are_invisible_across_users(pool: PgPool) {
    let alice = register_user(&pool, "alice@example.com").await;
    let bob = register_user(&pool, "bob@example.com").await;
    let id = create_note(&pool, &alice, "", "Alice only").await;

    let uri = format!("/api/v1/notes/{id}");
    let response = get_auth(build_test_app(pool.clone()), &uri, &bob).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = put_json_auth(
        build_test_app(pool.clone()),
        &uri,
        serde_json::json!({ "content": "hijacked" }),
        &bob,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = delete_auth(build_test_app(pool.clone()), &uri, &bob).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get_auth(build_test_app(pool.clone()), "/api/v1/notes", &bob).await;
    assert!(body_json(response).await["data"].as_array().unwrap().is_empty());

    let response = get_auth(build_test_app(pool), &uri, &alice).await;
    assert_eq!(body_json(response).await["data"]["content"], "Alice only");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn blank_note_content_is_rejected(pool: PgPool) {
    let token = register_user(&pool, "blank@example.com").await;
    let response = post_json_auth(
        build_test_app(pool),
        "/api/v1/notes",
        serde_json::json!({ "title": "Empty", "content": "   " }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
