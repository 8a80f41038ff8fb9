//! HTTP-level integration tests for registration, login, token refresh,
//! logout and password reset.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{
    body_json, build_test_app, build_test_app_with, get_auth, post_auth, post_json, register,
    seed_license, TestIntegrations, ADMIN_EMAIL, TEST_PASSWORD,
};
use courier_core::verification::MAX_CODE_ATTEMPTS;
use courier_db::repositories::{LicenseKeyRepo, UserRepo};
use sqlx::PgPool;

async fn login(pool: &PgPool, email: &str, password: &str) -> axum::response::Response {
    let body = serde_json::json!({ "email": email, "password": password });
    post_json(build_test_app(pool.clone()), "/api/v1/auth/login", body).await
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn register_returns_tokens_and_user(pool: PgPool) {
    let license = seed_license(&pool, None).await;
    let json = register(&pool, "  New.User@Example.com ", &license.key.to_lowercase()).await;

    assert!(json["access_token"].is_string());
    assert!(json["refresh_token"].is_string());
    assert_eq!(json["expires_in"], 15 * 60);
    assert_eq!(json["user"]["email"], "new.user@example.com");
    assert_eq!(json["user"]["role"], "user");
    assert_eq!(json["user"]["license_key_id"], license.id);
    assert!(json["user"].get("password_hash").is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn register_grants_admin_role_to_configured_emails(pool: PgPool) {
    let license = seed_license(&pool, None).await;
    let json = register(&pool, ADMIN_EMAIL, &license.key).await;
    assert_eq!(json["user"]["role"], "admin");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn register_rejects_unknown_license_key(pool: PgPool) {
    let body = serde_json::json!({
        "email": "someone@example.com",
        "full_name": "Someone",
        "password": TEST_PASSWORD,
        "license_key": "ABCDE-FGHJK-LMNPQ-RSTUV",
    });
    let response = post_json(build_test_app(pool), "/api/v1/auth/register", body).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn register_rejects_malformed_license_key(pool: PgPool) {
    let body = serde_json::json!({
        "email": "someone@example.com",
        "full_name": "Someone",
        "password": TEST_PASSWORD,
        "license_key": "not-a-key",
    });
    let response = post_json(build_test_app(pool), "/api/v1/auth/register", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn register_rejects_revoked_and_expired_keys(pool: PgPool) {
    let revoked = seed_license(&pool, None).await;
    LicenseKeyRepo::revoke(&pool, revoked.id).await.unwrap();
    let expired = seed_license(&pool, Some(Utc::now() - Duration::days(1))).await;

    for key in [&revoked.key, &expired.key] {
        let body = serde_json::json!({
            "email": "late@example.com",
            "full_name": "Late",
            "password": TEST_PASSWORD,
            "license_key": key,
        });
        let response =
            post_json(build_test_app(pool.clone()), "/api/v1/auth/register", body).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn register_duplicate_email_returns_409(pool: PgPool) {
    let license = seed_license(&pool, None).await;
    register(&pool, "dup@example.com", &license.key).await;

    let body = serde_json::json!({
        "email": "DUP@example.com",
        "full_name": "Again",
        "password": TEST_PASSWORD,
        "license_key": license.key,
    });
    let response = post_json(build_test_app(pool), "/api/v1/auth/register", body).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn register_rejects_weak_password(pool: PgPool) {
    let license = seed_license(&pool, None).await;
    let body = serde_json::json!({
        "email": "weak@example.com",
        "full_name": "Weak",
        "password": "letters-only",
        "license_key": license.key,
    });
    let response = post_json(build_test_app(pool), "/api/v1/auth/register", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn login_success_and_failures(pool: PgPool) {
    let license = seed_license(&pool, None).await;
    register(&pool, "login@example.com", &license.key).await;

    let ok = login(&pool, "LOGIN@example.com", TEST_PASSWORD).await;
    assert_eq!(ok.status(), StatusCode::OK);
    let json = body_json(ok).await;
    assert_eq!(json["user"]["email"], "login@example.com");

    let wrong = login(&pool, "login@example.com", "wrong-password-1").await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let ghost = login(&pool, "ghost@example.com", TEST_PASSWORD).await;
    assert_eq!(ghost.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn login_inactive_user_returns_403(pool: PgPool) {
    let license = seed_license(&pool, None).await;
    let json = register(&pool, "inactive@example.com", &license.key).await;
    let user_id = json["user"]["id"].as_i64().unwrap();
    UserRepo::deactivate(&pool, user_id).await.unwrap();

    let response = login(&pool, "inactive@example.com", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn revoked_license_blocks_login(pool: PgPool) {
    let license = seed_license(&pool, None).await;
    register(&pool, "revoked@example.com", &license.key).await;
    LicenseKeyRepo::revoke(&pool, license.id).await.unwrap();

    let response = login(&pool, "revoked@example.com", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["code"], "FORBIDDEN");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn expired_license_blocks_login(pool: PgPool) {
    let license = seed_license(&pool, None).await;
    register(&pool, "expired@example.com", &license.key).await;
    sqlx::query("UPDATE license_keys SET expires_at = NOW() - INTERVAL '1 hour' WHERE id = $1")
        .bind(license.id)
        .execute(&pool)
        .await
        .unwrap();

    let response = login(&pool, "expired@example.com", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn account_locks_after_five_failures(pool: PgPool) {
    let license = seed_license(&pool, None).await;
    register(&pool, "lockme@example.com", &license.key).await;

    for _ in 0..5 {
        let response = login(&pool, "lockme@example.com", "wrong-password-1").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // Correct password is refused while locked.
    let response = login(&pool, "lockme@example.com", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn expired_lock_starts_a_fresh_failure_count(pool: PgPool) {
    let license = seed_license(&pool, None).await;
    register(&pool, "relock@example.com", &license.key).await;

    for _ in 0..5 {
        login(&pool, "relock@example.com", "wrong-password-1").await;
    }
    sqlx::query("UPDATE users SET locked_until = $1 WHERE email = $2")
        .bind(Utc::now() - Duration::minutes(1))
        .bind("relock@example.com")
        .execute(&pool)
        .await
        .unwrap();

    let response = login(&pool, "relock@example.com", "wrong-password-1").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let user = UserRepo::find_by_email(&pool, "relock@example.com").await.unwrap().unwrap();
    assert_eq!(user.failed_login_count, 1);
    assert!(user.locked_until.is_none());

    let response = login(&pool, "relock@example.com", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Refresh / logout
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn refresh_rotates_token_and_rejects_replay(pool: PgPool) {
    let license = seed_license(&pool, None).await;
    let json = register(&pool, "refresh@example.com", &license.key).await;
    let refresh_token = json["refresh_token"].as_str().unwrap().to_string();

    let body = serde_json::json!({ "refresh_token": refresh_token });
    let response = post_json(build_test_app(pool.clone()), "/api/v1/auth/refresh", body.clone()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = body_json(response).await;
    assert_ne!(rotated["refresh_token"].as_str().unwrap(), refresh_token);

    let replay = post_json(build_test_app(pool), "/api/v1/auth/refresh", body).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn refresh_rechecks_license(pool: PgPool) {
    let license = seed_license(&pool, None).await;
    let json = register(&pool, "refresh2@example.com", &license.key).await;
    LicenseKeyRepo::revoke(&pool, license.id).await.unwrap();

    let body = serde_json::json!({ "refresh_token": json["refresh_token"] });
    let response = post_json(build_test_app(pool), "/api/v1/auth/refresh", body).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn logout_revokes_refresh_tokens(pool: PgPool) {
    let license = seed_license(&pool, None).await;
    let json = register(&pool, "logout@example.com", &license.key).await;
    let access = json["access_token"].as_str().unwrap();

    let response = post_auth(build_test_app(pool.clone()), "/api/v1/auth/logout", access).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let body = serde_json::json!({ "refresh_token": json["refresh_token"] });
    let response = post_json(build_test_app(pool), "/api/v1/auth/refresh", body).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn protected_route_requires_bearer_token(pool: PgPool) {
    let response = get_auth(build_test_app(pool), "/api/v1/settings", "garbage").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Password reset
// ---------------------------------------------------------------------------

fn extract_code(html: &str) -> String {
    let start = html.find("<strong>").unwrap() + "<strong>".len();
    let end = html[start..].find("</strong>").unwrap() + start;
    html[start..end].to_string()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn verification_code_is_accepted_for_unknown_email(pool: PgPool) {
    let integrations = TestIntegrations::default();
    let body = serde_json::json!({ "email": "nobody@example.com" });
    let response = post_json(
        build_test_app_with(pool, &integrations),
        "/api/v1/auth/verification-code",
        body,
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(integrations.transport.sent().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn password_reset_code_is_single_use(pool: PgPool) {
    let license = seed_license(&pool, None).await;
    register(&pool, "reset@example.com", &license.key).await;
    let integrations = TestIntegrations::default();

    let response = post_json(
        build_test_app_with(pool.clone(), &integrations),
        "/api/v1/auth/verification-code",
        serde_json::json!({ "email": "reset@example.com" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let sent = integrations.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "reset@example.com");
    let code = extract_code(&sent[0].html_body);
    assert_eq!(code.len(), 6);

    let reset = serde_json::json!({
        "email": "reset@example.com",
        "code": code,
        "new_password": "brand-new-pass-2",
    });
    let response =
        post_json(build_test_app(pool.clone()), "/api/v1/auth/password-reset", reset.clone()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let replay = post_json(build_test_app(pool.clone()), "/api/v1/auth/password-reset", reset).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(
        login(&pool, "reset@example.com", TEST_PASSWORD).await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        login(&pool, "reset@example.com", "brand-new-pass-2").await.status(),
        StatusCode::OK
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn password_reset_rejects_wrong_code(pool: PgPool) {
    let license = seed_license(&pool, None).await;
    register(&pool, "guess@example.com", &license.key).await;
    let integrations = TestIntegrations::default();

    post_json(
        build_test_app_with(pool.clone(), &integrations),
        "/api/v1/auth/verification-code",
        serde_json::json!({ "email": "guess@example.com" }),
    )
    .await;
    let issued = extract_code(&integrations.transport.sent()[0].html_body);
    let wrong = if issued == "000000" { "111111" } else { "000000" };

    let reset = serde_json::json!({
        "email": "guess@example.com",
        "code": wrong,
        "new_password": "brand-new-pass-2",
    });
    let response = post_json(build_test_app(pool), "/api/v1/auth/password-reset", reset).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn reset_code_is_burned_after_repeated_wrong_guesses(pool: PgPool) {
    let license = seed_license(&pool, None).await;
    register(&pool, "target@example.com", &license.key).await;
    let integrations = TestIntegrations::default();

    post_json(
        build_test_app_with(pool.clone(), &integrations),
        "/api/v1/auth/verification-code",
        serde_json::json!({ "email": "target@example.com" }),
    )
    .await;
    let issued = extract_code(&integrations.transport.sent()[0].html_body);

    let attempt = |code: String| {
        serde_json::json!({
            "email": "target@example.com",
            "code": code,
            "new_password": "brand-new-pass-2",
        })
    };
    let mut wrong_guesses = (0..1_000_000u32)
        .map(|n| format!("{n:06}"))
        .filter(|c| *c != issued);
    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = wrong_guesses.next().unwrap();
        let response =
            post_json(build_test_app(pool.clone()), "/api/v1/auth/password-reset", attempt(code))
                .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response =
        post_json(build_test_app(pool.clone()), "/api/v1/auth/password-reset", attempt(issued))
            .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        login(&pool, "target@example.com", TEST_PASSWORD).await.status(),
        StatusCode::OK
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn reset_code_is_issued_without_a_system_mailer(pool: PgPool) {
    let license = seed_license(&pool, None).await;
    register(&pool, "nomail@example.com", &license.key).await;
    let integrations = TestIntegrations {
        without_system_mailer: true,
        ..Default::default()
    };

    let response = post_json(
        build_test_app_with(pool.clone(), &integrations),
        "/api/v1/auth/verification-code",
        serde_json::json!({ "email": "nomail@example.com" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(integrations.transport.sent().is_empty());

    let outstanding: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM verification_codes WHERE consumed_at IS NULL")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(outstanding, 1);
}
