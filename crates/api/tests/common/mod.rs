#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use courier_api::auth::jwt::JwtConfig;
use courier_api::config::ServerConfig;
use courier_api::router::build_app_router;
use courier_api::state::AppState;
use courier_cloud::{AttachmentStore, SheetsClient, SheetsConfig, StorageError};
use courier_core::bulk_mail::HostedAttachment;
use courier_core::license::generate_license_key;
use courier_core::secrets::SecretKey;
use courier_core::types::{DbId, Timestamp};
use courier_db::models::license_key::{CreateLicenseKey, LicenseKey};
use courier_mail::{MailError, MailTransport, OutgoingMail, SmtpCredentials, SystemMailer};
use courier_worker::TransportFactory;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_PASSWORD: &str = "correct-horse-9";
pub const ADMIN_EMAIL: &str = "admin@courier.test";
pub const SMTP_KEY: [u8; 32] = [7u8; 32];
const MULTIPART_BOUNDARY: &str = "courier-test-boundary";

/// Build a test `ServerConfig` with fixed secrets.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-jwt-secret-that-is-long-enough".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 7,
        },
        smtp_secret_key: SecretKey::from_bytes(SMTP_KEY),
        verification_secret: "test-verification-secret".to_string(),
        admin_emails: vec![ADMIN_EMAIL.to_string()],
        embedded_worker: false,
        bootstrap_license_key: None,
    }
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Records every message instead of talking SMTP. Doubles as the transport
/// factory behind the SMTP test endpoint.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    pub sent: Arc<Mutex<Vec<OutgoingMail>>>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

impl TransportFactory for RecordingTransport {
    fn connect(&self, _: &SmtpCredentials) -> Result<Box<dyn MailTransport>, MailError> {
        Ok(Box::new(self.clone()))
    }
}

/// In-memory attachment host.
#[derive(Clone, Default)]
pub struct MemoryStore {
    pub stored: Arc<Mutex<Vec<(DbId, String, usize)>>>,
}

#[async_trait]
impl AttachmentStore for MemoryStore {
    async fn store(
        &self,
        owner_id: DbId,
        filename: &str,
        _content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<HostedAttachment, StorageError> {
        self.stored
            .lock()
            .unwrap()
            .push((owner_id, filename.to_string(), bytes.len()));
        Ok(HostedAttachment {
            filename: filename.to_string(),
            url: format!("https://files.courier.test/{owner_id}/{filename}"),
            size_bytes: bytes.len() as u64,
        })
    }
}

/// Optional integrations for a test app. The default has no spreadsheet and
/// no attachment storage.
#[derive(Clone, Default)]
pub struct TestIntegrations {
    pub sheets: Option<Arc<SheetsClient>>,
    pub attachment_store: Option<Arc<dyn AttachmentStore>>,
    pub transport: RecordingTransport,
    /// Run as if `SMTP_HOST` were unset.
    pub without_system_mailer: bool,
}

// ---------------------------------------------------------------------------
// App builders
// ---------------------------------------------------------------------------

/// Build the full application router (same middleware stack as production).
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(pool, &TestIntegrations::default())
}

pub fn build_test_app_with(pool: PgPool, integrations: &TestIntegrations) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        system_mailer: (!integrations.without_system_mailer).then(|| {
            Arc::new(SystemMailer::with_transport(
                "noreply@courier.test".to_string(),
                Box::new(integrations.transport.clone()),
            ))
        }),
        sheets: integrations.sheets.clone(),
        attachment_store: integrations.attachment_store.clone(),
        transports: Arc::new(integrations.transport.clone()),
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, json_request(Method::GET, uri, None, None)).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, json_request(Method::GET, uri, Some(token), None)).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, json_request(Method::POST, uri, None, Some(body))).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send(app, json_request(Method::POST, uri, Some(token), Some(body))).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, json_request(Method::POST, uri, Some(token), None)).await
}

pub async fn put_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send(app, json_request(Method::PUT, uri, Some(token), Some(body))).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, json_request(Method::DELETE, uri, Some(token), None)).await
}

/// A multipart/form-data body assembled by hand.
#[derive(Default)]
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

pub async fn post_multipart_auth(
    app: Router,
    uri: &str,
    form: MultipartForm,
    token: &str,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
        )
        .body(Body::from(form.finish()))
        .unwrap();
    send(app, request).await
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Insert a license key directly.
pub async fn seed_license(pool: &PgPool, expires_at: Option<Timestamp>) -> LicenseKey {
    courier_db::repositories::LicenseKeyRepo::create(
        pool,
        &generate_license_key(),
        &CreateLicenseKey {
            label: "test".to_string(),
            expires_at,
        },
    )
    .await
    .expect("license creation should succeed")
}

/// Register through the API and return the auth response JSON.
pub async fn register(pool: &PgPool, email: &str, license_key: &str) -> serde_json::Value {
    let body = serde_json::json!({
        "email": email,
        "full_name": "Test User",
        "password": TEST_PASSWORD,
        "license_key": license_key,
    });
    let response = post_json(build_test_app(pool.clone()), "/api/v1/auth/register", body).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

/// Register a fresh user on a fresh license and return its access token.
pub async fn register_user(pool: &PgPool, email: &str) -> String {
    let license = seed_license(pool, None).await;
    let json = register(pool, email, &license.key).await;
    json["access_token"].as_str().unwrap().to_string()
}

/// Store SMTP settings and an app password for the token's user.
pub async fn configure_sending(pool: &PgPool, token: &str, app_password: &str) {
    let response = put_json_auth(
        build_test_app(pool.clone()),
        "/api/v1/settings/smtp",
        serde_json::json!({
            "host": "smtp.courier.test",
            "port": 587,
            "username": "sender@courier.test",
            "password": "smtp-secret",
        }),
        token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = put_json_auth(
        build_test_app(pool.clone()),
        "/api/v1/settings/app-password",
        serde_json::json!({
            "current_password": TEST_PASSWORD,
            "app_password": app_password,
        }),
        token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

/// Serve a small contact sheet from wiremock. Keep the server alive for the
/// duration of the test.
pub async fn mock_sheet() -> (MockServer, TestIntegrations) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/crm/values/Contacts!A1:Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "values": [
                ["Name", "Email", "Company", "Segment", "Possibility"],
                ["Ada", "ada@example.com", "Engines", "Enterprise", "High"],
                ["Bob", "bob@example.com", "Bakery", "SMB", "Low"],
                ["Cy", "cy@example.com", "Cycles", "SMB", "High"],
                ["Broken", "not-an-email", "", "SMB", "High"]
            ]
        })))
        .mount(&server)
        .await;

    let client = SheetsClient::new(SheetsConfig {
        api_base: server.uri(),
        spreadsheet_id: "crm".to_string(),
        range: "Contacts!A1:Z".to_string(),
        api_key: "test-key".to_string(),
    })
    .unwrap();

    let integrations = TestIntegrations {
        sheets: Some(Arc::new(client)),
        ..Default::default()
    };
    (server, integrations)
}
