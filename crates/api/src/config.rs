use courier_core::license::normalize_license_key;
use courier_core::secrets::SecretKey;
use courier_core::validation::normalize_email;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the secrets have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for background tasks, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// JWT token configuration (secret, expiry durations).
    pub jwt: JwtConfig,
    /// Encrypts SMTP passwords at rest.
    pub smtp_secret_key: SecretKey,
    /// HMAC key for verification code hashes.
    pub verification_secret: String,
    /// Addresses that receive the admin role at registration (lower-cased).
    pub admin_emails: Vec<String>,
    /// Run the bulk-send dispatcher inside the API process (default: `false`).
    ///
    /// Leave off when the standalone `courier-worker` binary drains the queue.
    pub embedded_worker: bool,
    /// License key created at startup if it does not exist yet, so the first
    /// account can register on an empty database.
    pub bootstrap_license_key: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `3000`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                       |
    /// | `SMTP_ENCRYPTION_KEY`   | required (base64, 32 bytes)|
    /// | `VERIFICATION_SECRET`   | `JWT_SECRET`               |
    /// | `ADMIN_EMAILS`          | empty                      |
    /// | `WORKER_EMBEDDED`       | `false`                    |
    /// | `BOOTSTRAP_LICENSE_KEY` | unset                      |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins = split_list(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".into()),
        );

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let jwt = JwtConfig::from_env();

        let smtp_secret_key = SecretKey::from_base64(
            &std::env::var("SMTP_ENCRYPTION_KEY").expect("SMTP_ENCRYPTION_KEY must be set"),
        )
        .expect("SMTP_ENCRYPTION_KEY must be a base64-encoded 32-byte key");

        let verification_secret =
            std::env::var("VERIFICATION_SECRET").unwrap_or_else(|_| jwt.secret.clone());

        let admin_emails = split_list(&std::env::var("ADMIN_EMAILS").unwrap_or_default())
            .iter()
            .map(|e| normalize_email(e))
            .collect();

        let embedded_worker = std::env::var("WORKER_EMBEDDED")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let bootstrap_license_key = std::env::var("BOOTSTRAP_LICENSE_KEY")
            .ok()
            .map(|k| normalize_license_key(&k))
            .filter(|k| !k.is_empty());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt,
            smtp_secret_key,
            verification_secret,
            admin_emails,
            embedded_worker,
            bootstrap_license_key,
        }
    }

    /// Whether a (normalized) email is on the admin list.
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|e| e == email)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
