//! Spreadsheet read client (Google Sheets v4 `values` endpoint).
//!
//! Only the cell grid is fetched; turning rows into contacts happens in
//! `courier_core::contacts`.

use std::time::Duration;

use serde::Deserialize;

/// Default API base URL.
pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com";

/// Default A1 range read when `SHEETS_RANGE` is not set.
pub const DEFAULT_SHEETS_RANGE: &str = "Contacts!A1:Z";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Errors from the spreadsheet client.
#[derive(Debug, thiserror::Error)]
pub enum SheetsError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API returned a non-2xx status code.
    #[error("Sheets API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The configured base URL cannot be used to build a request URL.
    #[error("Invalid Sheets API base URL: {0}")]
    BaseUrl(String),
}

/// Connection settings for the contacts spreadsheet.
#[derive(Clone)]
pub struct SheetsConfig {
    pub api_base: String,
    pub spreadsheet_id: String,
    /// A1 notation, e.g. `Contacts!A1:Z`.
    pub range: String,
    pub api_key: String,
}

impl std::fmt::Debug for SheetsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsConfig")
            .field("api_base", &self.api_base)
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("range", &self.range)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl SheetsConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` unless both `SHEETS_SPREADSHEET_ID` and
    /// `SHEETS_API_KEY` are set.
    ///
    /// | Variable                | Required | Default                          |
    /// |-------------------------|----------|----------------------------------|
    /// | `SHEETS_SPREADSHEET_ID` | yes      |                                  |
    /// | `SHEETS_API_KEY`        | yes      |                                  |
    /// | `SHEETS_RANGE`          | no       | `Contacts!A1:Z`                  |
    /// | `SHEETS_API_BASE`       | no       | `https://sheets.googleapis.com`  |
    pub fn from_env() -> Option<Self> {
        let spreadsheet_id = std::env::var("SHEETS_SPREADSHEET_ID").ok()?;
        let api_key = std::env::var("SHEETS_API_KEY").ok()?;
        Some(Self {
            api_base: std::env::var("SHEETS_API_BASE")
                .unwrap_or_else(|_| DEFAULT_SHEETS_API_BASE.to_string()),
            spreadsheet_id,
            range: std::env::var("SHEETS_RANGE")
                .unwrap_or_else(|_| DEFAULT_SHEETS_RANGE.to_string()),
            api_key,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// HTTP client for one spreadsheet range.
pub struct SheetsClient {
    client: reqwest::Client,
    config: SheetsConfig,
}

impl SheetsClient {
    pub fn new(config: SheetsConfig) -> Result<Self, SheetsError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &SheetsConfig {
        &self.config
    }

    /// Fetch the configured range as rows of display strings.
    ///
    /// The first row is the header. Missing trailing cells are simply absent
    /// from a row, so rows may have different lengths.
    pub async fn fetch_rows(&self) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = self.values_url()?;
        let response = self
            .client
            .get(url)
            .query(&[("key", self.config.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SheetsError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let range: ValueRange = response.json().await?;
        let rows: Vec<Vec<String>> = range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect();

        tracing::debug!(
            spreadsheet_id = %self.config.spreadsheet_id,
            rows = rows.len(),
            "Fetched spreadsheet rows",
        );
        Ok(rows)
    }

    fn values_url(&self) -> Result<reqwest::Url, SheetsError> {
        let mut url = reqwest::Url::parse(&self.config.api_base)
            .map_err(|e| SheetsError::BaseUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SheetsError::BaseUrl(self.config.api_base.clone()))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.config.spreadsheet_id.as_str(),
                "values",
                self.config.range.as_str(),
            ]);
        Ok(url)
    }
}

fn cell_to_string(cell: serde_json::Value) -> String {
    match cell {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
