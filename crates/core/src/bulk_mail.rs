//! Bulk mail payloads, attachment encoding, and progress accounting.
//!
//! A bulk send is handed to the worker as a single JSON payload: subject,
//! HTML body, the deduplicated recipient list, and every attachment encoded as
//! base64. Large attachments may instead be hosted in object storage and
//! linked from the body.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum subject length in characters.
pub const MAX_SUBJECT_LENGTH: usize = 255;

/// Maximum HTML body size in bytes.
pub const MAX_HTML_BODY_BYTES: usize = 512 * 1024;

/// Maximum recipients in one job.
pub const MAX_RECIPIENTS_PER_JOB: usize = 5_000;

/// Maximum number of attachments per job.
pub const MAX_ATTACHMENTS: usize = 10;

/// Attachments up to this combined size travel inside each message.
pub const MAX_INLINE_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

/// Hard cap for a single uploaded file, hosted or not.
pub const MAX_ATTACHMENT_BYTES: usize = 50 * 1024 * 1024;

/// Number of per-recipient failures kept on a job record.
pub const MAX_RECORDED_FAILURES: usize = 200;

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

/// An attachment carried inside the job payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedAttachment {
    pub filename: String,
    pub content_type: String,
    pub data_base64: String,
}

impl EncodedAttachment {
    /// Decode the attachment bytes.
    pub fn decode(&self) -> Result<Vec<u8>, CoreError> {
        STANDARD.decode(&self.data_base64).map_err(|e| {
            CoreError::Validation(format!(
                "Attachment '{}' is not valid base64: {e}",
                self.filename
            ))
        })
    }

    /// Size of the decoded bytes, computed from the encoded length.
    pub fn decoded_len(&self) -> usize {
        let padding = self.data_base64.bytes().rev().take_while(|b| *b == b'=').count();
        ((self.data_base64.len() / 4) * 3).saturating_sub(padding)
    }
}

/// Encode raw attachment bytes for the job payload.
pub fn encode_attachment(filename: &str, content_type: &str, bytes: &[u8]) -> EncodedAttachment {
    EncodedAttachment {
        filename: sanitize_filename(filename),
        content_type: if content_type.trim().is_empty() {
            "application/octet-stream".to_string()
        } else {
            content_type.trim().to_string()
        },
        data_base64: STANDARD.encode(bytes),
    }
}

/// Strip any directory components and control characters from a client
/// supplied filename.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "attachment".to_string()
    } else {
        cleaned.to_string()
    }
}

/// A large attachment hosted in object storage and linked from the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedAttachment {
    pub filename: String,
    pub url: String,
    pub size_bytes: u64,
}

/// Append a download list for hosted attachments to an HTML body.
pub fn append_hosted_links(html_body: &str, hosted: &[HostedAttachment]) -> String {
    if hosted.is_empty() {
        return html_body.to_string();
    }
    let items: String = hosted
        .iter()
        .map(|h| {
            format!(
                "<li><a href=\"{}\">{}</a></li>",
                escape_html(&h.url),
                escape_html(&h.filename)
            )
        })
        .collect();
    format!("{html_body}\n<hr>\n<p>Attachments:</p>\n<ul>{items}</ul>")
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// The serialized job payload stored in `mail_jobs.payload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkMailPayload {
    pub subject: String,
    pub html_body: String,
    pub recipients: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<EncodedAttachment>,
    #[serde(default)]
    pub hosted_attachments: Vec<HostedAttachment>,
}

impl BulkMailPayload {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self, CoreError> {
        serde_json::from_value(value.clone())
            .map_err(|e| CoreError::Internal(format!("Malformed mail job payload: {e}")))
    }
}

/// A bulk send as assembled by the request handler, before it is queued.
#[derive(Debug, Clone, Default)]
pub struct BulkMailDraft {
    pub subject: String,
    pub html_body: String,
    pub recipients: Vec<String>,
    pub attachments: Vec<EncodedAttachment>,
    pub hosted_attachments: Vec<HostedAttachment>,
}

impl BulkMailDraft {
    /// Check the draft against the dispatch limits.
    pub fn validate(&self) -> Result<(), CoreError> {
        let subject = self.subject.trim();
        if subject.is_empty() {
            return Err(CoreError::Validation("Subject cannot be empty".into()));
        }
        if subject.chars().count() > MAX_SUBJECT_LENGTH {
            return Err(CoreError::Validation(format!(
                "Subject exceeds maximum length of {MAX_SUBJECT_LENGTH} characters"
            )));
        }
        if subject.contains(['\r', '\n']) {
            return Err(CoreError::Validation("Subject cannot contain line breaks".into()));
        }
        if self.html_body.trim().is_empty() {
            return Err(CoreError::Validation("Email body cannot be empty".into()));
        }
        if self.html_body.len() > MAX_HTML_BODY_BYTES {
            return Err(CoreError::Validation(format!(
                "Email body exceeds maximum size of {MAX_HTML_BODY_BYTES} bytes"
            )));
        }
        if self.recipients.is_empty() {
            return Err(CoreError::Validation(
                "No valid recipients selected".into(),
            ));
        }
        if self.recipients.len() > MAX_RECIPIENTS_PER_JOB {
            return Err(CoreError::Validation(format!(
                "Too many recipients ({}); the limit is {MAX_RECIPIENTS_PER_JOB}",
                self.recipients.len()
            )));
        }
        let attachment_count = self.attachments.len() + self.hosted_attachments.len();
        if attachment_count > MAX_ATTACHMENTS {
            return Err(CoreError::Validation(format!(
                "Too many attachments ({attachment_count}); the limit is {MAX_ATTACHMENTS}"
            )));
        }
        let inline_bytes: usize = self.attachments.iter().map(|a| a.decoded_len()).sum();
        if inline_bytes > MAX_INLINE_ATTACHMENT_BYTES {
            return Err(CoreError::Validation(format!(
                "Attachments exceed {MAX_INLINE_ATTACHMENT_BYTES} bytes"
            )));
        }
        Ok(())
    }

    /// Convert into the queued payload. Hosted attachments are linked from
    /// the body at this point.
    pub fn into_payload(self) -> BulkMailPayload {
        let html_body = append_hosted_links(&self.html_body, &self.hosted_attachments);
        BulkMailPayload {
            subject: self.subject.trim().to_string(),
            html_body,
            recipients: self.recipients,
            attachments: self.attachments,
            hosted_attachments: self.hosted_attachments,
        }
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress counters for a running or finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobProgress {
    pub total: i32,
    pub sent: i32,
    pub failed: i32,
}

impl JobProgress {
    pub fn new(total: i32, sent: i32, failed: i32) -> Self {
        Self { total, sent, failed }
    }

    /// Recipients processed so far, successful or not.
    pub fn processed(&self) -> i32 {
        self.sent + self.failed
    }

    /// Completion percentage in `0..=100`. An empty job counts as complete.
    pub fn percent(&self) -> i16 {
        if self.total <= 0 {
            return 100;
        }
        let pct = (i64::from(self.processed()) * 100) / i64::from(self.total);
        pct.clamp(0, 100) as i16
    }
}

/// One failed recipient, recorded on the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientFailure {
    pub email: String,
    pub error: String,
}
