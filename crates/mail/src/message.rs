//! Building MIME messages from [`OutgoingMail`].

use courier_core::bulk_mail::EncodedAttachment;
use courier_core::error::CoreError;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::Message;

use crate::transport::MailError;

/// A file attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl MailAttachment {
    /// Decode a payload attachment into raw bytes.
    pub fn from_encoded(encoded: &EncodedAttachment) -> Result<Self, CoreError> {
        Ok(Self {
            filename: encoded.filename.clone(),
            content_type: encoded.content_type.clone(),
            bytes: encoded.decode()?,
        })
    }
}

/// One message to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from_address: String,
    pub from_name: Option<String>,
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<MailAttachment>,
}

impl OutgoingMail {
    /// Assemble the `lettre` message: an HTML part followed by one part per
    /// attachment, wrapped in `multipart/mixed`.
    pub fn to_message(&self) -> Result<Message, MailError> {
        let from = Mailbox::new(self.from_name.clone(), self.from_address.parse()?);
        let to: Mailbox = self.to.parse()?;

        let mut body = MultiPart::mixed().singlepart(SinglePart::html(self.html_body.clone()));
        for attachment in &self.attachments {
            let content_type = ContentType::parse(&attachment.content_type)
                .unwrap_or_else(|_| octet_stream());
            body = body.singlepart(
                Attachment::new(attachment.filename.clone())
                    .body(attachment.bytes.clone(), content_type),
            );
        }

        Message::builder()
            .from(from)
            .to(to)
            .subject(self.subject.clone())
            .multipart(body)
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

fn octet_stream() -> ContentType {
    ContentType::parse("application/octet-stream").expect("static content type parses")
}
