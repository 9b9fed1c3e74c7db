//! MIME parsing of fetched label emails.

use mail_parser::{MessageParser, MimeHeaders};

use crate::error::AttachmentError;

/// A PDF attached to a label email.
#[derive(Debug, Clone)]
pub struct PdfAttachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// The parts of a fetched email the pipeline cares about.
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    /// Mailbox sequence number.
    pub id: String,
    pub subject: String,
    /// Plain text body, or the HTML body rendered as text.
    pub body: String,
    pub attachments: Vec<PdfAttachment>,
}

impl ParsedMessage {
    pub fn parse(id: &str, raw: &[u8]) -> Result<Self, AttachmentError> {
        let parsed = MessageParser::default()
            .parse(raw)
            .ok_or_else(|| AttachmentError::Malformed { id: id.to_string() })?;

        let subject = parsed.subject().unwrap_or_default().to_string();
        let body = extract_text(&parsed);

        let mut attachments = Vec::new();
        for part in parsed.attachments() {
            let is_pdf_type = MimeHeaders::content_type(part).is_some_and(|ct| {
                ct.ctype().eq_ignore_ascii_case("application")
                    && ct.subtype().is_some_and(|s| s.eq_ignore_ascii_case("pdf"))
            });
            let file_name = match MimeHeaders::attachment_name(part) {
                Some(name) if is_pdf_name(name) => name.to_string(),
                Some(_) => continue,
                // Unnamed PDF parts still carry a label.
                None if is_pdf_type => format!("{}.pdf", uuid::Uuid::new_v4()),
                None => continue,
            };
            attachments.push(PdfAttachment {
                file_name,
                bytes: part.contents().to_vec(),
            });
        }

        Ok(Self {
            id: id.to_string(),
            subject,
            body,
            attachments,
        })
    }
}

fn is_pdf_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".pdf")
}

/// First text body part. mail-parser renders HTML-only bodies to text.
fn extract_text(parsed: &mail_parser::Message) -> String {
    parsed
        .body_text(0)
        .map(|text| text.into_owned())
        .unwrap_or_default()
}
