//! Shared fixtures: label PDFs, MIME messages and an in-memory mailbox.

#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lopdf::{Document, Object, ObjectId, Stream, dictionary};

use bordereaux::error::MailboxError;
use bordereaux::mailbox::Mailbox;

pub const SUBJECT: &str = "Bordereau d'envoi Vinted";

// ── PDFs ────────────────────────────────────────────────────────────

/// A one-page label of `width` × `height` points showing `text`.
pub fn label_pdf(width: i64, height: i64, text: &str) -> Vec<u8> {
    build_label(width, height, |doc| {
        let content = format!("BT /F1 12 Tf 40 40 Td ({text}) Tj ET");
        doc.add_object(Stream::new(dictionary! {}, content.into_bytes()))
            .into()
    })
}

/// A label that crops fine but whose `/Contents` is not a content stream.
pub fn label_pdf_with_bad_contents(width: i64, height: i64) -> Vec<u8> {
    build_label(width, height, |_| Object::Integer(0))
}

fn build_label(width: i64, height: i64, contents: impl FnOnce(&mut Document) -> Object) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let contents = contents(&mut doc);

    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => contents,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
    });
    // MediaBox inherited from the page tree, as some generators do.
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

pub fn pages(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

pub fn media_box(doc: &Document, page_id: ObjectId) -> Vec<f64> {
    doc.get_dictionary(page_id)
        .unwrap()
        .get(b"MediaBox")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|v| match v {
            Object::Integer(i) => *i as f64,
            Object::Real(r) => *r as f64,
            other => panic!("not a number: {other:?}"),
        })
        .collect()
}

pub fn rotation(doc: &Document, page_id: ObjectId) -> i64 {
    doc.get_dictionary(page_id)
        .unwrap()
        .get(b"Rotate")
        .and_then(Object::as_i64)
        .unwrap_or(0)
}

pub fn page_text(doc: &Document, page_id: ObjectId) -> String {
    String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
}

// ── MIME ────────────────────────────────────────────────────────────

/// A label email with a plain-text body and base64 attachments.
pub fn label_email(subject: &str, body: &str, attachments: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = format!(
        "From: Vinted <no-reply@vinted.fr>\r\nTo: seller@example.com\r\n\
         Subject: {subject}\r\nMIME-Version: 1.0\r\n\
         Content-Type: multipart/mixed; boundary=\"label-boundary\"\r\n\r\n\
         --label-boundary\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{body}\r\n"
    );
    for (name, bytes) in attachments {
        out.push_str(&format!(
            "--label-boundary\r\nContent-Type: application/pdf; name=\"{name}\"\r\n\
             Content-Disposition: attachment; filename=\"{name}\"\r\n\
             Content-Transfer-Encoding: base64\r\n\r\n{}\r\n",
            STANDARD.encode(bytes)
        ));
    }
    out.push_str("--label-boundary--\r\n");
    out.into_bytes()
}

// ── Mailbox ─────────────────────────────────────────────────────────

/// Mailbox backed by a list of raw messages.
#[derive(Default)]
pub struct InMemoryMailbox {
    messages: Vec<(String, Vec<u8>)>,
    pub seen: Vec<String>,
}

impl InMemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, raw: Vec<u8>) -> Self {
        let id = (self.messages.len() + 1).to_string();
        self.messages.push((id, raw));
        self
    }
}

impl Mailbox for InMemoryMailbox {
    fn search_unseen(&mut self, subject_keyword: &str) -> Result<Vec<String>, MailboxError> {
        Ok(self
            .messages
            .iter()
            .filter(|(id, _)| !self.seen.contains(id))
            .filter(|(_, raw)| String::from_utf8_lossy(raw).contains(subject_keyword))
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn fetch(&mut self, id: &str) -> Result<Vec<u8>, MailboxError> {
        self.messages
            .iter()
            .find(|(m, _)| m == id)
            .map(|(_, raw)| raw.clone())
            .ok_or_else(|| MailboxError::Fetch {
                id: id.to_string(),
                reason: "no such message".into(),
            })
    }

    fn mark_seen(&mut self, id: &str) -> Result<(), MailboxError> {
        self.seen.push(id.to_string());
        Ok(())
    }
}
