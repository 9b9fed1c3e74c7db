//! Mail collaborators: mailbox access, MIME parsing and attachment storage.

pub mod imap;
pub mod message;
pub mod store;

pub use imap::{ImapMailbox, ImapSession};
pub use message::{ParsedMessage, PdfAttachment};
pub use store::AttachmentStore;

use crate::error::MailboxError;

/// A source of label emails.
///
/// Message ids are opaque strings (IMAP sequence numbers for [`ImapMailbox`]).
pub trait Mailbox {
    /// Ids of unread messages whose subject contains `subject_keyword`.
    fn search_unseen(&mut self, subject_keyword: &str) -> Result<Vec<String>, MailboxError>;

    /// Raw RFC 822 bytes of one message.
    fn fetch(&mut self, id: &str) -> Result<Vec<u8>, MailboxError>;

    fn mark_seen(&mut self, id: &str) -> Result<(), MailboxError>;

    fn logout(&mut self) -> Result<(), MailboxError> {
        Ok(())
    }
}
