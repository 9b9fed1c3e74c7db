//! Error types for bordereaux.
//!
//! Errors are split by severity at the type level: [`Error`] aborts the run,
//! [`ItemError`] only removes one attachment (or one message) from the batch.

use std::path::PathBuf;

use serde::Serialize;

/// How far an error propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Aborts the run.
    Fatal,
    /// Skips a single item; the batch continues.
    Recoverable,
}

/// Top-level (fatal) error type for a run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),
}

impl Error {
    pub fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Mailbox (IMAP) errors.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Cannot connect to {host}:{port}: {reason}")]
    Connection {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Authentication failed for {user}: {reason}")]
    AuthFailed { user: String, reason: String },

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Fetch failed for message {id}: {reason}")]
    Fetch { id: String, reason: String },

    #[error("IMAP protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-message attachment errors.
#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("Message {id} is not a parseable MIME message")]
    Malformed { id: String },

    #[error("Failed to save attachment {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-attachment crop errors.
#[derive(Debug, thiserror::Error)]
pub enum CropError {
    #[error("Unreadable PDF {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("PDF {path} has no pages")]
    NoPages { path: PathBuf },

    #[error("Unusable page geometry in {path}: {reason}")]
    InvalidGeometry { path: PathBuf, reason: String },

    #[error("Failed to write cropped PDF {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

/// Per-attachment annotation errors.
#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    #[error("Cannot open cropped label {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("Cannot stamp page in {path}: {reason}")]
    Stamp { path: PathBuf, reason: String },

    #[error("Failed to write annotated label {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

/// Aggregate-stage errors (merge and final writes).
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("Merge failed: {0}")]
    Merge(String),

    #[error("Failed to write {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Recoverable error for one item of the batch.
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error(transparent)]
    Crop(#[from] CropError),

    #[error(transparent)]
    Annotation(#[from] AnnotationError),
}

impl ItemError {
    pub fn severity(&self) -> Severity {
        Severity::Recoverable
    }

    /// Short stage label used in run reports.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Attachment(_) => "attachment",
            Self::Crop(_) => "crop",
            Self::Annotation(_) => "annotate",
        }
    }
}

/// Result type alias for a run.
pub type Result<T> = std::result::Result<T, Error>;
