//! Bordereaux: crops, stamps and merges shipping labels received by email.

pub mod carriers;
pub mod config;
pub mod error;
pub mod labels;
pub mod mailbox;
pub mod pipeline;
