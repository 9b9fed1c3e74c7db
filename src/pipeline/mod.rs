//! Label run pipeline.
//!
//! `LabelPipeline::run` drives a [`crate::mailbox::Mailbox`] through
//! search → per-message → per-attachment → aggregate and returns a
//! [`RunReport`]. The run is blocking; callers on an async runtime should
//! use `spawn_blocking`.

pub mod orchestrator;
pub mod types;

pub use orchestrator::{ID_LIST_NAME, LabelPipeline, MERGED_PDF_NAME, RUN_ID_FORMAT};
pub use types::{CroppedArtifact, ItemFailure, RunBatch, RunReport, ShippingLabel};
