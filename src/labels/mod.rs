//! Label document processing: identifier extraction, crop, stamp, merge.
//!
//! All PDF work goes through `lopdf` and operates on page boxes and content
//! streams directly; no page is ever rasterized.

pub mod annotate;
pub mod crop;
pub mod identifier;
pub mod merge;
pub mod pdf;

#[cfg(test)]
pub(crate) mod testing;

pub use annotate::Annotator;
pub use crop::{CropOutcome, Cropper};
pub use identifier::{UNKNOWN_ID, extract_id, is_unknown};
pub use merge::{merge_documents, merge_files};
pub use pdf::{PageBox, PageSize, SourcePage};
