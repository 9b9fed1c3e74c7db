//! Run state: labels, cropped artifacts, identifiers and failures.

use std::path::PathBuf;

use serde::Serialize;

use crate::carriers::{CarrierKey, CropGeometry};
use crate::error::{ItemError, Severity};
use crate::labels::{PageSize, is_unknown};

// ── Labels and artifacts ────────────────────────────────────────────

/// One downloaded label attachment.
#[derive(Debug, Clone, Serialize)]
pub struct ShippingLabel {
    pub message_id: String,
    pub source_path: PathBuf,
    pub carrier: CarrierKey,
    /// Tracking identifier from the subject, or `UNKNOWN`.
    pub extracted_id: String,
    /// Source page size, once the label has been cropped.
    pub page_size: Option<PageSize>,
}

/// A cropped (and possibly stamped) single-page label.
#[derive(Debug, Clone, Serialize)]
pub struct CroppedArtifact {
    /// Index of the source label in [`RunBatch::labels`].
    pub label: usize,
    pub output_path: PathBuf,
    pub geometry: CropGeometry,
    pub annotated: bool,
}

/// A label (or message) that was dropped from the batch.
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub message_id: String,
    pub file_name: Option<String>,
    /// `attachment`, `crop` or `annotate`.
    pub stage: &'static str,
    pub severity: Severity,
    pub reason: String,
}

impl ItemFailure {
    pub fn new(message_id: &str, file_name: Option<&str>, error: &ItemError) -> Self {
        Self {
            message_id: message_id.to_string(),
            file_name: file_name.map(str::to_string),
            stage: error.stage(),
            severity: error.severity(),
            reason: error.to_string(),
        }
    }
}

// ── Batch ───────────────────────────────────────────────────────────

/// Append-only accumulator for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunBatch {
    pub run_id: String,
    pub run_folder: PathBuf,
    /// Messages that were fetched and processed.
    pub messages_processed: usize,
    pub labels: Vec<ShippingLabel>,
    pub artifacts: Vec<CroppedArtifact>,
    /// One entry per processed message, in discovery order.
    pub identifiers: Vec<String>,
    pub failures: Vec<ItemFailure>,
}

impl RunBatch {
    pub fn new(run_id: impl Into<String>, run_folder: impl Into<PathBuf>) -> Self {
        Self {
            run_id: run_id.into(),
            run_folder: run_folder.into(),
            messages_processed: 0,
            labels: Vec::new(),
            artifacts: Vec::new(),
            identifiers: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Record a label and return its index.
    pub fn push_label(&mut self, label: ShippingLabel) -> usize {
        self.labels.push(label);
        self.labels.len() - 1
    }

    /// Source label of an artifact.
    pub fn label_of(&self, artifact: &CroppedArtifact) -> Option<&ShippingLabel> {
        self.labels.get(artifact.label)
    }

    /// Cropped files in discovery order, as fed to the merge.
    pub fn artifact_paths(&self) -> Vec<PathBuf> {
        self.artifacts
            .iter()
            .map(|a| a.output_path.clone())
            .collect()
    }

    /// Identifiers to persist, optionally without `UNKNOWN` entries.
    pub fn persisted_identifiers(&self, keep_unknown: bool) -> Vec<&str> {
        self.identifiers
            .iter()
            .map(String::as_str)
            .filter(|id| keep_unknown || !is_unknown(id))
            .collect()
    }
}

/// Final outcome of a run, logged as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub batch: RunBatch,
    pub merged_pdf: Option<PathBuf>,
    pub merged_pages: usize,
    pub id_list: Option<PathBuf>,
}

impl RunReport {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
    }
}
