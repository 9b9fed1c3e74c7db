//! Label run orchestrator.
//!
//! One run:
//! 1. Search the mailbox for unread label emails
//! 2. Per message: fetch → parse → classify carrier → extract id → save PDFs
//! 3. Per attachment: crop → stamp
//! 4. Merge all cropped labels and write the identifier list
//!
//! Per-item problems are recorded in the batch and never abort the run.
//! Only output-stage failures (merge, final writes) are fatal.

use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::carriers::{CarrierClassifier, CarrierKey, CarrierRegistry};
use crate::config::PipelineConfig;
use crate::error::{ItemError, OutputError, Result};
use crate::labels::{Annotator, Cropper, UNKNOWN_ID, extract_id, is_unknown, merge_files};
use crate::mailbox::{AttachmentStore, Mailbox, ParsedMessage, PdfAttachment};
use crate::pipeline::types::{CroppedArtifact, ItemFailure, RunBatch, RunReport, ShippingLabel};

/// Run folder name format (local time).
pub const RUN_ID_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Merged output file inside the run folder.
pub const MERGED_PDF_NAME: &str = "bordereaux.pdf";

/// Identifier list inside the run folder.
pub const ID_LIST_NAME: &str = "bordereaux.txt";

/// Drives one label run against a [`Mailbox`].
pub struct LabelPipeline {
    config: PipelineConfig,
    classifier: CarrierClassifier,
    cropper: Cropper,
    annotator: Annotator,
}

impl LabelPipeline {
    pub fn new(config: PipelineConfig, registry: Arc<CarrierRegistry>) -> Self {
        Self {
            config,
            classifier: CarrierClassifier::new(Arc::clone(&registry)),
            cropper: Cropper::new(Arc::clone(&registry)),
            annotator: Annotator::new(registry),
        }
    }

    /// Run with a fresh timestamped run id.
    pub fn run(&self, mailbox: &mut dyn Mailbox) -> Result<RunReport> {
        let run_id = Local::now().format(RUN_ID_FORMAT).to_string();
        self.run_with_id(mailbox, &run_id)
    }

    pub fn run_with_id(&self, mailbox: &mut dyn Mailbox, run_id: &str) -> Result<RunReport> {
        let run_folder = self.config.output_root.join(run_id);
        info!(run_id, folder = %run_folder.display(), "Starting label run");

        let ids = match mailbox.search_unseen(&self.config.subject_keyword) {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Mailbox search failed, no messages to process");
                Vec::new()
            }
        };
        info!(count = ids.len(), subject = %self.config.subject_keyword, "Label emails found");

        std::fs::create_dir_all(&run_folder).map_err(|source| OutputError::Persist {
            path: run_folder.clone(),
            source,
        })?;

        let store = AttachmentStore::new(&run_folder);
        let mut batch = RunBatch::new(run_id, &run_folder);
        for id in &ids {
            self.process_message(mailbox, &store, id, &mut batch);
        }

        let report = self.finish(batch)?;
        info!(
            run_id,
            messages = report.batch.messages_processed,
            labels = report.batch.artifacts.len(),
            failures = report.batch.failures.len(),
            summary = %report.to_json(),
            "Label run complete"
        );
        Ok(report)
    }

    // ── Per message ─────────────────────────────────────────────────

    fn process_message(
        &self,
        mailbox: &mut dyn Mailbox,
        store: &AttachmentStore,
        id: &str,
        batch: &mut RunBatch,
    ) {
        let raw = match mailbox.fetch(id) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(id, error = %e, "Skipping message");
                return;
            }
        };
        batch.messages_processed += 1;

        match ParsedMessage::parse(id, &raw) {
            Ok(message) => {
                let carrier = self.classifier.classify(&message.body);
                let identifier = extract_id(&message.subject);
                debug!(
                    id,
                    carrier = %carrier,
                    identifier = %identifier,
                    attachments = message.attachments.len(),
                    "Message classified"
                );
                if message.attachments.is_empty() {
                    warn!(id, "No PDF attachment in label email");
                }

                for attachment in &message.attachments {
                    self.process_attachment(store, id, carrier, &identifier, attachment, batch);
                }
                batch.identifiers.push(identifier);
            }
            Err(e) => {
                let err = ItemError::from(e);
                warn!(id, error = %err, "Unparseable message, no attachments");
                batch.failures.push(ItemFailure::new(id, None, &err));
                batch.identifiers.push(UNKNOWN_ID.to_string());
            }
        }

        if let Err(e) = mailbox.mark_seen(id) {
            warn!(id, error = %e, "Failed to mark message as seen");
        }
    }

    // ── Per attachment ──────────────────────────────────────────────

    fn process_attachment(
        &self,
        store: &AttachmentStore,
        message_id: &str,
        carrier: CarrierKey,
        identifier: &str,
        attachment: &PdfAttachment,
        batch: &mut RunBatch,
    ) {
        let file_name = attachment.file_name.as_str();

        let source_path = match store.save(carrier, file_name, &attachment.bytes) {
            Ok(path) => path,
            Err(e) => return record_failure(batch, message_id, file_name, e.into()),
        };
        let label = batch.push_label(ShippingLabel {
            message_id: message_id.to_string(),
            source_path: source_path.clone(),
            carrier,
            extracted_id: identifier.to_string(),
            page_size: None,
        });

        let output = Cropper::output_path_for(&source_path);
        let outcome = match self.cropper.crop(&source_path, carrier, &output) {
            Ok(outcome) => outcome,
            Err(e) => return record_failure(batch, message_id, file_name, e.into()),
        };
        batch.labels[label].page_size = Some(outcome.source.displayed_size());

        let annotated = if self.config.stamp_ids && !is_unknown(identifier) {
            match self
                .annotator
                .annotate(&outcome.output_path, carrier, &outcome.source, identifier)
            {
                Ok(()) => true,
                Err(e) => {
                    // The unstamped crop stays in the batch.
                    record_failure(batch, message_id, file_name, e.into());
                    false
                }
            }
        } else {
            false
        };

        batch.artifacts.push(CroppedArtifact {
            label,
            output_path: outcome.output_path,
            geometry: outcome.geometry,
            annotated,
        });
    }

    // ── Aggregate ───────────────────────────────────────────────────

    fn finish(&self, batch: RunBatch) -> Result<RunReport> {
        let run_folder = batch.run_folder.clone();

        let (merged_pdf, merged_pages) = if batch.artifacts.is_empty() {
            info!("No labels to merge");
            (None, 0)
        } else {
            let path = run_folder.join(MERGED_PDF_NAME);
            let pages = merge_files(&batch.artifact_paths(), &path)?;
            (Some(path), pages)
        };

        let identifiers = batch.persisted_identifiers(self.config.keep_unknown_ids);
        let id_list = if identifiers.is_empty() {
            None
        } else {
            let path = run_folder.join(ID_LIST_NAME);
            write_id_list(&path, &identifiers)?;
            Some(path)
        };

        Ok(RunReport {
            batch,
            merged_pdf,
            merged_pages,
            id_list,
        })
    }
}

fn record_failure(batch: &mut RunBatch, message_id: &str, file_name: &str, err: ItemError) {
    warn!(
        id = message_id,
        file = file_name,
        stage = err.stage(),
        error = %err,
        "Label skipped"
    );
    batch
        .failures
        .push(ItemFailure::new(message_id, Some(file_name), &err));
}

/// One identifier per line, no trailing newline.
fn write_id_list(path: &Path, identifiers: &[&str]) -> std::result::Result<(), OutputError> {
    std::fs::write(path, identifiers.join("\n")).map_err(|source| OutputError::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), count = identifiers.len(), "Identifier list written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::error::MailboxError;

    /// Mailbox whose every operation can be made to fail.
    #[derive(Default)]
    struct StubMailbox {
        messages: Vec<(String, Vec<u8>)>,
        fail_search: bool,
        fail_fetch: HashSet<String>,
        seen: Vec<String>,
    }

    impl Mailbox for StubMailbox {
        fn search_unseen(&mut self, _subject: &str) -> std::result::Result<Vec<String>, MailboxError> {
            if self.fail_search {
                return Err(MailboxError::Search("server said no".into()));
            }
            Ok(self.messages.iter().map(|(id, _)| id.clone()).collect())
        }

        fn fetch(&mut self, id: &str) -> std::result::Result<Vec<u8>, MailboxError> {
            if self.fail_fetch.contains(id) {
                return Err(MailboxError::Fetch {
                    id: id.into(),
                    reason: "timeout".into(),
                });
            }
            self.messages
                .iter()
                .find(|(m, _)| m == id)
                .map(|(_, raw)| raw.clone())
                .ok_or_else(|| MailboxError::Fetch {
                    id: id.into(),
                    reason: "gone".into(),
                })
        }

        fn mark_seen(&mut self, id: &str) -> std::result::Result<(), MailboxError> {
            self.seen.push(id.to_string());
            Ok(())
        }
    }

    fn pipeline(root: &Path) -> LabelPipeline {
        let config = PipelineConfig {
            output_root: root.to_path_buf(),
            ..PipelineConfig::default()
        };
        LabelPipeline::new(config, Arc::new(CarrierRegistry::standard()))
    }

    fn text_email(subject: &str) -> Vec<u8> {
        format!("From: noreply@vinted.fr\r\nSubject: {subject}\r\n\r\nColis Chronopost\r\n").into_bytes()
    }

    #[test]
    fn search_failure_yields_empty_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut mailbox = StubMailbox {
            fail_search: true,
            ..Default::default()
        };

        let report = pipeline(dir.path()).run_with_id(&mut mailbox, "run").unwrap();
        assert_eq!(report.batch.messages_processed, 0);
        assert!(report.merged_pdf.is_none());
        assert!(report.id_list.is_none());
        assert!(dir.path().join("run").is_dir());
    }

    #[test]
    fn fetch_failure_skips_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut mailbox = StubMailbox {
            messages: vec![
                ("1".into(), text_email("Bordereau d'envoi Vinted pour AAA-1 - x")),
                ("2".into(), text_email("Bordereau d'envoi Vinted pour BBB-2 - x")),
            ],
            fail_fetch: HashSet::from(["1".to_string()]),
            ..Default::default()
        };

        let report = pipeline(dir.path()).run_with_id(&mut mailbox, "run").unwrap();
        assert_eq!(report.batch.messages_processed, 1);
        assert_eq!(report.batch.identifiers, vec!["BBB-2"]);
        assert_eq!(mailbox.seen, vec!["2"]);
    }

    #[test]
    fn message_without_pdf_still_contributes_its_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut mailbox = StubMailbox {
            messages: vec![("5".into(), text_email("Bordereau d'envoi Vinted pour ZZ-5 - x"))],
            ..Default::default()
        };

        let report = pipeline(dir.path()).run_with_id(&mut mailbox, "run").unwrap();
        assert!(report.batch.artifacts.is_empty());
        assert!(report.merged_pdf.is_none());

        let id_list = report.id_list.unwrap();
        assert_eq!(std::fs::read_to_string(id_list).unwrap(), "ZZ-5");
    }

    #[test]
    fn run_id_has_timestamp_shape() {
        let id = Local::now().format(RUN_ID_FORMAT).to_string();
        assert_eq!(id.len(), "2024-01-31_12-00-00".len());
        assert_eq!(&id[10..11], "_");
    }
}
