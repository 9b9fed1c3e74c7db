//! On-disk layout of a run: `{run_folder}/{carrier}/{file}`.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::carriers::CarrierKey;
use crate::error::AttachmentError;

/// Writes downloaded attachments into per-carrier folders of one run.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    run_folder: PathBuf,
}

impl AttachmentStore {
    pub fn new(run_folder: impl Into<PathBuf>) -> Self {
        Self {
            run_folder: run_folder.into(),
        }
    }

    pub fn carrier_folder(&self, carrier: CarrierKey) -> PathBuf {
        self.run_folder.join(carrier.as_str())
    }

    /// Save `bytes` under the carrier folder. Never overwrites: a clashing
    /// name gets a `-N` suffix before the extension.
    pub fn save(
        &self,
        carrier: CarrierKey,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, AttachmentError> {
        let folder = self.carrier_folder(carrier);
        std::fs::create_dir_all(&folder).map_err(|source| AttachmentError::Save {
            path: folder.clone(),
            source,
        })?;

        let path = unique_path(&folder, &sanitize_file_name(file_name));
        std::fs::write(&path, bytes).map_err(|source| AttachmentError::Save {
            path: path.clone(),
            source,
        })?;

        debug!(path = %path.display(), bytes = bytes.len(), "Attachment saved");
        Ok(path)
    }
}

/// Replace path separators and control characters; never empty.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "attachment.pdf".to_string()
    } else {
        cleaned
    }
}

fn unique_path(folder: &Path, file_name: &str) -> PathBuf {
    let candidate = folder.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (file_name, String::new()),
    };
    (1..)
        .map(|n| folder.join(format!("{stem}-{n}{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}
