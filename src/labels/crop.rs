//! Document cropper: cuts the carrier's region out of a label PDF.
//!
//! Cropping is done on the page boxes only. Content streams are left
//! untouched, so content coordinates (and the stamp anchor) keep the
//! original page frame after cropping.
//!
//! Carrier rectangles describe the page as displayed. A source page with
//! a `/Rotate` is cut in its displayed frame and the result is mapped back
//! to MediaBox coordinates.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lopdf::{Document, Object, ObjectId};
use serde::Serialize;
use tracing::debug;

use crate::carriers::{CarrierKey, CarrierRegistry, CropGeometry, Rotation};
use crate::error::CropError;
use crate::labels::pdf::{self, PageBox, PageError, SourcePage};

/// Result of a successful crop.
#[derive(Debug, Clone, Serialize)]
pub struct CropOutcome {
    pub output_path: PathBuf,
    /// Source page before cropping.
    pub source: SourcePage,
    /// Crop rectangle in the displayed frame of the source page.
    pub geometry: CropGeometry,
    /// MediaBox written to the cropped page.
    pub cropped_box: PageBox,
}

/// Crops label pages according to the carrier registry.
pub struct Cropper {
    registry: Arc<CarrierRegistry>,
}

impl Cropper {
    pub fn new(registry: Arc<CarrierRegistry>) -> Self {
        Self { registry }
    }

    /// `cropped_{stem}.pdf` next to the source file.
    pub fn output_path_for(source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "label".to_string());
        source.with_file_name(format!("cropped_{stem}.pdf"))
    }

    /// Crop the first page of `source` for `carrier` and write a
    /// single-page PDF to `output`.
    pub fn crop(
        &self,
        source: &Path,
        carrier: CarrierKey,
        output: &Path,
    ) -> Result<CropOutcome, CropError> {
        let mut doc = Document::load(source).map_err(|e| CropError::Unreadable {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;

        let page_count = doc.get_pages().len();
        let page_id = pdf::first_page(&doc).ok_or_else(|| CropError::NoPages {
            path: source.to_path_buf(),
        })?;
        if page_count > 1 {
            debug!(
                path = %source.display(),
                dropped = page_count - 1,
                "Keeping first page only"
            );
        }

        let invalid = |e: PageError| CropError::InvalidGeometry {
            path: source.to_path_buf(),
            reason: e.to_string(),
        };

        pdf::flatten_page_attributes(&mut doc, page_id).map_err(invalid)?;
        keep_only_page(&mut doc, page_id).map_err(invalid)?;

        let media_box = pdf::page_box(&doc, page_id, "MediaBox").map_err(invalid)?;
        if media_box.width() <= 0.0 || media_box.height() <= 0.0 {
            return Err(CropError::InvalidGeometry {
                path: source.to_path_buf(),
                reason: format!("page is {}x{}", media_box.width(), media_box.height()),
            });
        }
        let rotation = pdf::page_rotation(&doc, page_id).map_err(invalid)?;
        let source_page = SourcePage::new(media_box, rotation);

        let shown = source_page.displayed_size();
        let geometry = self
            .registry
            .profile(carrier)
            .crop_geometry(shown.width, shown.height);
        if geometry.width() <= 0.0 || geometry.height() <= 0.0 {
            return Err(CropError::InvalidGeometry {
                path: source.to_path_buf(),
                reason: format!("empty crop rectangle for {carrier}"),
            });
        }

        let cropped = source_page.crop_box(&geometry);

        {
            let page = doc
                .get_dictionary_mut(page_id)
                .map_err(|e| invalid(e.into()))?;
            page.set("MediaBox", cropped.to_object());
            page.set("CropBox", cropped.to_object());
            for key in [&b"TrimBox"[..], &b"BleedBox"[..], &b"ArtBox"[..]] {
                page.remove(key);
            }
            if geometry.rotation == Rotation::Rotate90 {
                page.set(
                    "Rotate",
                    Object::Integer((source_page.rotation + 90).rem_euclid(360)),
                );
            }
        }

        doc.prune_objects();
        doc.save(output).map_err(|e| CropError::Write {
            path: output.to_path_buf(),
            reason: e.to_string(),
        })?;

        debug!(
            path = %output.display(),
            carrier = %carrier,
            rotation = source_page.rotation,
            x0 = cropped.x0,
            y0 = cropped.y0,
            x1 = cropped.x1,
            y1 = cropped.y1,
            "Label cropped"
        );

        Ok(CropOutcome {
            output_path: output.to_path_buf(),
            source: source_page,
            geometry,
            cropped_box: cropped,
        })
    }
}

/// Make `page_id` the only kid of the root page tree node.
fn keep_only_page(doc: &mut Document, page_id: ObjectId) -> Result<(), PageError> {
    let root_id = doc.trailer.get(b"Root")?.as_reference()?;
    let pages_id = doc.get_dictionary(root_id)?.get(b"Pages")?.as_reference()?;

    let pages = doc.get_dictionary_mut(pages_id)?;
    pages.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
    pages.set("Count", Object::Integer(1));

    doc.get_dictionary_mut(page_id)?
        .set("Parent", Object::Reference(pages_id));
    Ok(())
}
