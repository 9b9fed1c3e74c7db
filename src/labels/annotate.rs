//! Label annotator: stamps `SKU: {id}` onto a cropped label.
//!
//! Runs after cropping. The anchor is resolved against the *source* page
//! as displayed and mapped into the MediaBox frame of the untouched
//! content streams. The text is drawn upright for the source rotation.

use std::path::Path;
use std::sync::Arc;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use tracing::debug;

use crate::carriers::{CarrierKey, CarrierRegistry, Point};
use crate::error::AnnotationError;
use crate::labels::pdf::{self, PageError, SourcePage};

/// Resource name of the stamp font.
const STAMP_FONT: &[u8] = b"FSku";

const STAMP_FONT_SIZE: i64 = 10;

/// Stamps identifiers at each carrier's anchor point.
pub struct Annotator {
    registry: Arc<CarrierRegistry>,
}

impl Annotator {
    pub fn new(registry: Arc<CarrierRegistry>) -> Self {
        Self { registry }
    }

    /// Text drawn on the label.
    pub fn stamp_text(identifier: &str) -> String {
        format!("SKU: {identifier}")
    }

    /// Where the stamp goes for `carrier`, in MediaBox coordinates of the
    /// uncropped `source` page.
    pub fn stamp_position(&self, carrier: CarrierKey, source: &SourcePage) -> Point {
        let shown = source.displayed_size();
        let local = self
            .registry
            .profile(carrier)
            .stamp_position(shown.width, shown.height);
        source.to_media(local)
    }

    /// Overlay the stamp on the first page of `path`, rewriting it in place.
    pub fn annotate(
        &self,
        path: &Path,
        carrier: CarrierKey,
        source: &SourcePage,
        identifier: &str,
    ) -> Result<(), AnnotationError> {
        let mut doc = Document::load(path).map_err(|e| AnnotationError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let page_id = pdf::first_page(&doc).ok_or_else(|| AnnotationError::Load {
            path: path.to_path_buf(),
            reason: "no pages".into(),
        })?;

        let position = self.stamp_position(carrier, source);
        let matrix = source.upright_text_matrix();
        let text = Self::stamp_text(identifier);
        stamp_page(&mut doc, page_id, position, matrix, &text).map_err(|e| {
            AnnotationError::Stamp {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        doc.save(path).map_err(|e| AnnotationError::Write {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        debug!(
            path = %path.display(),
            carrier = %carrier,
            x = position.x,
            y = position.y,
            "Label stamped"
        );
        Ok(())
    }
}

/// Append an overlay content stream drawing `text` at `position`, oriented
/// by the `[a b c d]` text matrix coefficients.
///
/// Existing content is wrapped in `q … Q` so its graphics state cannot
/// leak into the overlay.
fn stamp_page(
    doc: &mut Document,
    page_id: ObjectId,
    position: Point,
    matrix: [i64; 4],
    text: &str,
) -> Result<(), PageError> {
    let page = doc.get_dictionary(page_id)?;

    let mut resources = pdf::owned_dictionary(doc, page, b"Resources")?;
    let mut fonts = pdf::owned_dictionary(doc, &resources, b"Font")?;

    let existing: Vec<Object> = match page.get(b"Contents") {
        Ok(contents) => match pdf::resolve(doc, contents)? {
            Object::Array(items) => items.clone(),
            Object::Stream(_) => vec![contents.clone()],
            _ => {
                return Err(PageError::Malformed {
                    key: "Contents",
                    reason: "expected a stream or an array".into(),
                });
            }
        },
        Err(_) => Vec::new(),
    };

    let overlay = Content {
        operations: vec![
            Operation::new("Q", vec![]),
            Operation::new("q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new(
                "rg",
                vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)],
            ),
            Operation::new(
                "Tf",
                vec![
                    Object::Name(STAMP_FONT.to_vec()),
                    Object::Integer(STAMP_FONT_SIZE),
                ],
            ),
            Operation::new(
                "Tm",
                matrix
                    .into_iter()
                    .map(Object::Integer)
                    .chain([
                        pdf::number(position.x.round()),
                        pdf::number(position.y.round()),
                    ])
                    .collect(),
            ),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ],
    };
    let overlay_bytes = overlay.encode()?;

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    fonts.set(STAMP_FONT.to_vec(), Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    let save_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    let overlay_id = doc.add_object(Stream::new(dictionary! {}, overlay_bytes));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(save_id));
    contents.extend(existing);
    contents.push(Object::Reference(overlay_id));

    let page = doc.get_dictionary_mut(page_id)?;
    page.set("Contents", Object::Array(contents));
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}
