//! Low-level page helpers on top of `lopdf`.

use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};

use crate::carriers::{CropGeometry, Point};

/// Page attributes that may be inherited from the page tree.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Guards reference chains and page-tree walks against cycles.
const MAX_DEPTH: usize = 64;

/// Errors while reading or restructuring a page.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("{0}")]
    Pdf(#[from] lopdf::Error),

    #[error("missing {0}")]
    Missing(&'static str),

    #[error("malformed {key}: {reason}")]
    Malformed { key: &'static str, reason: String },

    #[error("reference chain or page tree deeper than {MAX_DEPTH}")]
    TooDeep,
}

/// Width and height of a page in PDF user units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

/// A page box (`MediaBox`, `CropBox`, …), normalized so `x0 <= x1`, `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl PageBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn size(&self) -> PageSize {
        PageSize {
            width: self.width(),
            height: self.height(),
        }
    }

    pub fn to_object(self) -> Object {
        Object::Array(vec![
            number(self.x0),
            number(self.y0),
            number(self.x1),
            number(self.y1),
        ])
    }
}

/// An uncropped page: its MediaBox and the `/Rotate` it is displayed with.
///
/// Carrier layouts are expressed in the *displayed* frame (origin at the
/// visual lower-left corner, `width × height` as the reader sees it). This
/// maps that frame back onto MediaBox coordinates, where content lives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourcePage {
    pub media_box: PageBox,
    /// Degrees clockwise, normalized to `0..360`.
    pub rotation: i64,
}

impl SourcePage {
    pub fn new(media_box: PageBox, rotation: i64) -> Self {
        Self {
            media_box,
            rotation: rotation.rem_euclid(360),
        }
    }

    pub fn unrotated(media_box: PageBox) -> Self {
        Self::new(media_box, 0)
    }

    pub fn displayed_size(&self) -> PageSize {
        let size = self.media_box.size();
        match self.rotation {
            90 | 270 => PageSize {
                width: size.height,
                height: size.width,
            },
            _ => size,
        }
    }

    /// Displayed-frame point to MediaBox coordinates.
    pub fn to_media(&self, point: Point) -> Point {
        let (w, h) = (self.media_box.width(), self.media_box.height());
        let (u, v) = (point.x, point.y);
        let (x, y) = match self.rotation {
            90 => (w - v, u),
            180 => (w - u, h - v),
            270 => (v, h - u),
            _ => (u, v),
        };
        Point::new(self.media_box.x0 + x, self.media_box.y0 + y)
    }

    /// Displayed-frame rectangle to a MediaBox-space page box.
    pub fn crop_box(&self, geometry: &CropGeometry) -> PageBox {
        let a = self.to_media(geometry.lower_left);
        let b = self.to_media(geometry.upper_right);
        PageBox::new(a.x, a.y, b.x, b.y)
    }

    /// Text matrix coefficients `[a b c d]` that keep text upright on screen.
    pub fn upright_text_matrix(&self) -> [i64; 4] {
        match self.rotation {
            90 => [0, 1, -1, 0],
            180 => [-1, 0, 0, -1],
            270 => [0, -1, 1, 0],
            _ => [1, 0, 0, 1],
        }
    }
}

/// Follow indirect references until a direct object is reached.
pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Result<&'a Object, PageError> {
    let mut current = object;
    for _ in 0..MAX_DEPTH {
        match current {
            Object::Reference(id) => current = doc.get_object(*id)?,
            other => return Ok(other),
        }
    }
    Err(PageError::TooDeep)
}

/// Look up `key` on the page, walking up `/Parent` links when absent.
pub fn inherited_attribute(
    doc: &Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<Object>, PageError> {
    let mut node_id = page_id;
    for _ in 0..MAX_DEPTH {
        let node = doc.get_dictionary(node_id)?;
        if let Ok(value) = node.get(key) {
            return Ok(Some(value.clone()));
        }
        match node.get(b"Parent") {
            Ok(Object::Reference(parent)) => node_id = *parent,
            _ => return Ok(None),
        }
    }
    Err(PageError::TooDeep)
}

/// Copy inherited attributes onto the page itself so it can be re-parented.
pub fn flatten_page_attributes(doc: &mut Document, page_id: ObjectId) -> Result<(), PageError> {
    for key in INHERITABLE {
        if doc.get_dictionary(page_id)?.has(key) {
            continue;
        }
        if let Some(value) = inherited_attribute(doc, page_id, key)? {
            doc.get_dictionary_mut(page_id)?.set(key.to_vec(), value);
        }
    }
    Ok(())
}

/// First page of the document, by page number.
pub fn first_page(doc: &Document) -> Option<ObjectId> {
    doc.get_pages().into_values().next()
}

/// Read a page box, following inheritance.
pub fn page_box(doc: &Document, page_id: ObjectId, key: &'static str) -> Result<PageBox, PageError> {
    let raw = inherited_attribute(doc, page_id, key.as_bytes())?.ok_or(PageError::Missing(key))?;
    let items = match resolve(doc, &raw)? {
        Object::Array(items) => items,
        _ => {
            return Err(PageError::Malformed {
                key,
                reason: "expected an array".into(),
            });
        }
    };
    if items.len() != 4 {
        return Err(PageError::Malformed {
            key,
            reason: format!("expected 4 numbers, found {}", items.len()),
        });
    }
    let mut values = [0.0; 4];
    for (slot, item) in values.iter_mut().zip(items) {
        *slot = as_number(resolve(doc, item)?).ok_or_else(|| PageError::Malformed {
            key,
            reason: "non-numeric coordinate".into(),
        })?;
    }
    Ok(PageBox::new(values[0], values[1], values[2], values[3]))
}

/// Page `/Rotate` in degrees, normalized to `0..360`.
pub fn page_rotation(doc: &Document, page_id: ObjectId) -> Result<i64, PageError> {
    let Some(raw) = inherited_attribute(doc, page_id, b"Rotate")? else {
        return Ok(0);
    };
    match resolve(doc, &raw)? {
        Object::Integer(degrees) => Ok(degrees.rem_euclid(360)),
        _ => Err(PageError::Malformed {
            key: "Rotate",
            reason: "expected an integer".into(),
        }),
    }
}

/// Size of the page as displayed: the crop box with `/Rotate` applied.
pub fn displayed_size(doc: &Document, page_id: ObjectId) -> Result<PageSize, PageError> {
    let visible = page_box(doc, page_id, "CropBox").or_else(|_| page_box(doc, page_id, "MediaBox"))?;
    let size = visible.size();
    Ok(match page_rotation(doc, page_id)? {
        90 | 270 => PageSize {
            width: size.height,
            height: size.width,
        },
        _ => size,
    })
}

/// Resolve an entry of `dict` to an owned dictionary, or an empty one.
pub fn owned_dictionary(doc: &Document, dict: &Dictionary, key: &[u8]) -> Result<Dictionary, PageError> {
    match dict.get(key) {
        Ok(object) => match resolve(doc, object)? {
            Object::Dictionary(inner) => Ok(inner.clone()),
            _ => Err(PageError::Malformed {
                key: "Resources",
                reason: format!("{} is not a dictionary", String::from_utf8_lossy(key)),
            }),
        },
        Err(_) => Ok(Dictionary::new()),
    }
}

fn as_number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// Integers stay integers in the written PDF.
pub fn number(value: f64) -> Object {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        Object::Integer(value as i64)
    } else {
        Object::from(value)
    }
}

#[cfg(test)]
mod tests {
    use lopdf::dictionary;

    use super::*;
    use crate::labels::testing::single_page_pdf;

    #[test]
    fn reads_inherited_media_box() {
        let mut doc = Document::with_version("1.5");
        let page_id = doc.new_object_id();
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => Object::Integer(1),
            "MediaBox" => PageBox::new(0.0, 0.0, 200.0, 100.0).to_object(),
            "Rotate" => Object::Integer(-90),
        });
        doc.objects.insert(
            page_id,
            Object::Dictionary(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
            }),
        );

        let media = page_box(&doc, page_id, "MediaBox").unwrap();
        assert_eq!(media.size(), PageSize { width: 200.0, height: 100.0 });
        assert_eq!(page_rotation(&doc, page_id).unwrap(), 270);

        flatten_page_attributes(&mut doc, page_id).unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        assert!(page.has(b"MediaBox"));
        assert!(page.has(b"Rotate"));
    }

    #[test]
    fn missing_media_box_is_reported() {
        let mut doc = Document::with_version("1.5");
        let page_id = doc.add_object(dictionary! { "Type" => "Page" });
        let err = page_box(&doc, page_id, "MediaBox").unwrap_err();
        assert!(matches!(err, PageError::Missing("MediaBox")));
    }

    #[test]
    fn displayed_size_swaps_for_quarter_turns() {
        let bytes = single_page_pdf(600.0, 800.0, "hello");
        let mut doc = Document::load_mem(&bytes).unwrap();
        let page_id = first_page(&doc).unwrap();
        assert_eq!(
            displayed_size(&doc, page_id).unwrap(),
            PageSize { width: 600.0, height: 800.0 }
        );
        doc.get_dictionary_mut(page_id)
            .unwrap()
            .set("Rotate", Object::Integer(90));
        assert_eq!(
            displayed_size(&doc, page_id).unwrap(),
            PageSize { width: 800.0, height: 600.0 }
        );
    }

    #[test]
    fn source_page_maps_displayed_corners_to_media() {
        // 800 wide, 600 high, shown portrait.
        let page = SourcePage::new(PageBox::new(0.0, 0.0, 800.0, 600.0), 90);
        assert_eq!(page.displayed_size(), PageSize { width: 600.0, height: 800.0 });

        // Visual lower-left is the MediaBox lower-right.
        assert_eq!(page.to_media(Point::new(0.0, 0.0)), Point::new(800.0, 0.0));
        // Visual upper-right is the MediaBox upper-left.
        assert_eq!(page.to_media(Point::new(600.0, 800.0)), Point::new(0.0, 600.0));
    }

    #[test]
    fn source_page_quarter_turns_are_inverse() {
        let media = PageBox::new(10.0, 20.0, 610.0, 820.0);
        for rotation in [0, 90, 180, 270, -90, 450] {
            let page = SourcePage::new(media, rotation);
            let size = page.displayed_size();
            let corners = [
                Point::new(0.0, 0.0),
                Point::new(size.width, 0.0),
                Point::new(0.0, size.height),
                Point::new(size.width, size.height),
            ];
            for corner in corners {
                let p = page.to_media(corner);
                assert!(p.x >= media.x0 && p.x <= media.x1, "{rotation}: {p:?}");
                assert!(p.y >= media.y0 && p.y <= media.y1, "{rotation}: {p:?}");
            }
        }
    }

    #[test]
    fn numbers_keep_integers_exact() {
        assert!(matches!(number(300.0), Object::Integer(300)));
        assert!(matches!(number(0.5), Object::Real(_)));
    }
}
