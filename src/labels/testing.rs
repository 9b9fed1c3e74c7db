//! PDF fixtures for unit tests.

use lopdf::{Document, Object, Stream, dictionary};

use crate::labels::pdf::PageBox;

/// A one-page PDF of `width` × `height` points showing `text`.
pub fn single_page_pdf(width: f64, height: f64, text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let content = format!("BT /F1 12 Tf 20 20 Td ({text}) Tj ET");
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => PageBox::new(0.0, 0.0, width, height).to_object(),
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Like [`single_page_pdf`], displayed with `/Rotate rotation`.
pub fn rotated_page_pdf(width: f64, height: f64, rotation: i64, text: &str) -> Vec<u8> {
    let mut doc = Document::load_mem(&single_page_pdf(width, height, text)).unwrap();
    let page_id = crate::labels::pdf::first_page(&doc).unwrap();
    doc.get_dictionary_mut(page_id)
        .unwrap()
        .set("Rotate", Object::Integer(rotation));
    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}
