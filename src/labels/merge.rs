//! Merges cropped labels into a single PDF, preserving order.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use lopdf::{Document, Object, ObjectId, dictionary};
use tracing::info;

use crate::error::OutputError;
use crate::labels::pdf;

/// Concatenate the pages of `documents`, in order, into one document.
pub fn merge_documents(documents: Vec<Document>) -> Result<Document, OutputError> {
    if documents.is_empty() {
        return Err(OutputError::Merge("nothing to merge".into()));
    }

    let mut next_id = 1;
    let mut page_ids: Vec<ObjectId> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for (index, mut doc) in documents.into_iter().enumerate() {
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        for &page_id in &pages {
            pdf::flatten_page_attributes(&mut doc, page_id)
                .map_err(|e| OutputError::Merge(format!("document {index}: {e}")))?;
        }
        page_ids.extend(pages);
        objects.extend(doc.objects);
    }

    if page_ids.is_empty() {
        return Err(OutputError::Merge("documents contain no pages".into()));
    }

    let pages_id = (next_id, 0);
    let catalog_id = (next_id + 1, 0);

    let mut merged = Document::with_version("1.5");
    for (id, object) in objects {
        // Old catalogs and page tree nodes are replaced by a single new tree.
        if is_dictionary_of_type(&object, b"Catalog") || is_dictionary_of_type(&object, b"Pages") {
            continue;
        }
        merged.objects.insert(id, object);
    }

    for page_id in &page_ids {
        if let Some(Object::Dictionary(page)) = merged.objects.get_mut(page_id) {
            page.set("Parent", Object::Reference(pages_id));
        }
    }

    let kids: Vec<Object> = page_ids.iter().copied().map(Object::Reference).collect();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_ids.len() as i64),
        }),
    );
    merged.objects.insert(
        catalog_id,
        Object::Dictionary(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        }),
    );
    merged.trailer.set("Root", Object::Reference(catalog_id));
    merged.max_id = catalog_id.0;

    merged.prune_objects();
    merged.renumber_objects();
    Ok(merged)
}

/// Load `inputs` in order, merge them and write the result to `output`.
///
/// Returns the number of pages written.
pub fn merge_files(inputs: &[PathBuf], output: &Path) -> Result<usize, OutputError> {
    let documents = inputs
        .iter()
        .map(|path| {
            Document::load(path)
                .map_err(|e| OutputError::Merge(format!("cannot load {}: {e}", path.display())))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut merged = merge_documents(documents)?;
    let page_count = merged.get_pages().len();

    // Write beside the target, then rename into place.
    let partial = output.with_extension("pdf.part");
    if let Err(source) = write_document(&mut merged, &partial) {
        let _ = fs::remove_file(&partial);
        return Err(OutputError::Persist {
            path: output.to_path_buf(),
            source,
        });
    }
    if let Err(source) = fs::rename(&partial, output) {
        let _ = fs::remove_file(&partial);
        return Err(OutputError::Persist {
            path: output.to_path_buf(),
            source,
        });
    }

    info!(path = %output.display(), pages = page_count, "Merged labels written");
    Ok(page_count)
}

fn write_document(document: &mut Document, path: &Path) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    document
        .save_to(&mut writer)
        .map_err(|e| io::Error::other(e.to_string()))?;
    writer.flush()?;
    writer.get_ref().sync_all()
}

fn is_dictionary_of_type(object: &Object, type_name: &[u8]) -> bool {
    match object {
        Object::Dictionary(dict) => {
            matches!(dict.get(b"Type"), Ok(Object::Name(name)) if name.as_slice() == type_name)
        }
        _ => false,
    }
}
