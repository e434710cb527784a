//! Merging of filtered documents
//!
//! Concatenates the pages of several filtered documents into one PDF. Pages
//! keep both the file order and their order inside each file.

use crate::filter::{push_down_inherited_attributes, FilteredDocument};
use crate::PackError;
use lopdf::{Document, Object, ObjectId};
use std::path::Path;

/// Merge filtered documents into one, returning `None` when there is nothing to merge
///
/// The algorithm:
/// 1. If empty, return `None`
/// 2. If single document, return it as-is
/// 3. Use the first document as the destination
/// 4. For each further document:
///    a. Offset its object IDs past the destination's highest ID
///    b. Import all objects with remapped references
///    c. Append its pages to the destination page list
/// 5. Rebuild a flat page tree, prune unreachable objects and compress
pub fn merge_documents(documents: Vec<FilteredDocument>) -> Result<Option<Document>, PackError> {
    let mut documents = documents.into_iter().map(FilteredDocument::into_document);

    let Some(mut dest) = documents.next() else {
        return Ok(None);
    };

    let mut rest = documents.peekable();
    if rest.peek().is_none() {
        return Ok(Some(dest));
    }

    push_down_inherited_attributes(&mut dest);
    let mut dest_page_refs = page_references(&dest);
    let mut dest_max_id = dest.max_id;

    for mut source in rest {
        push_down_inherited_attributes(&mut source);
        let source_pages = page_references(&source);
        let id_offset = dest_max_id;

        for (old_id, object) in std::mem::take(&mut source.objects) {
            let new_id = (old_id.0 + id_offset, old_id.1);
            dest.objects.insert(new_id, remap_object_refs(object, id_offset));
        }

        dest_page_refs.extend(
            source_pages
                .into_iter()
                .map(|(num, generation)| (num + id_offset, generation)),
        );

        dest_max_id = (source.max_id + id_offset).max(dest_max_id);
    }

    dest.max_id = dest_max_id;
    update_page_tree(&mut dest, &dest_page_refs)?;

    // The imported catalogs and page trees are no longer referenced
    dest.prune_objects();
    dest.compress();

    Ok(Some(dest))
}

/// Merge filtered documents and write the result to `output`
///
/// Returns the number of pages written, or `None` when nothing was merged
/// and no file was created.
pub fn merge_to_file<P: AsRef<Path>>(
    documents: Vec<FilteredDocument>,
    output: P,
) -> Result<Option<usize>, PackError> {
    let Some(mut merged) = merge_documents(documents)? else {
        return Ok(None);
    };
    let page_count = merged.get_pages().len();
    merged.save(output.as_ref())?;
    Ok(Some(page_count))
}

/// Get all page object references from a document, in page order
fn page_references(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().values().copied().collect()
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Point the destination's root page tree at `page_refs`, flattening it
fn update_page_tree(doc: &mut Document, page_refs: &[ObjectId]) -> Result<(), PackError> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| PackError::InvalidStructure("No Root reference in trailer".into()))?;

    let pages_id = doc
        .get_dictionary(catalog_id)
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|_| PackError::InvalidStructure("No Pages reference in catalog".into()))?;

    match doc.objects.get_mut(&pages_id) {
        Some(Object::Dictionary(pages_dict)) => {
            let kids = page_refs.iter().map(|&id| Object::Reference(id)).collect();
            pages_dict.set("Kids", Object::Array(kids));
            pages_dict.set("Count", Object::Integer(page_refs.len() as i64));
        }
        _ => {
            return Err(PackError::InvalidStructure(
                "Invalid pages dictionary".into(),
            ))
        }
    }

    for &page_id in page_refs {
        if let Ok(page) = doc.get_dictionary_mut(page_id) {
            page.set("Parent", Object::Reference(pages_id));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_empty_returns_none() {
        assert!(merge_documents(Vec::new()).unwrap().is_none());
    }

    #[test]
    fn test_remap_object_refs_nested() {
        let mut dict = lopdf::Dictionary::new();
        dict.set("Parent", Object::Reference((3, 0)));
        dict.set(
            "Kids",
            Object::Array(vec![Object::Reference((4, 0)), Object::Integer(7)]),
        );

        let remapped = remap_object_refs(Object::Dictionary(dict), 10);
        let dict = remapped.as_dict().unwrap();
        assert_eq!(dict.get(b"Parent").unwrap().as_reference().unwrap(), (13, 0));
        let kids = dict.get(b"Kids").unwrap().as_array().unwrap();
        assert_eq!(kids[0].as_reference().unwrap(), (14, 0));
        assert_eq!(kids[1].as_i64().unwrap(), 7);
    }
}
