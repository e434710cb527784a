//! Packing-slip page filtering
//!
//! Keeps only the pages of a converted document whose text classifies as a
//! packing slip. Page order is never changed; a page whose text cannot be
//! extracted is logged and dropped without affecting the other pages.

use crate::classifier::ClassifierConfig;
use crate::extractor::extract_page_text;
use crate::PackError;
use lopdf::{Document, Object, ObjectId};
use std::path::{Path, PathBuf};

/// Page attributes that a page may inherit from its ancestors in the page tree
const INHERITABLE_ATTRIBUTES: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Source of per-page text for classification
pub trait PageTextSource {
    /// Extract the text of one page; failures only affect that page
    fn page_text(
        &self,
        doc: &Document,
        page_number: u32,
        page_id: ObjectId,
    ) -> Result<String, PackError>;
}

/// Default text source: decode the page's content stream with lopdf
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentStreamText;

impl PageTextSource for ContentStreamText {
    fn page_text(
        &self,
        doc: &Document,
        page_number: u32,
        page_id: ObjectId,
    ) -> Result<String, PackError> {
        extract_page_text(doc, page_id, page_number)
    }
}

/// A document reduced to its packing-slip pages
#[derive(Debug, Clone)]
pub struct FilteredDocument {
    /// File the pages were taken from, if loaded from disk
    pub source: Option<PathBuf>,
    /// Page numbers (1-indexed) of the source that were kept, ascending
    pub kept_pages: Vec<u32>,
    /// Page count of the source document
    pub source_page_count: u32,
    document: Document,
}

impl FilteredDocument {
    pub fn page_count(&self) -> usize {
        self.kept_pages.len()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

/// Filter a PDF file down to its packing-slip pages
pub fn filter_pdf<P: AsRef<Path>>(path: P) -> Result<Option<FilteredDocument>, PackError> {
    let doc = Document::load(&path)?;
    let filtered = filter_document(doc, &ClassifierConfig::default(), &ContentStreamText);
    Ok(filtered.map(|mut f| {
        f.source = Some(path.as_ref().to_path_buf());
        f
    }))
}

/// Filter a PDF held in memory down to its packing-slip pages
pub fn filter_pdf_mem(buffer: &[u8]) -> Result<Option<FilteredDocument>, PackError> {
    let doc = Document::load_mem(buffer)?;
    Ok(filter_document(
        doc,
        &ClassifierConfig::default(),
        &ContentStreamText,
    ))
}

/// Filter a PDF file with a custom classifier configuration
pub fn filter_pdf_with_config<P: AsRef<Path>>(
    path: P,
    config: &ClassifierConfig,
) -> Result<Option<FilteredDocument>, PackError> {
    let doc = Document::load(&path)?;
    let filtered = filter_document(doc, config, &ContentStreamText);
    Ok(filtered.map(|mut f| {
        f.source = Some(path.as_ref().to_path_buf());
        f
    }))
}

/// Filter a loaded document, returning `None` when no page matches
pub fn filter_document<T: PageTextSource>(
    mut doc: Document,
    config: &ClassifierConfig,
    text_source: &T,
) -> Option<FilteredDocument> {
    let pages = doc.get_pages();
    let source_page_count = pages.len() as u32;

    let mut kept_pages = Vec::new();
    for (&page_num, &page_id) in pages.iter() {
        match text_source.page_text(&doc, page_num, page_id) {
            Ok(text) => {
                if config.classify(Some(&text)) {
                    kept_pages.push(page_num);
                }
            }
            Err(e) => {
                log::warn!("Skipping page {} after text extraction error: {}", page_num, e);
            }
        }
    }

    if kept_pages.is_empty() {
        return None;
    }

    if kept_pages.len() < pages.len() {
        push_down_inherited_attributes(&mut doc);

        // Delete in reverse so the remaining page numbers stay valid
        let mut pages_to_delete: Vec<u32> = pages
            .keys()
            .copied()
            .filter(|p| !kept_pages.contains(p))
            .collect();
        pages_to_delete.reverse();
        for page_num in pages_to_delete {
            doc.delete_pages(&[page_num]);
        }
        doc.prune_objects();
    }

    log::debug!(
        "Kept {} of {} pages: {:?}",
        kept_pages.len(),
        source_page_count,
        kept_pages
    );

    Some(FilteredDocument {
        source: None,
        kept_pages,
        source_page_count,
        document: doc,
    })
}

/// Copy attributes inherited through the page tree onto every page
///
/// Office converters commonly put `Resources` and `MediaBox` on the root
/// `Pages` node. Once pages are moved to another tree they would lose them.
pub fn push_down_inherited_attributes(doc: &mut Document) {
    let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();

    for page_id in page_ids {
        let mut inherited = Vec::new();
        for key in INHERITABLE_ATTRIBUTES {
            let present = doc
                .get_dictionary(page_id)
                .map(|page| page.has(key))
                .unwrap_or(true);
            if !present {
                if let Some(value) = find_inherited(doc, page_id, key) {
                    inherited.push((key, value));
                }
            }
        }

        if inherited.is_empty() {
            continue;
        }
        if let Ok(page) = doc.get_dictionary_mut(page_id) {
            for (key, value) in inherited {
                page.set(key.to_vec(), value);
            }
        }
    }
}

/// Walk up the Parent chain looking for an attribute
fn find_inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = doc
        .get_dictionary(page_id)
        .ok()?
        .get(b"Parent")
        .and_then(Object::as_reference)
        .ok();

    // Bounded walk in case of a cyclic tree
    let mut depth = 0;
    while let Some(node_id) = current {
        if depth > 64 {
            break;
        }
        let node = doc.get_dictionary(node_id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        current = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Text source backed by a fixed list of page texts
    struct FixedText {
        pages: Vec<Option<&'static str>>,
        seen: RefCell<Vec<u32>>,
    }

    impl PageTextSource for FixedText {
        fn page_text(
            &self,
            _doc: &Document,
            page_number: u32,
            _page_id: ObjectId,
        ) -> Result<String, PackError> {
            self.seen.borrow_mut().push(page_number);
            match self.pages[(page_number - 1) as usize] {
                Some(text) => Ok(text.to_string()),
                None => Err(PackError::PageText {
                    page: page_number,
                    reason: "unreadable".into(),
                }),
            }
        }
    }

    fn blank_document(num_pages: u32) -> Document {
        use lopdf::Dictionary;

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = (0..num_pages)
            .map(|_| {
                let page = Dictionary::from_iter(vec![
                    ("Type", Object::Name(b"Page".to_vec())),
                    ("Parent", Object::Reference(pages_id)),
                ]);
                Object::Reference(doc.add_object(page))
            })
            .collect();
        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(num_pages as i64)),
            ("Kids", Object::Array(kids)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(842),
                    Object::Integer(595),
                ]),
            ),
        ]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]);
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc
    }

    #[test]
    fn test_keeps_matching_pages_in_order() {
        let source = FixedText {
            pages: vec![
                Some("PACKING SLIP page one"),
                Some("COMMERCIAL INVOICE"),
                Some("PACKING SLIP page three"),
            ],
            seen: RefCell::new(Vec::new()),
        };

        let filtered =
            filter_document(blank_document(3), &ClassifierConfig::default(), &source).unwrap();
        assert_eq!(filtered.kept_pages, vec![1, 3]);
        assert_eq!(filtered.source_page_count, 3);
        assert_eq!(filtered.document().get_pages().len(), 2);
        assert_eq!(*source.seen.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_no_matching_pages_yields_none() {
        let source = FixedText {
            pages: vec![Some("INVOICE"), Some("")],
            seen: RefCell::new(Vec::new()),
        };
        assert!(filter_document(blank_document(2), &ClassifierConfig::default(), &source).is_none());
    }

    #[test]
    fn test_unreadable_page_does_not_stop_filtering() {
        let source = FixedText {
            pages: vec![None, Some("PACKING SLIP"), None, Some("PACKING SLIP")],
            seen: RefCell::new(Vec::new()),
        };

        let filtered =
            filter_document(blank_document(4), &ClassifierConfig::default(), &source).unwrap();
        assert_eq!(filtered.kept_pages, vec![2, 4]);
        assert_eq!(*source.seen.borrow(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_inherited_media_box_moves_onto_kept_pages() {
        let source = FixedText {
            pages: vec![Some("INVOICE"), Some("PACKING SLIP")],
            seen: RefCell::new(Vec::new()),
        };

        let filtered =
            filter_document(blank_document(2), &ClassifierConfig::default(), &source).unwrap();
        let doc = filtered.document();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        assert!(page.has(b"MediaBox"));
    }
}
