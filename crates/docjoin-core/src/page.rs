//! Page documents
//!
//! A parsed PDF plus the page-tree helpers shared by merge and extract.

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::DocJoinError;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_ATTRIBUTES: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `Parent` chains in malformed files.
const MAX_TREE_DEPTH: usize = 64;

/// A parsed fixed-layout document.
#[derive(Debug, Clone)]
pub struct PageDocument {
    name: String,
    document: Document,
}

impl PageDocument {
    /// Parse PDF bytes. Encrypted documents are rejected since their pages
    /// cannot be copied into another file.
    pub fn parse(name: impl Into<String>, bytes: &[u8]) -> Result<Self, DocJoinError> {
        let name = name.into();
        let document = Document::load_mem(bytes)
            .map_err(|e| DocJoinError::ParseError(format!("PDF '{}': {}", name, e)))?;

        if document.is_encrypted() {
            return Err(DocJoinError::ParseError(format!(
                "PDF '{}': encrypted documents are not supported",
                name
            )));
        }

        Ok(Self { name, document })
    }

    pub(crate) fn from_document(name: impl Into<String>, document: Document) -> Self {
        Self {
            name: name.into(),
            document,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// Page object ids in page order.
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.document.get_pages().into_values().collect()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub(crate) fn into_document(self) -> Document {
        self.document
    }

    /// Decoded content stream of the 1-indexed page `page`.
    pub fn page_content(&self, page: u32) -> Result<Vec<u8>, DocJoinError> {
        let page_id = self
            .document
            .get_pages()
            .get(&page)
            .copied()
            .ok_or_else(|| {
                DocJoinError::InvalidPageRange(format!(
                    "Page {} does not exist (document has {} pages)",
                    page,
                    self.page_count()
                ))
            })?;
        self.document
            .get_page_content(page_id)
            .map_err(|e| DocJoinError::OperationError(format!("Failed to read page {}: {}", page, e)))
    }

    /// Serialize to PDF bytes, dropping unreachable objects.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocJoinError> {
        save_document(self.document.clone())
    }
}

pub(crate) fn save_document(mut document: Document) -> Result<Vec<u8>, DocJoinError> {
    document.prune_objects();
    document.renumber_objects();
    document.compress();

    let mut buffer = Vec::new();
    document
        .save_to(&mut buffer)
        .map_err(|e| DocJoinError::SerializationError(format!("Failed to save PDF: {}", e)))?;
    Ok(buffer)
}

/// Copy of a page dictionary with inherited attributes made explicit, so the
/// page keeps its resources and geometry when moved under another parent.
pub(crate) fn flatten_page(doc: &Document, page_id: ObjectId) -> Result<Dictionary, DocJoinError> {
    let mut page = doc
        .get_dictionary(page_id)
        .map_err(|e| DocJoinError::ParseError(format!("Page {:?}: {}", page_id, e)))?
        .clone();

    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;

    while let Some(parent_id) = parent {
        if depth >= MAX_TREE_DEPTH {
            return Err(DocJoinError::ParseError(format!(
                "Page tree above {:?} is too deep",
                page_id
            )));
        }
        let Ok(node) = doc.get_dictionary(parent_id) else {
            break;
        };
        for key in INHERITABLE_ATTRIBUTES {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }

    Ok(page)
}

/// Id of the root `Pages` node referenced by the catalog.
pub(crate) fn pages_root_id(doc: &Document) -> Result<ObjectId, DocJoinError> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| DocJoinError::OperationError("No Root in trailer".into()))?;

    doc.get_dictionary(catalog_id)
        .map_err(|_| DocJoinError::OperationError("Invalid catalog".into()))?
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|_| DocJoinError::OperationError("No Pages in catalog".into()))
}

/// Replace the kids of the root page node with `page_refs`.
pub(crate) fn set_page_tree(
    doc: &mut Document,
    pages_id: ObjectId,
    page_refs: &[ObjectId],
) -> Result<(), DocJoinError> {
    match doc.objects.get_mut(&pages_id) {
        Some(Object::Dictionary(pages_dict)) => {
            let kids = page_refs
                .iter()
                .map(|&id| Object::Reference(id))
                .collect::<Vec<_>>();
            pages_dict.set("Kids", Object::Array(kids));
            pages_dict.set("Count", Object::Integer(page_refs.len() as i64));
            Ok(())
        }
        _ => Err(DocJoinError::OperationError(
            "Invalid pages dictionary".into(),
        )),
    }
}
