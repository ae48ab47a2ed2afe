//! PDF composition
//!
//! Concatenates the pages of many documents into one output page stream.
//!
//! The algorithm, per appended document:
//! 1. Flatten inherited page attributes onto every page
//! 2. Offset every object id past the stream's highest id
//! 3. Rewrite every reference inside the imported objects by the same offset
//! 4. Re-parent the pages under the stream's page tree, in document order
//!
//! Nothing touches the stream until all of that has succeeded.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::DocJoinError;
use crate::input::InputDocument;
use crate::page::{flatten_page, save_document, set_page_tree, PageDocument};
use crate::report::{Composition, MergePolicy};

/// Append-only sequence of pages being assembled into one PDF.
#[derive(Debug, Clone)]
pub struct PageStream {
    document: Document,
    pages_id: ObjectId,
    pages: Vec<ObjectId>,
}

impl Default for PageStream {
    fn default() -> Self {
        Self::new()
    }
}

impl PageStream {
    /// An empty document: a catalog and a page tree with no kids.
    pub fn new() -> Self {
        let mut document = Document::with_version("1.7");
        let pages_id = document.new_object_id();
        document.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(Vec::new())),
                ("Count", Object::Integer(0)),
            ])),
        );
        let catalog_id = document.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        document.trailer.set("Root", Object::Reference(catalog_id));

        Self {
            document,
            pages_id,
            pages: Vec::new(),
        }
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Append every page of `source` in its original order. Returns the
    /// number of pages appended. On error the stream is left as it was.
    pub fn append(&mut self, source: PageDocument) -> Result<u32, DocJoinError> {
        let name = source.name().to_string();

        let mut flattened = Vec::new();
        for page_id in source.page_ids() {
            flattened.push((page_id, flatten_page(source.document(), page_id)?));
        }

        let source = source.into_document();
        let offset = self.document.max_id;
        let max_id = offset.checked_add(source.max_id).ok_or_else(|| {
            DocJoinError::OperationError(format!("'{}': object id space exhausted", name))
        })?;

        let mut imported: BTreeMap<ObjectId, Object> = source
            .objects
            .into_iter()
            .map(|(id, object)| ((id.0 + offset, id.1), remap_object_refs(object, offset)))
            .collect();

        let mut page_refs = Vec::with_capacity(flattened.len());
        for (old_id, mut page) in flattened {
            let new_id = (old_id.0 + offset, old_id.1);
            remap_dictionary(&mut page, offset);
            page.set("Parent", Object::Reference(self.pages_id));
            imported.insert(new_id, Object::Dictionary(page));
            page_refs.push(new_id);
        }

        // Imported ids all lie above the stream's own, so nothing is overwritten.
        self.document.objects.extend(imported);
        self.document.max_id = max_id;
        self.pages.extend_from_slice(&page_refs);
        set_page_tree(&mut self.document, self.pages_id, &self.pages)?;

        tracing::debug!(
            name = %name,
            pages = page_refs.len(),
            total = self.pages.len(),
            "appended document"
        );
        Ok(page_refs.len() as u32)
    }

    /// Serialize to PDF bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocJoinError> {
        save_document(self.document.clone())
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, DocJoinError> {
        save_document(self.document)
    }

    pub fn into_page_document(self, name: impl Into<String>) -> PageDocument {
        PageDocument::from_document(name, self.document)
    }
}

/// Concatenate the pages of `ordered` documents, in order.
///
/// Documents that cannot be parsed or appended are handled by `policy`.
pub fn compose_pdf(
    ordered: &[InputDocument],
    policy: MergePolicy,
) -> Result<Composition<PageStream>, DocJoinError> {
    let mut stream = PageStream::new();
    let mut failures = Vec::new();
    let mut contributed = 0;

    for input in ordered {
        let appended =
            PageDocument::parse(input.name(), input.bytes()).and_then(|doc| stream.append(doc));
        match appended {
            Ok(_) => contributed += 1,
            Err(err) => policy.absorb(input.name(), err, &mut failures)?,
        }
    }

    tracing::info!(
        documents = contributed,
        pages = stream.page_count(),
        failed = failures.len(),
        "composed PDF"
    );

    Ok(Composition {
        output: stream,
        failures,
        contributed,
    })
}

/// Recursively offset object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            remap_dictionary(&mut dict, offset);
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            remap_dictionary(&mut stream.dict, offset);
            Object::Stream(stream)
        }
        other => other,
    }
}

fn remap_dictionary(dict: &mut Dictionary, offset: u32) {
    for (_, value) in dict.iter_mut() {
        let taken = std::mem::replace(value, Object::Null);
        *value = remap_object_refs(taken, offset);
    }
}
