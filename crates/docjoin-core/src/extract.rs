//! Page extraction
//!
//! Builds a document whose page sequence is exactly the requested one.
//! Requested pages may repeat or appear out of order; each occurrence gets
//! its own page object sharing the source page's content and resources.

use lopdf::Object;

use crate::error::DocJoinError;
use crate::page::{flatten_page, pages_root_id, set_page_tree, PageDocument};

/// Extract the 1-indexed `pages` of `source`, in the order given.
pub fn extract_pages(source: &PageDocument, pages: &[u32]) -> Result<PageDocument, DocJoinError> {
    if pages.is_empty() {
        return Err(DocJoinError::InvalidPageRange("No pages specified".into()));
    }

    let page_ids = source.page_ids();
    let page_count = page_ids.len() as u32;
    if let Some(&bad) = pages.iter().find(|&&p| p == 0 || p > page_count) {
        return Err(DocJoinError::InvalidPageRange(format!(
            "Page {} does not exist (document has {} pages)",
            bad, page_count
        )));
    }

    let mut document = source.document().clone();
    let pages_id = pages_root_id(&document)?;

    let mut kids = Vec::with_capacity(pages.len());
    for &page in pages {
        let mut dict = flatten_page(&document, page_ids[(page - 1) as usize])?;
        dict.set("Parent", Object::Reference(pages_id));
        kids.push(document.add_object(dict));
    }
    set_page_tree(&mut document, pages_id, &kids)?;

    tracing::debug!(
        name = %source.name(),
        requested = pages.len(),
        "extracted pages"
    );
    Ok(PageDocument::from_document(source.name(), document))
}
