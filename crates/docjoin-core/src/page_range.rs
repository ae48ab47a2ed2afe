//! Page range parsing
//!
//! Parses selections like `"3, 1-2, 7"` into 1-indexed page numbers in the
//! order they were written. Ranges are neither sorted nor deduplicated:
//! picking a page twice or moving it to the front is a legitimate request.

use crate::error::DocJoinError;

/// Parse a range selection against a document with `page_count` pages.
///
/// Any malformed or out-of-bounds token rejects the whole selection.
pub fn parse_page_range(input: &str, page_count: u32) -> Result<Vec<u32>, DocJoinError> {
    if input.trim().is_empty() {
        return Err(DocJoinError::InvalidPageRange("No pages specified".into()));
    }

    let mut pages = Vec::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(DocJoinError::InvalidPageRange(format!(
                "Empty entry in '{}'",
                input
            )));
        }

        if let Some((start, end)) = part.split_once('-') {
            // Range like "1-3"
            let start = parse_page(start, "start", page_count)?;
            let end = parse_page(end, "end", page_count)?;

            if start > end {
                return Err(DocJoinError::InvalidPageRange(format!(
                    "Start {} > end {}",
                    start, end
                )));
            }

            pages.extend(start..=end);
        } else {
            // Single page like "5"
            pages.push(parse_page(part, "page", page_count)?);
        }
    }

    Ok(pages)
}

fn parse_page(token: &str, role: &str, page_count: u32) -> Result<u32, DocJoinError> {
    let token = token.trim();
    let invalid = || DocJoinError::InvalidPageRange(format!("Invalid {}: '{}'", role, token));
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let page: u32 = token.parse().map_err(|_| invalid())?;

    if page == 0 || page > page_count {
        return Err(DocJoinError::InvalidPageRange(format!(
            "Page {} is out of range (1-{})",
            page, page_count
        )));
    }

    Ok(page)
}
