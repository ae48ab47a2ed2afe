//! Format classification
//!
//! Resolves a declared media type and file name to the kind of document the
//! engines can work with. Classification never fails; anything unrecognised
//! is `Unknown` and gets reported by the caller.

use serde::Serialize;

use crate::error::DocJoinError;
use crate::input::InputDocument;
use crate::report::DocumentFailure;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";
pub const PPTX_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const PPT_MEDIA_TYPE: &str = "application/vnd.ms-powerpoint";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DocumentKind {
    Pdf,
    SlideDeck,
    LegacySlideDeck,
    Unknown,
}

/// Classify one input by declared media type, falling back to the `.ppt`
/// extension for legacy decks.
pub fn classify(name: &str, media_type: &str) -> DocumentKind {
    match media_type {
        PDF_MEDIA_TYPE => DocumentKind::Pdf,
        PPTX_MEDIA_TYPE => DocumentKind::SlideDeck,
        PPT_MEDIA_TYPE => DocumentKind::LegacySlideDeck,
        _ if has_extension(name, "ppt") => DocumentKind::LegacySlideDeck,
        _ => DocumentKind::Unknown,
    }
}

fn has_extension(name: &str, extension: &str) -> bool {
    name.rsplit_once('.')
        .map(|(stem, ext)| !stem.is_empty() && ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// An input together with its resolved kind. Never `Unknown`.
#[derive(Debug, Clone)]
pub struct ClassifiedInput {
    pub input: InputDocument,
    pub kind: DocumentKind,
}

impl ClassifiedInput {
    pub fn name(&self) -> &str {
        self.input.name()
    }
}

/// Split inputs into classified ones and `ClassificationUnknown` failures,
/// keeping the upload order on both sides.
pub fn classify_all(inputs: &[InputDocument]) -> (Vec<ClassifiedInput>, Vec<DocumentFailure>) {
    let mut classified = Vec::with_capacity(inputs.len());
    let mut failures = Vec::new();

    for input in inputs {
        match classify(input.name(), input.media_type()) {
            DocumentKind::Unknown => {
                let err = DocJoinError::ClassificationUnknown {
                    name: input.name().to_string(),
                    media_type: input.media_type().to_string(),
                };
                tracing::warn!(name = %input.name(), media_type = %input.media_type(), "unsupported document type");
                failures.push(DocumentFailure::from_error(input.name(), &err));
            }
            kind => classified.push(ClassifiedInput {
                input: input.clone(),
                kind,
            }),
        }
    }

    (classified, failures)
}
