use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocJoinError {
    #[error("Unrecognized document '{name}' (media type: {media_type})")]
    ClassificationUnknown { name: String, media_type: String },

    #[error("Invalid ordering: {0}")]
    InvalidOrdering(OrderingViolation),

    #[error("Invalid page range: {0}")]
    InvalidPageRange(String),

    #[error("Conversion failed for '{name}': {reason}")]
    ConversionFailure { name: String, reason: String },

    #[error("Unsupported resource reference in '{document}': {detail}")]
    UnsupportedResourceReference { document: String, detail: String },

    #[error("Staging I/O failure at {}: {source}", path.display())]
    StagingIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {0}")]
    ParseError(String),

    #[error("Document operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Document '{name}' failed: {source}")]
    DocumentFailed {
        name: String,
        #[source]
        source: Box<DocJoinError>,
    },
}

impl DocJoinError {
    pub(crate) fn staging(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StagingIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unsupported(document: &str, detail: impl Into<String>) -> Self {
        Self::UnsupportedResourceReference {
            document: document.to_string(),
            detail: detail.into(),
        }
    }
}

/// The reasons a requested ordering is not a permutation of the input names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderingViolation {
    pub duplicates: Vec<String>,
    pub unknown: Vec<String>,
    pub missing: Vec<String>,
    pub expected: usize,
    pub actual: usize,
}

impl OrderingViolation {
    pub fn is_empty(&self) -> bool {
        self.duplicates.is_empty()
            && self.unknown.is_empty()
            && self.missing.is_empty()
            && self.expected == self.actual
    }
}

impl fmt::Display for OrderingViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.duplicates.is_empty() {
            parts.push(format!("duplicate entries [{}]", self.duplicates.join(", ")));
        }
        if !self.unknown.is_empty() {
            parts.push(format!("unknown entries [{}]", self.unknown.join(", ")));
        }
        if !self.missing.is_empty() {
            parts.push(format!("missing entries [{}]", self.missing.join(", ")));
        }
        if self.expected != self.actual {
            parts.push(format!(
                "expected {} entries, got {}",
                self.expected, self.actual
            ));
        }
        if parts.is_empty() {
            write!(f, "ordering rejected")
        } else {
            write!(f, "{}", parts.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_violation_names_every_offender() {
        let violation = OrderingViolation {
            duplicates: vec!["a.pdf".into()],
            unknown: vec!["zzz.pdf".into()],
            missing: vec!["b.pdf".into(), "c.pdf".into()],
            expected: 3,
            actual: 2,
        };
        let message = DocJoinError::InvalidOrdering(violation).to_string();
        assert!(message.contains("duplicate entries [a.pdf]"));
        assert!(message.contains("unknown entries [zzz.pdf]"));
        assert!(message.contains("missing entries [b.pdf, c.pdf]"));
        assert!(message.contains("expected 3 entries, got 2"));
    }

    #[test]
    fn test_document_failed_keeps_source() {
        let err = DocJoinError::DocumentFailed {
            name: "broken.pdf".into(),
            source: Box::new(DocJoinError::ParseError("bad xref".into())),
        };
        assert!(err.to_string().contains("broken.pdf"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
