//! Per-document outcomes collected during a request

use serde::Serialize;

use crate::error::DocJoinError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    ClassificationUnknown,
    Conversion,
    Parse,
    UnsupportedResourceReference,
    Operation,
}

/// A document that was left out of an artifact, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentFailure {
    pub name: String,
    pub kind: FailureKind,
    pub message: String,
}

impl DocumentFailure {
    pub fn from_error(name: &str, err: &DocJoinError) -> Self {
        let kind = match err {
            DocJoinError::ClassificationUnknown { .. } => FailureKind::ClassificationUnknown,
            DocJoinError::ConversionFailure { .. } => FailureKind::Conversion,
            DocJoinError::ParseError(_) => FailureKind::Parse,
            DocJoinError::UnsupportedResourceReference { .. } => {
                FailureKind::UnsupportedResourceReference
            }
            DocJoinError::DocumentFailed { source, .. } => {
                return Self::from_error(name, source);
            }
            _ => FailureKind::Operation,
        };
        Self {
            name: name.to_string(),
            kind,
            message: err.to_string(),
        }
    }
}

/// Output of a best-effort composition: whatever could be assembled, plus
/// the documents that could not.
#[derive(Debug)]
pub struct Composition<T> {
    pub output: T,
    pub failures: Vec<DocumentFailure>,
    /// Number of documents whose content made it into `output`.
    pub contributed: usize,
}

impl<T> Composition<T> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// How a composition engine reacts to a document it cannot use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Skip the document, record the failure, keep going.
    #[default]
    BestEffort,
    /// Abort the whole composition on the first failure.
    AllOrNothing,
}

impl MergePolicy {
    pub fn from_best_effort(best_effort: bool) -> Self {
        if best_effort {
            MergePolicy::BestEffort
        } else {
            MergePolicy::AllOrNothing
        }
    }

    /// Record `err` against `name` or turn it into a fatal error, depending on
    /// the policy.
    pub(crate) fn absorb(
        self,
        name: &str,
        err: DocJoinError,
        failures: &mut Vec<DocumentFailure>,
    ) -> Result<(), DocJoinError> {
        match self {
            MergePolicy::BestEffort => {
                tracing::warn!(name = %name, error = %err, "skipping document");
                failures.push(DocumentFailure::from_error(name, &err));
                Ok(())
            }
            MergePolicy::AllOrNothing => Err(DocJoinError::DocumentFailed {
                name: name.to_string(),
                source: Box::new(err),
            }),
        }
    }
}
