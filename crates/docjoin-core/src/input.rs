//! Uploaded documents
//!
//! Every input is held as an immutable shared buffer, so any stage may read
//! the bytes again without consuming them.

use std::fmt;
use std::sync::Arc;

/// A named byte blob with the media type the uploader declared for it.
#[derive(Clone, PartialEq, Eq)]
pub struct InputDocument {
    name: String,
    media_type: String,
    bytes: Arc<[u8]>,
}

impl InputDocument {
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Same name, different payload. Used when a converter replaces the
    /// content of an input with an equivalent document in another format.
    pub fn with_content(&self, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: self.name.clone(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }
}

impl fmt::Debug for InputDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputDocument")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}
