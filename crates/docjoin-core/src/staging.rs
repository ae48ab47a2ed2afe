//! Request-scoped staging directory
//!
//! Every request gets its own directory for intermediate files (converter
//! inputs and outputs, composed artifacts). The directory is removed when the
//! area is destroyed, or when it is dropped without having been destroyed,
//! so early returns and unwinding clean up too.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tempfile::{Builder, TempDir};

use crate::error::DocJoinError;

/// Directory name prefix of staging areas created by [`StagingArea::create_in`].
pub const STAGING_PREFIX: &str = "docjoin-";

/// Marks a directory as a staging area, so it may be adopted again.
const MARKER_FILE: &str = ".docjoin-staging";

#[derive(Debug)]
pub struct StagingArea {
    path: PathBuf,
    scope: Option<Scope>,
}

#[derive(Debug)]
enum Scope {
    /// Created by us, removed by `TempDir`.
    Fresh(TempDir),
    /// A caller-chosen directory taken over by [`StagingArea::create_at`].
    Adopted,
}

impl StagingArea {
    /// Create a fresh, uniquely named area under `root`.
    pub fn create_in(root: impl AsRef<Path>) -> Result<Self, DocJoinError> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|e| DocJoinError::staging(root, e))?;

        let dir = Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(root)
            .map_err(|e| DocJoinError::staging(root, e))?;
        let path = dir.path().to_path_buf();
        mark(&path)?;
        tracing::debug!(path = %path.display(), "staging area ready");
        Ok(Self {
            path,
            scope: Some(Scope::Fresh(dir)),
        })
    }

    /// Use `path` as the area. Creating an area at the same path twice is
    /// fine; taking over a non-empty directory that is not a staging area is
    /// refused.
    pub fn create_at(path: impl Into<PathBuf>) -> Result<Self, DocJoinError> {
        let path = path.into();
        if path.exists() {
            if !path.is_dir() {
                return Err(DocJoinError::staging(
                    &path,
                    std::io::Error::new(std::io::ErrorKind::AlreadyExists, "not a directory"),
                ));
            }
            let marked = path.join(MARKER_FILE).is_file();
            let empty = fs::read_dir(&path)
                .map_err(|e| DocJoinError::staging(&path, e))?
                .next()
                .is_none();
            if !marked && !empty {
                return Err(DocJoinError::staging(
                    &path,
                    std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        "directory is not empty and is not a staging area",
                    ),
                ));
            }
        } else {
            fs::create_dir_all(&path).map_err(|e| DocJoinError::staging(&path, e))?;
        }
        mark(&path)?;
        tracing::debug!(path = %path.display(), "staging area adopted");
        Ok(Self {
            path,
            scope: Some(Scope::Adopted),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `bytes` to a file called `name` inside the area.
    pub fn materialize(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, DocJoinError> {
        let path = self.path.join(checked_file_name(&self.path, name)?);
        fs::write(&path, bytes).map_err(|e| DocJoinError::staging(&path, e))?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "materialized file");
        Ok(path)
    }

    /// Read a file inside the area. Relative paths are taken relative to it.
    pub fn read(&self, path: impl AsRef<Path>) -> Result<Vec<u8>, DocJoinError> {
        let path = self.path.join(path.as_ref());
        let escapes = path
            .components()
            .any(|c| matches!(c, Component::ParentDir));
        if escapes || !path.starts_with(&self.path) {
            return Err(DocJoinError::staging(
                &path,
                std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "path is outside the staging area",
                ),
            ));
        }
        fs::read(&path).map_err(|e| DocJoinError::staging(&path, e))
    }

    /// A new empty directory inside the area, e.g. for an external program's
    /// output. It is removed when the returned handle is dropped, and with
    /// the area in any case.
    pub fn scratch_dir(&self, label: &str) -> Result<TempDir, DocJoinError> {
        let label = checked_file_name(&self.path, label)?;
        Builder::new()
            .prefix(&format!("{}-", label))
            .tempdir_in(&self.path)
            .map_err(|e| DocJoinError::staging(&self.path, e))
    }

    /// Delete everything in the area, then the area itself.
    pub fn destroy(mut self) -> Result<(), DocJoinError> {
        match self.scope.take() {
            Some(Scope::Fresh(dir)) => dir
                .close()
                .map_err(|e| DocJoinError::staging(&self.path, e))?,
            Some(Scope::Adopted) => remove_adopted(&self.path)?,
            None => {}
        }
        tracing::debug!(path = %self.path.display(), "staging area destroyed");
        Ok(())
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        // A fresh area is removed by its `TempDir`.
        if let Some(Scope::Adopted) = self.scope.take() {
            if let Err(e) = remove_adopted(&self.path) {
                tracing::warn!(path = %self.path.display(), error = %e, "staging cleanup failed");
            }
        }
    }
}

fn mark(path: &Path) -> Result<(), DocJoinError> {
    let marker = path.join(MARKER_FILE);
    fs::write(&marker, b"").map_err(|e| DocJoinError::staging(&marker, e))
}

fn remove_adopted(path: &Path) -> Result<(), DocJoinError> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(DocJoinError::staging(path, e)),
        _ => Ok(()),
    }
}

fn checked_file_name<'a>(area: &Path, name: &'a str) -> Result<&'a str, DocJoinError> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && name != MARKER_FILE
        && !name.contains(['/', '\\', '\0']);
    if plain {
        Ok(name)
    } else {
        Err(DocJoinError::staging(
            area.join(name),
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("'{}' is not a plain file name", name),
            ),
        ))
    }
}

/// A name usable with [`StagingArea::materialize`], derived from an upload
/// name that may contain path separators.
pub fn safe_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_control() { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." | MARKER_FILE => "document".to_string(),
        _ => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_in_makes_unique_scope() {
        let root = tempfile::tempdir().unwrap();
        let a = StagingArea::create_in(root.path()).unwrap();
        let b = StagingArea::create_in(root.path()).unwrap();

        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(root.path()));
        let dir_name = a.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(dir_name.starts_with(STAGING_PREFIX));
    }

    #[test]
    fn test_materialize_read_destroy() {
        let root = tempfile::tempdir().unwrap();
        let staging = StagingArea::create_in(root.path()).unwrap();
        let path = staging.materialize("merged.pdf", b"%PDF").unwrap();

        assert_eq!(staging.read(&path).unwrap(), b"%PDF");
        assert_eq!(staging.read("merged.pdf").unwrap(), b"%PDF");

        let scope = staging.path().to_path_buf();
        staging.destroy().unwrap();
        assert!(!scope.exists());
        assert!(root.path().exists());
    }

    #[test]
    fn test_materialize_rejects_paths() {
        let root = tempfile::tempdir().unwrap();
        let staging = StagingArea::create_in(root.path()).unwrap();
        for name in ["", "..", "../escape.pdf", "sub/dir.pdf", MARKER_FILE] {
            assert!(
                matches!(
                    staging.materialize(name, b"x"),
                    Err(DocJoinError::StagingIo { .. })
                ),
                "{name:?} should be refused"
            );
        }
        assert!(!root.path().join("escape.pdf").exists());
    }

    #[test]
    fn test_read_refuses_outside_paths() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("secret.txt"), b"no").unwrap();
        let staging = StagingArea::create_in(root.path()).unwrap();

        assert!(staging.read(root.path().join("secret.txt")).is_err());
        assert!(staging.read("../secret.txt").is_err());
    }

    #[test]
    fn test_create_at_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("scope");

        let first = StagingArea::create_at(&path).unwrap();
        first.materialize("a.pdf", b"a").unwrap();
        let second = StagingArea::create_at(&path).unwrap();

        second.destroy().unwrap();
        assert!(!path.exists());
        first.destroy().unwrap();
    }

    #[test]
    fn test_create_at_adopts_empty_directory() {
        let root = tempfile::tempdir().unwrap();
        let staging = StagingArea::create_at(root.path()).unwrap();
        staging.destroy().unwrap();
        assert!(!root.path().exists());
    }

    #[test]
    fn test_create_at_refuses_foreign_directory() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("keep.txt"), b"mine").unwrap();

        assert!(matches!(
            StagingArea::create_at(root.path()),
            Err(DocJoinError::StagingIo { .. })
        ));
        assert!(root.path().join("keep.txt").exists());
    }

    #[test]
    fn test_drop_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let scope = {
            let staging = StagingArea::create_in(root.path()).unwrap();
            staging.materialize("x.pptx", b"x").unwrap();
            let scratch = staging.scratch_dir("convert").unwrap();
            std::fs::write(scratch.path().join("out.pptx"), b"y").unwrap();
            std::mem::forget(scratch);
            staging.path().to_path_buf()
        };
        assert!(!scope.exists());
    }

    #[test]
    fn test_scratch_dir_is_removed_with_its_handle() {
        let root = tempfile::tempdir().unwrap();
        let staging = StagingArea::create_in(root.path()).unwrap();
        let scratch = staging.scratch_dir("convert").unwrap();
        let scratch_path = scratch.path().to_path_buf();

        assert!(scratch_path.starts_with(staging.path()));
        assert!(scratch_path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("convert-"));
        drop(scratch);
        assert!(!scratch_path.exists());
        assert!(staging.scratch_dir("../out").is_err());
    }

    #[test]
    fn test_adopted_area_cleans_up_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("adopted");
        {
            let staging = StagingArea::create_at(&path).unwrap();
            staging.materialize("a.pdf", b"a").unwrap();
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_early_return_cleans_up() {
        fn failing_request(root: &Path, scope: &mut Option<PathBuf>) -> Result<(), DocJoinError> {
            let staging = StagingArea::create_in(root)?;
            *scope = Some(staging.path().to_path_buf());
            staging.materialize("partial.pdf", b"partial")?;
            Err(DocJoinError::OperationError("composition failed".into()))
        }

        let root = tempfile::tempdir().unwrap();
        let mut scope = None;
        assert!(failing_request(root.path(), &mut scope).is_err());
        assert!(!scope.unwrap().exists());
    }

    #[test]
    fn test_panic_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let scope = std::sync::Mutex::new(None);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let staging = StagingArea::create_in(root.path()).unwrap();
            *scope.lock().unwrap() = Some(staging.path().to_path_buf());
            panic!("aborted mid-request");
        }));

        assert!(result.is_err());
        let scope = scope.into_inner().unwrap().unwrap();
        assert!(!scope.exists());
    }

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("slides/deck.ppt"), "deck.ppt");
        assert_eq!(safe_file_name("C:\\tmp\\deck.ppt"), "deck.ppt");
        assert_eq!(safe_file_name(".."), "document");
        assert_eq!(safe_file_name("a\u{7}b.ppt"), "a_b.ppt");
    }
}
