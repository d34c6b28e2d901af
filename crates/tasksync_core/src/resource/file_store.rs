//! File store rooted at one directory.
//!
//! # Invariants
//! - References resolve inside `root`; absolute paths outside it and `..`
//!   components are rejected.
//! - Deleting a missing file succeeds.

use super::{FileStore, ResourceError, ResourceResult};
use log::debug;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

const FILE_SCHEME: &str = "file://";

/// Deletes attachment and comment media under a root directory.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a stored reference (`file://...` URI or relative path) to a path.
    pub fn resolve(&self, reference: &str) -> Result<PathBuf, ResourceError> {
        let raw = reference.strip_prefix(FILE_SCHEME).unwrap_or(reference);
        let path = Path::new(raw);
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.root).map_err(|_| {
                ResourceError::new("file", reference, "path is outside the file store root")
            })?
        } else {
            path
        };

        if relative.as_os_str().is_empty()
            || relative
                .components()
                .any(|component| !matches!(component, Component::Normal(_)))
        {
            return Err(ResourceError::new(
                "file",
                reference,
                "reference must name a file inside the store",
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl FileStore for LocalFileStore {
    fn delete(&self, reference: &str) -> ResourceResult {
        let path = self.resolve(reference)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("event=file_delete module=resource status=missing");
                Ok(())
            }
            Err(err) => Err(ResourceError::new("file", reference, err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LocalFileStore;
    use crate::resource::FileStore;

    #[test]
    fn deletes_file_and_treats_missing_as_released() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        std::fs::write(dir.path().join("photo.jpg"), b"jpeg").unwrap();

        store.delete("photo.jpg").unwrap();
        assert!(!dir.path().join("photo.jpg").exists());
        store.delete("photo.jpg").unwrap();
    }

    #[test]
    fn accepts_file_uri_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, b"x").unwrap();

        store
            .delete(&format!("file://{}", file.display()))
            .unwrap();
        assert!(!file.exists());
    }

    #[test]
    fn rejects_references_escaping_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().join("files"));
        assert!(store.delete("../secret").is_err());
        assert!(store.delete("/etc/passwd").is_err());
        assert!(store.delete("").is_err());
    }
}
