use std::{
    io::Write,
    path::{Component, Path, PathBuf},
};

use colorize_io::ImageFormat;
use uuid::Uuid;

use crate::error::StorageError;

const MAX_OWNER_CHARS: usize = 64;

/// Owner-scoped file storage under a root directory.
///
/// Files live at `<owner>/<uuid>.<ext>` for sources and `<owner>/<uuid>_colorized.<ext>` for
/// results; the paths handed out are relative to the root. Names are generated, never taken
/// from the client, and a file is never overwritten.
#[derive(Clone, Debug)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check that an owner id can be used as a directory name.
    pub fn validate_owner(owner: &str) -> Result<(), StorageError> {
        let valid = !owner.is_empty()
            && owner.len() <= MAX_OWNER_CHARS
            && owner
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(())
        } else {
            Err(StorageError::InvalidOwner(owner.to_string()))
        }
    }

    /// Relative path of a stored source image.
    pub fn source_path(owner: &str, id: Uuid, format: ImageFormat) -> String {
        format!("{owner}/{id}.{}", format.extension())
    }

    /// Relative path of a colorization result.
    pub fn result_path(owner: &str, id: Uuid, format: ImageFormat) -> String {
        format!("{owner}/{id}_colorized.{}", format.extension())
    }

    /// Resolve a relative path against the root, refusing anything that escapes it.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let path = Path::new(relative);
        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if relative.is_empty() || escapes {
            return Err(StorageError::OutsideRoot(relative.to_string()));
        }
        Ok(self.root.join(path))
    }

    /// Write `bytes` to `relative` atomically.
    ///
    /// The content goes to a temporary file in the destination directory which is then
    /// renamed; an existing file at the destination is an error.
    pub fn write(&self, relative: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.resolve(relative)?;
        let dir = path
            .parent()
            .ok_or_else(|| StorageError::OutsideRoot(relative.to_string()))?;
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".partial-")
            .tempfile_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist_noclobber(&path)?;

        log::debug!("stored {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    /// Read a stored file.
    pub fn read(&self, relative: &str) -> Result<Vec<u8>, StorageError> {
        Ok(std::fs::read(self.resolve(relative)?)?)
    }

    /// Remove a stored file; a missing file is not an error.
    pub fn remove(&self, relative: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.resolve(relative)?) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Remove a file, logging instead of failing.
    pub fn remove_logged(&self, relative: &str) {
        if let Err(e) = self.remove(relative) {
            log::warn!("failed to remove {relative}: {e}");
        }
    }
}
