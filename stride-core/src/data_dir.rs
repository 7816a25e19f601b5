use std::ops::Deref;
use std::path::{Path, PathBuf};

/// Typed wrapper for the local storage root.
///
/// Object keys join directly under this root, so the on-disk layout matches
/// the bucket layout and objects can move between backends without renaming.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataDir {
    path: PathBuf,
}

impl DataDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// On-disk path for a validated object key or namespace prefix.
    pub fn object_path(&self, key: &str) -> PathBuf {
        self.path.join(key)
    }

    /// Directory holding per-user namespaces.
    pub fn users_dir(&self) -> PathBuf {
        self.path.join("users")
    }
}

impl Deref for DataDir {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.path
    }
}

impl AsRef<Path> for DataDir {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl From<PathBuf> for DataDir {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for DataDir {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}
