use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::shared::names::{Label, PersonName};

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One label folder of the categorized tree, as shown in a gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedFolder {
    pub name: String,
    pub photo_paths: Vec<PathBuf>,
}

/// On-disk home of registered samples and categorized photos.
///
/// Shared between sessions, so implementations take `&self` and serialize
/// their own writes.
pub trait PhotoLibrary: Send + Sync {
    /// Creates the top-level trees if missing. Idempotent.
    fn ensure_layout(&self) -> Result<(), LibraryError>;

    /// Stores `source` as the `index`-th (1-based) sample of `person`,
    /// replacing any sample already at that index.
    fn store_sample(
        &self,
        person: &PersonName,
        index: usize,
        source: &Path,
    ) -> Result<PathBuf, LibraryError>;

    /// Copies `source` into the folder for `label` as `file_name`,
    /// replacing an existing file of that name.
    fn file_photo(
        &self,
        label: &Label,
        source: &Path,
        file_name: &str,
    ) -> Result<PathBuf, LibraryError>;

    fn is_registered(&self, person: &PersonName) -> Result<bool, LibraryError>;

    /// Registered person names, sorted.
    fn registered_persons(&self) -> Result<Vec<String>, LibraryError>;

    /// Label folders with their photos, both sorted by name.
    fn categorized_persons(&self) -> Result<Vec<CategorizedFolder>, LibraryError>;
}
