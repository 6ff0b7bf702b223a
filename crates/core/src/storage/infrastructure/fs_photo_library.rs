use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::shared::constants::{
    CATEGORIZED_DIR, IMAGE_EXTENSIONS, REGISTERED_DIR, SAMPLE_EXTENSION, SAMPLE_PREFIX,
};
use crate::shared::names::{Label, PersonName};
use crate::storage::domain::photo_library::{CategorizedFolder, LibraryError, PhotoLibrary};

/// Photo library rooted at a directory:
///
/// ```text
/// <root>/registered/<person>/sample_<k>.jpg
/// <root>/categorized/<label>/<file name>
/// ```
///
/// Writes go through a single process-wide lock and land via a hidden
/// `.part` file that is renamed into place, so readers never observe a
/// half-copied photo.
pub struct FsPhotoLibrary {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FsPhotoLibrary {
    /// Opens the library at `root`, creating its layout if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, LibraryError> {
        let library = Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        };
        library.ensure_layout()?;
        Ok(library)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registered_dir(&self) -> PathBuf {
        self.root.join(REGISTERED_DIR)
    }

    pub fn categorized_dir(&self) -> PathBuf {
        self.root.join(CATEGORIZED_DIR)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl PhotoLibrary for FsPhotoLibrary {
    fn ensure_layout(&self) -> Result<(), LibraryError> {
        let _guard = self.lock();
        create_dir(&self.registered_dir())?;
        create_dir(&self.categorized_dir())
    }

    fn store_sample(
        &self,
        person: &PersonName,
        index: usize,
        source: &Path,
    ) -> Result<PathBuf, LibraryError> {
        let _guard = self.lock();
        let dir = self.registered_dir().join(person.as_str());
        create_dir(&dir)?;
        let file_name = format!("{SAMPLE_PREFIX}{index}.{SAMPLE_EXTENSION}");
        copy_into(source, &dir, &file_name)
    }

    fn file_photo(
        &self,
        label: &Label,
        source: &Path,
        file_name: &str,
    ) -> Result<PathBuf, LibraryError> {
        let _guard = self.lock();
        let dir = self.categorized_dir().join(label.folder_name());
        create_dir(&dir)?;
        let dest = copy_into(source, &dir, file_name)?;
        log::info!("Filed {} under '{label}'", dest.display());
        Ok(dest)
    }

    fn is_registered(&self, person: &PersonName) -> Result<bool, LibraryError> {
        Ok(self.registered_dir().join(person.as_str()).is_dir())
    }

    fn registered_persons(&self) -> Result<Vec<String>, LibraryError> {
        Ok(list_dir(&self.registered_dir())?
            .into_iter()
            .filter(|p| p.is_dir())
            .filter_map(|p| file_name_of(&p))
            .collect())
    }

    fn categorized_persons(&self) -> Result<Vec<CategorizedFolder>, LibraryError> {
        let mut folders = Vec::new();
        for dir in list_dir(&self.categorized_dir())?
            .into_iter()
            .filter(|p| p.is_dir())
        {
            let Some(name) = file_name_of(&dir) else {
                continue;
            };
            let photo_paths = list_dir(&dir)?
                .into_iter()
                .filter(|p| p.is_file() && is_image(p))
                .collect();
            folders.push(CategorizedFolder { name, photo_paths });
        }
        Ok(folders)
    }
}

fn create_dir(dir: &Path) -> Result<(), LibraryError> {
    fs::create_dir_all(dir).map_err(|e| LibraryError::Io {
        action: "create",
        path: dir.to_path_buf(),
        source: e,
    })
}

/// Copies `source` to `dir/file_name` via a sibling temp file.
fn copy_into(source: &Path, dir: &Path, file_name: &str) -> Result<PathBuf, LibraryError> {
    let dest = dir.join(file_name);
    let temp = dir.join(format!(".{file_name}.part"));

    if let Err(e) = fs::copy(source, &temp) {
        let _ = fs::remove_file(&temp);
        return Err(LibraryError::Copy {
            from: source.to_path_buf(),
            to: dest,
            source: e,
        });
    }
    if let Err(e) = fs::rename(&temp, &dest) {
        let _ = fs::remove_file(&temp);
        return Err(LibraryError::Io {
            action: "replace",
            path: dest,
            source: e,
        });
    }
    Ok(dest)
}

/// Sorted entries of `dir`; a missing directory lists as empty.
fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, LibraryError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(LibraryError::Io {
                action: "list",
                path: dir.to_path_buf(),
                source: e,
            })
        }
    };
    let mut paths = entries
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| LibraryError::Io {
            action: "list",
            path: dir.to_path_buf(),
            source: e,
        })?;
    paths.sort();
    Ok(paths)
}

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
