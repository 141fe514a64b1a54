use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::gallery::domain::identity::GalleryDocument;
use crate::gallery::domain::snapshot_store::{SnapshotError, SnapshotStore};

/// Gallery snapshot as a single `{ "people": [...] }` JSON file.
///
/// Writes go to a `.part` sibling first and are renamed into place, so a
/// crash mid-write never leaves a truncated snapshot behind.
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> SnapshotError {
        SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn load(&self) -> Result<Option<GalleryDocument>, SnapshotError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path).map_err(|e| self.io_error(&self.path, e))?;
        let document = serde_json::from_str(&json).map_err(|source| SnapshotError::Parse {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(document))
    }

    fn save(&self, document: &GalleryDocument) -> Result<(), SnapshotError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(parent, e))?;
        }
        let json = serde_json::to_vec_pretty(document).map_err(|source| SnapshotError::Parse {
            path: self.path.clone(),
            source,
        })?;

        let temp_path = self.path.with_extension("part");
        let result = write_then_rename(&temp_path, &self.path, &json);
        if let Err((path, e)) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(self.io_error(&path, e));
        }
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

fn write_then_rename(
    temp_path: &Path,
    dest: &Path,
    bytes: &[u8],
) -> Result<(), (PathBuf, std::io::Error)> {
    let mut file = fs::File::create(temp_path).map_err(|e| (temp_path.to_path_buf(), e))?;
    file.write_all(bytes)
        .and_then(|_| file.flush())
        .map_err(|e| (temp_path.to_path_buf(), e))?;
    drop(file);
    fs::rename(temp_path, dest).map_err(|e| (dest.to_path_buf(), e))
}
