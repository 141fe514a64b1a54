use std::path::PathBuf;

use thiserror::Error;

use super::identity::GalleryDocument;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot at {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("snapshot rejected: {0}")]
    Invalid(String),
}

/// Durable storage for the gallery, used at startup and as the fallback
/// when a remote sync fails.
pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` when no snapshot has been written yet.
    fn load(&self) -> Result<Option<GalleryDocument>, SnapshotError>;

    fn save(&self, document: &GalleryDocument) -> Result<(), SnapshotError>;

    /// Human-readable location for logs.
    fn location(&self) -> String;
}
