use thiserror::Error;

use super::identity::GalleryDocument;

#[derive(Error, Debug)]
pub enum RemoteSyncError {
    #[error("remote gallery source is not configured")]
    NotConfigured,
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} returned unusable data: {reason}")]
    Invalid { url: String, reason: String },
}

/// Remote collaborator that supplies the full gallery (centroid embeddings
/// computed and stored elsewhere).
pub trait GallerySource: Send + Sync {
    fn fetch(&self) -> Result<GalleryDocument, RemoteSyncError>;

    /// Drops any cached response so the next fetch goes to the remote.
    fn invalidate(&self) {}

    /// Where the gallery comes from, for status reporting.
    fn describe(&self) -> String;
}
