use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::gallery::domain::gallery_source::{GallerySource, RemoteSyncError};
use crate::gallery::domain::identity::GalleryDocument;

/// Decorator that serves the last successful remote response for `ttl`.
///
/// Failed fetches are never cached. `invalidate` forces the next fetch to
/// reach the inner source.
pub struct CachedGallerySource {
    inner: Box<dyn GallerySource>,
    ttl: Duration,
    cached: Mutex<Option<(Instant, GalleryDocument)>>,
}

impl CachedGallerySource {
    pub fn new(inner: Box<dyn GallerySource>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cached: Mutex::new(None),
        }
    }

    fn fetch_at(&self, now: Instant) -> Result<GalleryDocument, RemoteSyncError> {
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((at, document)) = cached.as_ref() {
            if now.saturating_duration_since(*at) < self.ttl {
                log::debug!("Gallery source cache hit ({})", self.inner.describe());
                return Ok(document.clone());
            }
        }
        let document = self.inner.fetch()?;
        *cached = Some((now, document.clone()));
        Ok(document)
    }
}

impl GallerySource for CachedGallerySource {
    fn fetch(&self) -> Result<GalleryDocument, RemoteSyncError> {
        self.fetch_at(Instant::now())
    }

    fn invalidate(&self) {
        *self.cached.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.inner.invalidate();
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}
