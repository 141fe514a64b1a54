use std::sync::atomic::{AtomicBool, Ordering};

use ndarray::ArrayView2;

use crate::search::domain::identity_resolver::{self, Resolution};
use crate::search::domain::similarity_index::{SearchResult, SimilarityIndex};
use crate::shared::embedding::Embedding;
use crate::shared::error::RecognitionError;

use super::identity::{GalleryDocument, Identity};
use super::snapshot_store::{SnapshotError, SnapshotStore};

/// Ordered in-memory gallery plus the similarity index built from it.
///
/// Every mutation rebuilds the index before returning, so a reader holding
/// `&GalleryStore` always sees an index consistent with `list()`. Callers
/// share the store behind a reader/writer lock to get the concurrency
/// guarantees: the write guard spans mutate-and-rebuild as one unit.
///
/// The store remembers whether it changed since it was last restored or
/// persisted, so callers can skip writing a gallery that only mirrors the
/// snapshot (or that failed to load from it).
pub struct GalleryStore {
    identities: Vec<Identity>,
    index: Box<dyn SimilarityIndex>,
    snapshot: Box<dyn SnapshotStore>,
    dim: usize,
    dirty: AtomicBool,
}

impl GalleryStore {
    pub fn new(
        index: Box<dyn SimilarityIndex>,
        snapshot: Box<dyn SnapshotStore>,
        dim: usize,
    ) -> Self {
        Self {
            identities: Vec::new(),
            index,
            snapshot,
            dim,
            dirty: AtomicBool::new(false),
        }
    }

    /// Replaces the whole gallery, e.g. after a remote sync.
    pub fn replace_all(&mut self, identities: Vec<Identity>) -> Result<(), RecognitionError> {
        for p in &identities {
            self.check_dim(&p.embedding)?;
        }
        self.identities = identities;
        self.index.rebuild(&self.identities);
        *self.dirty.get_mut() = true;
        Ok(())
    }

    /// Removes any identity with the same name, then appends.
    pub fn upsert(&mut self, identity: Identity) -> Result<(), RecognitionError> {
        self.check_dim(&identity.embedding)?;
        self.identities.retain(|p| p.name != identity.name);
        self.identities.push(identity);
        self.index.rebuild(&self.identities);
        *self.dirty.get_mut() = true;
        Ok(())
    }

    pub fn list(&self) -> &[Identity] {
        &self.identities
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Identity> {
        self.identities.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    pub fn index_backend(&self) -> &'static str {
        self.index.backend()
    }

    pub fn search(
        &self,
        queries: ArrayView2<'_, f32>,
        k: usize,
    ) -> Result<SearchResult, RecognitionError> {
        self.index.search(queries, k)
    }

    pub fn resolve(
        &self,
        embeddings: &[Embedding],
        threshold: f32,
    ) -> Result<Vec<Resolution>, RecognitionError> {
        identity_resolver::resolve(self.index.as_ref(), &self.identities, embeddings, threshold)
    }

    /// `true` when the gallery changed since the last restore or persist.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub fn to_document(&self) -> GalleryDocument {
        GalleryDocument::from_identities(&self.identities)
    }

    /// Best-effort write of the current gallery. Failures are logged only:
    /// the in-memory gallery stays authoritative for the running process.
    pub fn persist(&self) -> bool {
        match self.snapshot.save(&self.to_document()) {
            Ok(()) => {
                self.dirty.store(false, Ordering::SeqCst);
                log::debug!(
                    "Persisted {} identities to {}",
                    self.identities.len(),
                    self.snapshot.location()
                );
                true
            }
            Err(e) => {
                log::warn!("Failed to persist gallery: {e}");
                false
            }
        }
    }

    /// Replaces the gallery with the durable snapshot.
    ///
    /// Returns `Ok(None)` and leaves the gallery untouched when no snapshot
    /// exists.
    pub fn restore(&mut self) -> Result<Option<usize>, SnapshotError> {
        let Some(document) = self.snapshot.load()? else {
            return Ok(None);
        };
        let identities = document
            .into_identities(self.dim)
            .map_err(SnapshotError::Invalid)?;
        self.replace_all(identities)
            .map_err(|e| SnapshotError::Invalid(e.to_string()))?;
        *self.dirty.get_mut() = false;
        log::info!(
            "Loaded {} identities from {}",
            self.identities.len(),
            self.snapshot.location()
        );
        Ok(Some(self.identities.len()))
    }

    fn check_dim(&self, embedding: &Embedding) -> Result<(), RecognitionError> {
        if embedding.dim() != self.dim {
            return Err(RecognitionError::DimensionMismatch {
                expected: self.dim,
                found: embedding.dim(),
            });
        }
        Ok(())
    }
}
