use crate::gallery::domain::gallery_source::RemoteSyncError;
use crate::pipeline::engine::Engine;
use crate::pipeline::responses::{SyncResponse, SyncSource};

/// Replaces the gallery with the remote export; on any remote failure the
/// gallery is reloaded from the local snapshot instead.
pub struct SyncGalleryUseCase<'a> {
    engine: &'a Engine,
}

impl<'a> SyncGalleryUseCase<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    pub fn execute(&self) -> SyncResponse {
        match self.pull_remote() {
            Ok(count) => {
                log::info!("Synced {count} identities from backend");
                SyncResponse {
                    ok: true,
                    count,
                    source: SyncSource::Backend,
                }
            }
            Err(e) => {
                log::warn!("Gallery sync failed, using local snapshot: {e}");
                SyncResponse {
                    ok: false,
                    count: self.restore_local(),
                    source: SyncSource::LocalFallback,
                }
            }
        }
    }

    fn pull_remote(&self) -> Result<usize, RemoteSyncError> {
        let source = self.engine.source().ok_or(RemoteSyncError::NotConfigured)?;
        // An explicit sync always reaches the remote.
        source.invalidate();
        let document = source.fetch()?;

        let invalid = |reason: String| RemoteSyncError::Invalid {
            url: source.describe(),
            reason,
        };
        let mut gallery = self.engine.gallery_mut();
        let identities = document.into_identities(gallery.dim()).map_err(invalid)?;
        gallery
            .replace_all(identities)
            .map_err(|e| invalid(e.to_string()))?;
        gallery.persist();
        Ok(gallery.len())
    }

    /// Reloads the snapshot if there is one; the current gallery is kept
    /// when there is none or it can't be read.
    fn restore_local(&self) -> usize {
        let mut gallery = self.engine.gallery_mut();
        if let Err(e) = gallery.restore() {
            log::warn!("Failed to load local gallery snapshot: {e}");
        }
        gallery.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::domain::gallery_store::tests::MemorySnapshotStore;
    use crate::gallery::domain::identity::{GalleryDocument, Identity, IdentityRecord};
    use crate::pipeline::engine::tests::{engine_with, enroll, StubSource};
    use approx::assert_relative_eq;

    fn remote(people: Vec<IdentityRecord>) -> Option<StubSource> {
        Some(StubSource {
            result: Ok(GalleryDocument { people }),
        })
    }

    fn record(name: Option<&str>, embedding: Vec<f32>) -> IdentityRecord {
        IdentityRecord {
            name: name.map(str::to_string),
            embedding,
            ..Default::default()
        }
    }

    #[test]
    fn test_remote_success_replaces_gallery_and_persists() {
        let snapshot = MemorySnapshotStore::default();
        let engine = engine_with(
            None,
            snapshot.clone(),
            remote(vec![record(Some("Alice"), vec![3.0, 4.0])]),
        );
        enroll(&engine, "Stale", [1.0, 0.0]);

        let response = SyncGalleryUseCase::new(&engine).execute();

        assert_eq!(
            response,
            SyncResponse {
                ok: true,
                count: 1,
                source: SyncSource::Backend
            }
        );
        let gallery = engine.gallery();
        assert_eq!(gallery.list()[0].name, "Alice");
        assert_relative_eq!(gallery.list()[0].embedding.norm(), 1.0, epsilon = 1e-5);
        assert_eq!(gallery.index_len(), 1);
        assert!(snapshot.saved.lock().unwrap().is_some());
    }

    #[test]
    fn test_remote_records_get_default_ids_and_names() {
        let engine = engine_with(
            None,
            MemorySnapshotStore::default(),
            remote(vec![
                record(Some("Alice"), vec![1.0, 0.0]),
                record(None, vec![0.0, 1.0]),
            ]),
        );
        SyncGalleryUseCase::new(&engine).execute();

        let gallery = engine.gallery();
        assert_eq!(gallery.list()[1].id, "p_1");
        assert_eq!(gallery.list()[1].name, "person_1");
        assert_eq!(gallery.list()[1].relationship, "");
    }

    #[test]
    fn test_remote_failure_falls_back_to_snapshot() {
        let snapshot = MemorySnapshotStore::default();
        *snapshot.saved.lock().unwrap() = Some(GalleryDocument::from_identities(&[
            Identity::new("p_0", "Alice", "", vec![1.0, 0.0]),
            Identity::new("p_1", "Bob", "", vec![0.0, 1.0]),
        ]));
        let engine = engine_with(None, snapshot, Some(StubSource { result: Err(()) }));

        let response = SyncGalleryUseCase::new(&engine).execute();

        assert!(!response.ok);
        assert_eq!(response.source, SyncSource::LocalFallback);
        assert_eq!(response.count, 2);
        assert_eq!(engine.gallery().index_len(), 2);
    }

    #[test]
    fn test_wrong_dimension_export_is_rejected_and_gallery_kept() {
        let engine = engine_with(
            None,
            MemorySnapshotStore::default(),
            remote(vec![record(Some("Alice"), vec![1.0, 0.0, 0.0])]),
        );
        enroll(&engine, "Bob", [0.0, 1.0]);

        let response = SyncGalleryUseCase::new(&engine).execute();

        assert_eq!(response.source, SyncSource::LocalFallback);
        assert_eq!(response.count, 1);
        assert_eq!(engine.gallery().list()[0].name, "Bob");
    }

    #[test]
    fn test_no_remote_configured_uses_snapshot() {
        let engine = engine_with(None, MemorySnapshotStore::default(), None);
        let response = SyncGalleryUseCase::new(&engine).execute();
        assert_eq!(response.source, SyncSource::LocalFallback);
        assert_eq!(response.count, 0);
    }
}
