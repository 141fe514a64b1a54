use crate::gallery::domain::identity::GalleryDocument;
use crate::pipeline::engine::Engine;

/// Snapshot-shaped dump of the in-memory gallery.
pub struct ExportGalleryUseCase<'a> {
    engine: &'a Engine,
}

impl<'a> ExportGalleryUseCase<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    pub fn execute(&self) -> GalleryDocument {
        self.engine.gallery().to_document()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::domain::gallery_store::tests::MemorySnapshotStore;
    use crate::pipeline::engine::tests::{engine_with, enroll};

    #[test]
    fn test_exports_current_gallery_in_order() {
        let engine = engine_with(None, MemorySnapshotStore::default(), None);
        enroll(&engine, "Alice", [1.0, 0.0]);
        enroll(&engine, "Bob", [0.0, 2.0]);

        let document = ExportGalleryUseCase::new(&engine).execute();

        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(json["people"][0]["name"], "Alice");
        assert_eq!(json["people"][1]["id"], "Bob_0");
        assert_eq!(json["people"][1]["embedding"][1], 1.0);
    }

    #[test]
    fn test_empty_gallery_exports_empty_list() {
        let engine = engine_with(None, MemorySnapshotStore::default(), None);
        let json = serde_json::to_string(&ExportGalleryUseCase::new(&engine).execute()).unwrap();
        assert_eq!(json, r#"{"people":[]}"#);
    }
}
