use crate::enrollment::centroid::{centroid, select_samples, SamplePolicy};
use crate::gallery::domain::gallery_store::GalleryStore;
use crate::gallery::domain::identity::Identity;
use crate::pipeline::engine::Engine;
use crate::pipeline::responses::EnrollResponse;
use crate::shared::embedding::Embedding;
use crate::shared::error::RecognitionError;
use crate::shared::frame::Frame;

pub struct EnrollRequest<'a> {
    pub name: &'a str,
    pub relationship: &'a str,
    /// Encoded images, one face sample each.
    pub images: &'a [Vec<u8>],
    pub policy: SamplePolicy,
}

/// Builds a centroid from several photos of one person and upserts it.
///
/// Samples are embedded without holding the gallery lock; the write lock is
/// taken only for the upsert. Re-enrolling a name replaces its embedding
/// and keeps its id.
pub struct EnrollUseCase<'a> {
    engine: &'a Engine,
}

impl<'a> EnrollUseCase<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    pub fn execute(&self, request: &EnrollRequest<'_>) -> EnrollResponse {
        match self.run(request) {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Enrollment of {:?} failed: {e}", request.name);
                EnrollResponse::failed(&e, self.engine.gallery().len())
            }
        }
    }

    fn run(&self, request: &EnrollRequest<'_>) -> Result<EnrollResponse, RecognitionError> {
        self.engine.analyzer()?;
        let name = request.name.trim();
        if name.is_empty() {
            return Err(RecognitionError::InvalidRequest("name must not be empty".into()));
        }

        let outcomes = request
            .images
            .iter()
            .map(|image| self.sample_embedding(image))
            .collect::<Result<Vec<_>, _>>()?;
        let samples = select_samples(outcomes, request.policy)?;
        let embedding = centroid(&samples)?;

        let mut gallery = self.engine.gallery_mut();
        let id = identity_id(&gallery, name);
        gallery.upsert(Identity::new(
            id.clone(),
            name,
            request.relationship.trim(),
            embedding,
        ))?;
        gallery.persist();
        log::info!(
            "Enrolled {name} as {id} from {} samples ({} identities)",
            samples.len(),
            gallery.len()
        );

        Ok(EnrollResponse {
            ok: true,
            id: Some(id),
            name: Some(name.to_string()),
            samples: samples.len(),
            people: gallery.len(),
            reason: None,
        })
    }

    /// `None` when the image decodes but contains no face.
    fn sample_embedding(&self, image: &[u8]) -> Result<Option<Embedding>, RecognitionError> {
        let frame = Frame::decode(image)?;
        Ok(self
            .engine
            .analyze(&frame)?
            .into_iter()
            .next()
            .map(|face| face.embedding))
    }
}

/// Existing id for `name`, otherwise `<slug>_<n>` with the first free `n`
/// starting at the gallery size.
fn identity_id(gallery: &GalleryStore, name: &str) -> String {
    if let Some(existing) = gallery.find_by_name(name) {
        return existing.id.clone();
    }
    let slug = slugify(name);
    let mut n = gallery.len();
    loop {
        let id = format!("{slug}_{n}");
        if gallery.list().iter().all(|p| p.id != id) {
            return id;
        }
        n += 1;
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "person".to_string()
    } else {
        slug.to_string()
    }
}
