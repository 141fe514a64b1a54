use serde::{Deserialize, Serialize};

use crate::shared::embedding::Embedding;

/// An enrolled person: stable id, display name, relationship tag and the
/// unit-norm centroid embedding used for matching.
#[derive(Clone, Debug, PartialEq)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub relationship: String,
    pub embedding: Embedding,
}

impl Identity {
    /// The embedding is renormalized regardless of where it came from.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        relationship: impl Into<String>,
        embedding: impl Into<Embedding>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            relationship: relationship.into(),
            embedding: embedding.into(),
        }
    }
}

/// Wire/snapshot form of an identity. Every field except the embedding is
/// optional on ingestion.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub relationship: String,
    pub embedding: Vec<f32>,
}

/// `{ "people": [ ... ] }`: the persisted snapshot and remote export shape.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GalleryDocument {
    #[serde(default)]
    pub people: Vec<IdentityRecord>,
}

impl GalleryDocument {
    pub fn from_identities(identities: &[Identity]) -> Self {
        Self {
            people: identities
                .iter()
                .map(|p| IdentityRecord {
                    id: Some(p.id.clone()),
                    name: Some(p.name.clone()),
                    relationship: p.relationship.clone(),
                    embedding: p.embedding.as_slice().to_vec(),
                })
                .collect(),
        }
    }

    /// Converts records to identities, filling missing ids/names from the
    /// record position.
    ///
    /// A record with a wrong-length or non-finite embedding is skipped with a
    /// warning. The document is rejected only when it has records and none
    /// of them is usable.
    pub fn into_identities(self, dim: usize) -> Result<Vec<Identity>, String> {
        let total = self.people.len();
        let mut identities = Vec::with_capacity(total);
        for (i, record) in self.people.into_iter().enumerate() {
            if let Err(reason) = check_embedding(&record.embedding, dim) {
                log::warn!("Skipping gallery record {i}: {reason}");
                continue;
            }
            identities.push(Identity::new(
                record.id.unwrap_or_else(|| format!("p_{i}")),
                record.name.unwrap_or_else(|| format!("person_{i}")),
                record.relationship,
                record.embedding,
            ));
        }
        if total > 0 && identities.is_empty() {
            return Err(format!("none of the {total} records has a usable embedding"));
        }
        Ok(identities)
    }
}

fn check_embedding(embedding: &[f32], dim: usize) -> Result<(), String> {
    if embedding.len() != dim {
        return Err(format!(
            "embedding of length {}, expected {dim}",
            embedding.len()
        ));
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err("non-finite embedding value".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_renormalizes_embedding() {
        let p = Identity::new("p_0", "Alice", "friend", vec![0.0, 3.0, 4.0]);
        assert_relative_eq!(p.embedding.norm(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_into_identities_fills_defaults() {
        let doc: GalleryDocument =
            serde_json::from_str(r#"{"people":[{"embedding":[1.0,0.0]}]}"#).unwrap();
        let people = doc.into_identities(2).unwrap();
        assert_eq!(people[0].id, "p_0");
        assert_eq!(people[0].name, "person_0");
        assert_eq!(people[0].relationship, "");
    }

    #[test]
    fn test_into_identities_renormalizes_slightly_off_vectors() {
        let doc: GalleryDocument = serde_json::from_str(
            r#"{"people":[{"id":"a","name":"Alice","embedding":[0.0,1.02]}]}"#,
        )
        .unwrap();
        let people = doc.into_identities(2).unwrap();
        assert_relative_eq!(people[0].embedding.norm(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_into_identities_rejects_wrong_dimension() {
        let doc: GalleryDocument =
            serde_json::from_str(r#"{"people":[{"name":"Bob","embedding":[1.0,0.0,0.0]}]}"#)
                .unwrap();
        assert!(doc.into_identities(2).is_err());
    }

    #[test]
    fn test_into_identities_skips_unusable_records_and_keeps_the_rest() {
        let doc: GalleryDocument = serde_json::from_str(
            r#"{"people":[
                {"id":"a","name":"Alice","embedding":[1.0,0.0]},
                {"id":"b","name":"Stale","embedding":[1.0,0.0,0.0]},
                {"embedding":[0.0,1.0]}
            ]}"#,
        )
        .unwrap();
        let people = doc.into_identities(2).unwrap();
        let names: Vec<&str> = people.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "person_2"]);
    }

    #[test]
    fn test_missing_people_key_is_empty_gallery() {
        let doc: GalleryDocument = serde_json::from_str("{}").unwrap();
        assert!(doc.into_identities(512).unwrap().is_empty());
    }

    #[test]
    fn test_document_round_trip_keeps_fields() {
        let people = vec![Identity::new("p_0", "Alice", "sister", vec![1.0, 0.0])];
        let json = serde_json::to_string(&GalleryDocument::from_identities(&people)).unwrap();
        let back: GalleryDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back.into_identities(2).unwrap(), people);
    }
}
