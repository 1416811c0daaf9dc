//! Embedding cache: a disk-backed map from section id to L2-normalized
//! vector, replaced atomically on save (S5, spec §4.5/§6).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::types::{PipelineError, Result, SectionId};

/// Produces a dense embedding for a section's text. The model behind this
/// trait is an external collaborator (spec §1 non-goal); the pipeline
/// only depends on the trait.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn dim(&self) -> usize;
}

/// Single binary key-value blob mapping section id to its L2-normalized
/// embedding. Loaded whole into memory and written back via
/// write-to-temp-then-rename so a crash mid-save never corrupts the
/// previous cache.
pub struct EmbeddingCache {
    path: PathBuf,
    vectors: HashMap<String, Vec<f32>>,
}

impl EmbeddingCache {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let vectors = if path.exists() {
            let bytes = std::fs::read(&path).map_err(PipelineError::Io)?;
            serde_json::from_slice(&bytes)?
        } else {
            HashMap::new()
        };
        Ok(Self { path, vectors })
    }

    pub fn get(&self, id: &SectionId) -> Option<&Vec<f32>> {
        self.vectors.get(&id.0)
    }

    pub fn contains(&self, id: &SectionId) -> bool {
        self.vectors.contains_key(&id.0)
    }

    pub fn insert(&mut self, id: &SectionId, vector: Vec<f32>) {
        self.vectors.insert(id.0.clone(), l2_normalize(vector));
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SectionId, &Vec<f32>)> {
        self.vectors.iter().map(|(id, v)| (SectionId::from(id.clone()), v))
    }

    /// Write the whole cache to a sibling temp file then rename it over
    /// the real path (spec §6: "replaced atomically").
    pub fn save(&self) -> Result<()> {
        let tmp_path = self.path.with_extension("tmp");
        let bytes = serde_json::to_vec(&self.vectors)?;
        std::fs::write(&tmp_path, bytes).map_err(PipelineError::Io)?;
        std::fs::rename(&tmp_path, &self.path).map_err(PipelineError::Io)?;
        Ok(())
    }
}

pub fn l2_normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_normalize_unit_length() {
        let v = l2_normalize(vec![3.0, 4.0]);
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_is_left_alone() {
        let v = l2_normalize(vec![0.0, 0.0]);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn save_and_reopen_roundtrips_and_replaces_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embeddings.bin");

        let mut cache = EmbeddingCache::open(&path).unwrap();
        cache.insert(&SectionId::from("dc-1"), vec![1.0, 0.0]);
        cache.save().unwrap();
        assert!(!path.with_extension("tmp").exists());

        let reopened = EmbeddingCache::open(&path).unwrap();
        assert_eq!(reopened.get(&SectionId::from("dc-1")), Some(&vec![1.0, 0.0]));
    }
}
