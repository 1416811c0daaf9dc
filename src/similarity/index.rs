//! Exact flat and IVF approximate nearest-neighbor search over
//! L2-normalized embeddings (S5, spec §4.5). Inner product on normalized
//! vectors equals cosine similarity.

use crate::types::SectionId;

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Brute-force inner-product search. Used when the corpus is small enough
/// that an approximate index wouldn't pay for itself.
pub struct FlatIndex {
    ids: Vec<SectionId>,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    pub fn build(entries: Vec<(SectionId, Vec<f32>)>) -> Self {
        let (ids, vectors) = entries.into_iter().unzip();
        Self { ids, vectors }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Top `k` neighbors of `query`, descending by similarity, excluding
    /// `query_id` itself.
    pub fn search(&self, query_id: &SectionId, query: &[f32], k: usize) -> Vec<(SectionId, f32)> {
        let mut scored: Vec<(SectionId, f32)> = self
            .ids
            .iter()
            .zip(&self.vectors)
            .filter(|(id, _)| *id != query_id)
            .map(|(id, vector)| (id.clone(), dot(query, vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

/// Inverted-file index: vectors are assigned to `nlist` cells by k-means
/// (trained on up to the first `training_size` vectors), and a query only
/// probes its `nprobe` nearest cells rather than the whole corpus.
pub struct IvfIndex {
    centroids: Vec<Vec<f32>>,
    cells: Vec<Vec<usize>>,
    ids: Vec<SectionId>,
    vectors: Vec<Vec<f32>>,
}

impl IvfIndex {
    pub fn build(entries: Vec<(SectionId, Vec<f32>)>, training_size: usize) -> Self {
        let (ids, vectors): (Vec<_>, Vec<_>) = entries.into_iter().unzip();
        let n = vectors.len();

        if n == 0 {
            return Self {
                centroids: Vec::new(),
                cells: Vec::new(),
                ids,
                vectors,
            };
        }

        let nlist = ((n as f64).sqrt().ceil() as usize).clamp(1, 100);
        let train_n = training_size.min(n);
        let centroids = kmeans(&vectors[..train_n], nlist);

        let mut cells = vec![Vec::new(); centroids.len()];
        for (i, vector) in vectors.iter().enumerate() {
            cells[nearest_centroid(&centroids, vector)].push(i);
        }

        Self {
            centroids,
            cells,
            ids,
            vectors,
        }
    }

    pub fn search(
        &self,
        query_id: &SectionId,
        query: &[f32],
        k: usize,
        nprobe: usize,
    ) -> Vec<(SectionId, f32)> {
        if self.centroids.is_empty() {
            return Vec::new();
        }

        let mut cell_order: Vec<usize> = (0..self.centroids.len()).collect();
        cell_order.sort_by(|&a, &b| {
            dot(query, &self.centroids[b])
                .partial_cmp(&dot(query, &self.centroids[a]))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut scored: Vec<(SectionId, f32)> = Vec::new();
        for &cell in cell_order.iter().take(nprobe.max(1)) {
            for &idx in &self.cells[cell] {
                if &self.ids[idx] == query_id {
                    continue;
                }
                scored.push((self.ids[idx].clone(), dot(query, &self.vectors[idx])));
            }
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

fn nearest_centroid(centroids: &[Vec<f32>], vector: &[f32]) -> usize {
    centroids
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            dot(vector, a)
                .partial_cmp(&dot(vector, b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Fixed-iteration k-means, seeded by taking every `n/k`th training
/// vector as an initial centroid rather than drawing random ones, so
/// index builds are deterministic across runs of the same corpus.
fn kmeans(vectors: &[Vec<f32>], k: usize) -> Vec<Vec<f32>> {
    let k = k.max(1).min(vectors.len().max(1));
    let dim = vectors.first().map(|v| v.len()).unwrap_or(0);
    let step = (vectors.len() / k).max(1);
    let mut centroids: Vec<Vec<f32>> = (0..k)
        .map(|i| vectors[(i * step).min(vectors.len() - 1)].clone())
        .collect();

    const ITERATIONS: usize = 10;
    for _ in 0..ITERATIONS {
        let mut sums = vec![vec![0.0f32; dim]; k];
        let mut counts = vec![0usize; k];

        for vector in vectors {
            let cell = nearest_centroid(&centroids, vector);
            for (sum, v) in sums[cell].iter_mut().zip(vector) {
                *sum += v;
            }
            counts[cell] += 1;
        }

        for (cell, centroid) in centroids.iter_mut().enumerate() {
            if counts[cell] == 0 {
                continue;
            }
            for (c, s) in centroid.iter_mut().zip(&sums[cell]) {
                *c = *s / counts[cell] as f32;
            }
        }
    }

    centroids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_index_excludes_self_and_ranks_by_similarity() {
        let index = FlatIndex::build(vec![
            (SectionId::from("a"), vec![1.0, 0.0]),
            (SectionId::from("b"), vec![0.9, 0.1]),
            (SectionId::from("c"), vec![-1.0, 0.0]),
        ]);
        let results = index.search(&SectionId::from("a"), &[1.0, 0.0], 2);
        assert_eq!(results[0].0, SectionId::from("b"));
        assert!(results.iter().all(|(id, _)| id != &SectionId::from("a")));
    }

    #[test]
    fn ivf_index_finds_nearest_cell_member() {
        let entries: Vec<(SectionId, Vec<f32>)> = (0..50)
            .map(|i| {
                let id = SectionId::from(format!("s-{i}"));
                let angle = i as f32;
                (id, vec![angle.cos(), angle.sin()])
            })
            .collect();
        let index = IvfIndex::build(entries.clone(), 5000);
        let (query_id, query_vec) = &entries[0];
        let results = index.search(query_id, query_vec, 5, 10);
        assert!(!results.is_empty());
        assert!(results.iter().all(|(id, _)| id != query_id));
    }
}
