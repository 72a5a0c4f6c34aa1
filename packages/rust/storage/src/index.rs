//! In-memory vector index with exact nearest-neighbour search.

use pdfrag_shared::{Chunk, PdfRagError, Result};

/// A chunk together with its embedding vector.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// One search result: the chunk and its L2 distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub distance: f32,
}

/// Flat vector index mapping embedding vectors back to their chunk text.
///
/// All vectors share one dimension. Search is exhaustive; document-sized
/// indices stay small enough that this never matters.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimensions: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Pair each chunk with its vector. Chunks and vectors must line up
    /// one-to-one and every vector must have the same non-zero length.
    pub fn build(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(PdfRagError::validation(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        if chunks.is_empty() {
            return Err(PdfRagError::validation("no chunks to index"));
        }

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect();

        Self::from_entries(entries)
    }

    /// Rebuild an index from stored entries.
    pub fn from_entries(entries: Vec<IndexEntry>) -> Result<Self> {
        let dimensions = entries.first().map(|e| e.vector.len()).unwrap_or(0);
        if dimensions == 0 {
            return Err(PdfRagError::validation("index has no vectors"));
        }
        if let Some(bad) = entries.iter().position(|e| e.vector.len() != dimensions) {
            return Err(PdfRagError::validation(format!(
                "vector {bad} has {} dimensions, expected {dimensions}",
                entries[bad].vector.len()
            )));
        }

        Ok(Self {
            dimensions,
            entries,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Return the `k` entries closest to `query` by Euclidean distance,
    /// nearest first. Equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimensions {
            return Err(PdfRagError::validation(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, l2_distance(query, &e.vector)))
            .collect();

        // Stable sort keeps insertion order for ties.
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, distance)| SearchHit {
                chunk: self.entries[i].chunk.clone(),
                distance,
            })
            .collect())
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(page: usize, text: &str) -> Chunk {
        Chunk {
            page,
            text: text.into(),
        }
    }

    fn sample_index() -> VectorIndex {
        VectorIndex::build(
            vec![
                chunk(0, "north"),
                chunk(0, "east"),
                chunk(1, "south"),
                chunk(1, "west"),
            ],
            vec![
                vec![0.0, 1.0],
                vec![1.0, 0.0],
                vec![0.0, -1.0],
                vec![-1.0, 0.0],
            ],
        )
        .expect("build index")
    }

    #[test]
    fn search_returns_nearest_first() {
        let index = sample_index();
        let hits = index.search(&[0.1, 0.9], 3).expect("search");
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].chunk.text, "north");
        assert_eq!(hits[1].chunk.text, "east");
        assert!(hits[0].distance <= hits[1].distance);
        assert!(hits[1].distance <= hits[2].distance);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let index = sample_index();
        // Origin is equidistant from all four entries.
        let hits = index.search(&[0.0, 0.0], 4).expect("search");
        let texts: Vec<&str> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["north", "east", "south", "west"]);
    }

    #[test]
    fn k_larger_than_index_returns_everything() {
        let index = sample_index();
        assert_eq!(index.search(&[1.0, 1.0], 10).expect("search").len(), 4);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let index = sample_index();
        assert!(index.search(&[1.0, 0.0, 0.0], 3).is_err());

        let err = VectorIndex::build(
            vec![chunk(0, "a"), chunk(0, "b")],
            vec![vec![1.0, 0.0], vec![1.0]],
        )
        .unwrap_err();
        assert!(err.to_string().contains("dimensions"));
    }

    #[test]
    fn build_rejects_empty_and_misaligned_input() {
        assert!(VectorIndex::build(vec![], vec![]).is_err());
        assert!(VectorIndex::build(vec![chunk(0, "a")], vec![]).is_err());
    }
}
