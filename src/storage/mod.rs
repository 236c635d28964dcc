//! Vector store: a `SQLite`-backed collection of embedding rows, opened
//! under a fixed dimension and queried by one of several distance metrics.

pub mod schema;
mod sqlite;

pub use sqlite::SqliteVectorStore;

use std::collections::BTreeMap;

use crate::chunking::Chunk;
use crate::error::Result;

/// Default path for the on-disk vector store, relative to the current
/// working directory.
pub const DEFAULT_STORE_PATH: &str = "rag-engine.db";

/// A single stored row: an embedding plus the chunk it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRow {
    /// Row ID, assigned by the store on insert.
    pub id: Option<i64>,
    /// The embedding vector.
    pub embedding: Vec<f32>,
    /// Source file name.
    pub file_name: String,
    /// Position within the source file, for stable ordering.
    pub file_position: i64,
    /// The chunk text this row indexes.
    pub content: String,
    /// Front-matter metadata copied from the source document.
    pub metadata: BTreeMap<String, String>,
    /// Unix timestamp of last write, used by the update-mode ingestion
    /// routine to decide whether a file needs re-indexing.
    pub updated_at: Option<i64>,
}

impl VectorRow {
    /// Builds a row from a chunk and its embedding, ready for insertion.
    #[must_use]
    pub fn from_chunk(chunk: &Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: None,
            embedding,
            file_name: chunk.file_name.clone(),
            #[allow(clippy::cast_possible_wrap)]
            file_position: chunk.file_position as i64,
            content: chunk.content.clone(),
            metadata: chunk.metadata.clone(),
            updated_at: None,
        }
    }
}

/// A row returned from a similarity query, paired with its distance to the
/// query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// The matched row.
    pub row: VectorRow,
    /// Distance to the query vector under the metric the query requested.
    /// Smaller is closer for every supported metric.
    pub distance: f64,
}

/// A named distance function for similarity queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    /// Euclidean distance.
    L2,
    /// Negative inner product (so that, like the other metrics, smaller is
    /// closer).
    InnerProduct,
    /// `1 - cosine similarity`.
    Cosine,
    /// Manhattan distance.
    L1,
    /// Hamming distance over each vector's sign bits.
    Hamming,
    /// Jaccard distance over each vector's sign bits.
    Jaccard,
}

impl Distance {
    /// Computes the distance between two equal-length vectors.
    ///
    /// # Panics
    ///
    /// Panics if `a` and `b` have different lengths; callers are expected
    /// to only compare vectors from the same collection, which enforces a
    /// fixed dimension at `open()` time.
    #[must_use]
    pub fn compute(self, a: &[f32], b: &[f32]) -> f64 {
        assert_eq!(a.len(), b.len(), "distance compared across mismatched dimensions");
        match self {
            Self::L2 => a
                .iter()
                .zip(b)
                .map(|(x, y)| f64::from(x - y).powi(2))
                .sum::<f64>()
                .sqrt(),
            Self::InnerProduct => {
                -a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum::<f64>()
            }
            Self::Cosine => {
                let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
                let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
                let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    1.0
                } else {
                    1.0 - dot / (norm_a * norm_b)
                }
            }
            Self::L1 => a.iter().zip(b).map(|(x, y)| f64::from((x - y).abs())).sum(),
            Self::Hamming => a
                .iter()
                .zip(b)
                .filter(|(x, y)| (**x > 0.0) != (**y > 0.0))
                .count() as f64,
            Self::Jaccard => {
                let mut intersection = 0u32;
                let mut union = 0u32;
                for (x, y) in a.iter().zip(b) {
                    let bx = *x > 0.0;
                    let by = *y > 0.0;
                    if bx || by {
                        union += 1;
                    }
                    if bx && by {
                        intersection += 1;
                    }
                }
                if union == 0 {
                    0.0
                } else {
                    1.0 - f64::from(intersection) / f64::from(union)
                }
            }
        }
    }

    /// Parses a distance name as used in `Store::query`'s symbolic API
    /// (`l2 | inner_product | cosine | l1 | hamming | jaccard`).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "l2" => Some(Self::L2),
            "inner_product" => Some(Self::InnerProduct),
            "cosine" => Some(Self::Cosine),
            "l1" => Some(Self::L1),
            "hamming" => Some(Self::Hamming),
            "jaccard" => Some(Self::Jaccard),
            _ => None,
        }
    }
}

/// Storage capability for a single fixed-dimension collection of
/// embeddings.
pub trait VectorStore: Send + Sync {
    /// Inserts a single row, returning its assigned ID.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if the write fails, or a `Configuration`
    /// error if the row's embedding length does not match the collection's
    /// dimension.
    fn insert(&mut self, row: VectorRow) -> Result<i64>;

    /// Inserts rows in fixed-size pages, each committed as one transaction.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if any page fails to commit, or a
    /// `Configuration` error if any row's embedding length does not match
    /// the collection's dimension.
    fn batch_insert(&mut self, rows: &[VectorRow], batch_size: usize) -> Result<()>;

    /// Returns the `k` rows closest to `embedding` under `distance`,
    /// ordered by ascending distance.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if the query fails.
    fn query(&self, embedding: &[f32], k: usize, distance: Distance) -> Result<Vec<QueryResult>>;

    /// Returns every row indexed under `file_name`.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if the query fails.
    fn get_file(&self, file_name: &str) -> Result<Vec<VectorRow>>;

    /// Removes every row indexed under `file_name`.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if the deletion fails.
    fn delete_file(&mut self, file_name: &str) -> Result<()>;

    /// Removes every row in the collection, keeping the collection itself.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if the deletion fails.
    fn clear(&mut self) -> Result<()>;

    /// Drops the collection entirely, including its dimension record.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if the drop fails.
    fn drop_collection(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_distance_of_identical_vectors_is_zero() {
        let a = [1.0, 0.0, 0.0];
        assert!((Distance::Cosine.compute(&a, &a)).abs() < 1e-6);
    }

    #[test]
    fn l2_distance_of_orthogonal_unit_vectors_is_sqrt_2() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!((Distance::L2.compute(&a, &b) - std::f64::consts::SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn inner_product_is_negated_dot() {
        let a = [1.0, 2.0];
        let b = [3.0, 4.0];
        assert!((Distance::InnerProduct.compute(&a, &b) - (-11.0)).abs() < 1e-6);
    }

    #[test]
    fn parse_rejects_unknown_names() {
        assert!(Distance::parse("manhattan").is_none());
        assert_eq!(Distance::parse("cosine"), Some(Distance::Cosine));
    }
}
