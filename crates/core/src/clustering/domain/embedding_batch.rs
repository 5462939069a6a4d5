use std::path::{Path, PathBuf};

use thiserror::Error;

/// Why an image was excluded from the embedding batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The detector found no face in the photo.
    NoFace,
    /// The reader, detector, or extractor failed; the cause is kept
    /// for diagnostics.
    Processing(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoFace => write!(f, "no face detected"),
            SkipReason::Processing(cause) => write!(f, "processing error: {cause}"),
        }
    }
}

/// Per-image processing state. Mutated exactly once per run, after
/// the detection/extraction attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordStatus {
    Unprocessed,
    Embedded,
    Failed(SkipReason),
}

#[derive(Clone, Debug)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub status: RecordStatus,
}

impl ImageRecord {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            status: RecordStatus::Unprocessed,
        }
    }
}

#[derive(Error, Debug)]
#[error("embedding for {path} has dimension {actual}, expected {expected}")]
pub struct DimensionMismatch {
    pub path: PathBuf,
    pub expected: usize,
    pub actual: usize,
}

/// Ordered accumulation of (embedding, source path) pairs for one run.
///
/// Insertion order is enumeration order; the batch only ever contains
/// images that produced a usable embedding, and every embedding has
/// the dimensionality established by the first push.
#[derive(Debug, Default)]
pub struct EmbeddingBatch {
    dimension: Option<usize>,
    embeddings: Vec<Vec<f32>>,
    paths: Vec<PathBuf>,
}

impl EmbeddingBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an embedding, rejecting dimensionality drift. A reject
    /// leaves the batch unchanged; the caller marks the image failed.
    pub fn push(&mut self, embedding: Vec<f32>, path: PathBuf) -> Result<(), DimensionMismatch> {
        match self.dimension {
            None => self.dimension = Some(embedding.len()),
            Some(expected) if embedding.len() != expected => {
                return Err(DimensionMismatch {
                    path,
                    expected,
                    actual: embedding.len(),
                });
            }
            Some(_) => {}
        }
        self.embeddings.push(embedding);
        self.paths.push(path);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    /// Dimensionality of the batch, `None` until the first push.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[f32], &Path)> {
        self.embeddings
            .iter()
            .map(|e| e.as_slice())
            .zip(self.paths.iter().map(|p| p.as_path()))
    }
}
