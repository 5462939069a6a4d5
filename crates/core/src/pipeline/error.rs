use std::path::PathBuf;

use thiserror::Error;

use crate::clustering::domain::cluster_assigner::ClusterError;
use crate::pipeline::cluster_materializer::MaterializeError;

/// Run-level failures. Per-image problems never surface here — they
/// are recorded on the image record and the run continues.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Zero images produced a usable embedding (including the case
    /// where the input directory held no image files at all).
    /// Clustering and materialization are skipped; no output tree is
    /// produced.
    #[error("no usable face embeddings ({scanned} images scanned)")]
    EmptyBatch { scanned: usize },

    #[error("failed to read input directory {path}: {source}")]
    InputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Clustering(#[from] ClusterError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),
}
