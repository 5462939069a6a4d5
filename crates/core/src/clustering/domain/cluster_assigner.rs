use thiserror::Error;

use crate::clustering::domain::embedding_batch::EmbeddingBatch;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ClusterError {
    #[error("cluster count must be at least 1")]
    InvalidClusterCount,
}

/// Domain interface for partitioning an embedding batch into `k`
/// groups.
///
/// The returned assignment is index-aligned with the batch: one
/// cluster id in `[0, k)` per batch entry, produced atomically for
/// the whole batch. Empty clusters are permitted. Any fitted model
/// state is scoped to the single `assign` call.
pub trait ClusterAssigner: Send {
    fn assign(&self, batch: &EmbeddingBatch, k: usize) -> Result<Vec<usize>, ClusterError>;
}
