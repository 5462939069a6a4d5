pub mod cluster_assigner;
pub mod embedding_batch;
