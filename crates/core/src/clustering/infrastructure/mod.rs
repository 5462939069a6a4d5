pub mod kmeans_assigner;
