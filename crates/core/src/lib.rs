//! Face-based photo clustering pipeline.
//!
//! The flow is detect → embed → cluster → materialize: every photo in
//! an input directory is checked for a face, usable faces become
//! fixed-length embeddings, embeddings are partitioned into `k`
//! groups, and each group is realized as an output directory holding
//! copies of its photos. Per-image failures skip that image; only
//! run-level precondition violations abort.
//!
//! Detection and embedding are pluggable capabilities (see
//! [`detection::domain`]) so the orchestration logic stays testable
//! with deterministic stubs.

pub mod clustering;
pub mod detection;
pub mod imaging;
pub mod pipeline;
pub mod shared;
