use crate::shared::frame::Frame;

/// Capability interface for turning a face crop into an identity
/// embedding.
///
/// `embed` must return vectors of exactly `dimension()` elements for
/// every call on a given instance, and has no side effects — it is a
/// pure function from the orchestrator's perspective, which makes it
/// trivially substitutable with a stub in tests.
pub trait EmbeddingExtractor: Send {
    /// Embedding length, constant for this extractor instance.
    fn dimension(&self) -> usize;

    fn embed(&self, face: &Frame) -> Result<Vec<f32>, Box<dyn std::error::Error>>;
}
