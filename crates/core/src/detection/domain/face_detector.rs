use crate::shared::frame::Frame;

/// Capability interface for face detection.
///
/// Returns the square crop of the most confident face, or `Ok(None)`
/// when the photo contains no detectable face. An `Err` signals a
/// capability failure (corrupt input, model error); the orchestrator
/// treats both outcomes as a skip but records the distinct reason.
///
/// Implementations may be stateful (e.g., session warm-up), hence
/// `&mut self`. Must be deterministic for a fixed image and fixed
/// model configuration.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Option<Frame>, Box<dyn std::error::Error>>;
}
