use std::path::Path;

use crate::shared::frame::Frame;

/// Domain interface for decoding an image file into an RGB frame.
///
/// A decode failure (corrupt or unreadable file) is a per-image
/// capability error; the orchestrator skips the image and continues.
pub trait ImageReader: Send {
    fn read(&self, path: &Path) -> Result<Frame, Box<dyn std::error::Error>>;
}
