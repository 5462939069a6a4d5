use std::path::Path;

use crate::imaging::domain::image_reader::ImageReader;
use crate::shared::frame::Frame;

/// Decodes JPEG/PNG/BMP/WebP files into RGB frames using the `image`
/// crate. Alpha channels are dropped during the RGB conversion.
pub struct ImageFileReader;

impl ImageFileReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageReader for ImageFileReader {
    fn read(&self, path: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
        let img = image::open(path)?.to_rgb8();
        let (width, height) = (img.width(), img.height());
        Ok(Frame::new(img.into_raw(), width, height, 3))
    }
}
