pub const DETECTOR_MODEL_NAME: &str = "blazeface_short_range.onnx";
pub const DETECTOR_MODEL_URL: &str =
    "https://github.com/facesort/facesort/releases/download/v0.1.0/blazeface_short_range.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/facesort/facesort/releases/download/v0.1.0/w600k_r50.onnx";

/// Extensions accepted when enumerating an input directory.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

/// Default cluster count when the caller does not specify one.
pub const DEFAULT_CLUSTERS: usize = 2;
