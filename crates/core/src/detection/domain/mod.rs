pub mod embedding_extractor;
pub mod face_detector;
