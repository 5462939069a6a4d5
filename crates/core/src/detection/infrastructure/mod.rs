pub mod execution_provider;
pub mod onnx_embedding_extractor;
pub mod onnx_face_detector;
