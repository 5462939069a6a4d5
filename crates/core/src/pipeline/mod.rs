pub mod cluster_faces_use_case;
pub mod cluster_materializer;
pub mod error;
pub mod image_scanner;
pub mod pipeline_logger;
