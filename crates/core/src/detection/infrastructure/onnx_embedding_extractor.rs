/// ArcFace-style face embedding extractor using ONNX Runtime.
///
/// Produces 512-dimensional L2-normalized identity vectors from
/// square face crops.
use std::path::Path;
use std::sync::Mutex;

use crate::detection::domain::embedding_extractor::EmbeddingExtractor;
use crate::detection::infrastructure::execution_provider::preferred_execution_providers;
use crate::shared::frame::Frame;

/// Output vector length of the w600k_r50 ArcFace model.
pub const EMBEDDING_DIM: usize = 512;

const INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

pub struct OnnxEmbeddingExtractor {
    // `embed` takes `&self`; the ort session needs `&mut` to run.
    session: Mutex<ort::session::Session>,
}

impl OnnxEmbeddingExtractor {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let intra_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let session = ort::session::Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_inter_threads(1)?
            .with_intra_threads(intra_threads)?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;
        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl EmbeddingExtractor for OnnxEmbeddingExtractor {
    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    fn embed(&self, face: &Frame) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let tensor = preprocess(face);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let mut session = self
            .session
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        let embedding_array = outputs[0].try_extract_array::<f32>()?;
        let embedding_slice = embedding_array
            .as_slice()
            .ok_or("Cannot get embedding slice")?;

        if embedding_slice.len() != EMBEDDING_DIM {
            return Err(format!(
                "embedding model returned {} values, expected {EMBEDDING_DIM}",
                embedding_slice.len()
            )
            .into());
        }

        let mut embedding = embedding_slice.to_vec();
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

/// Resize the crop to 112x112, normalize, NCHW layout.
fn preprocess(face: &Frame) -> ndarray::Array4<f32> {
    let src = face.as_ndarray();
    let src_w = face.width() as usize;
    let src_h = face.height() as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));

    for y in 0..INPUT_SIZE {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / INPUT_SIZE as f64) as usize).min(src_h - 1);
        for x in 0..INPUT_SIZE {
            let src_x =
                (((x as f64 + 0.5) * src_w as f64 / INPUT_SIZE as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (src[[src_y, src_x, c]] as f32 - NORM_MEAN) / NORM_STD;
            }
        }
    }

    tensor
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
