/// BlazeFace face detector using ONNX Runtime via `ort`.
///
/// The clustering pipeline wants at most one face per photo, so
/// instead of full NMS this detector decodes the single highest
/// scoring anchor above the confidence threshold and returns a square
/// crop around it.
use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::infrastructure::execution_provider::preferred_execution_providers;
use crate::shared::frame::Frame;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// Default confidence threshold.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Fraction of the face box added around the crop so the embedding
/// model sees forehead and chin context.
const CROP_MARGIN: f64 = 0.2;

pub struct OnnxFaceDetector {
    session: ort::session::Session,
    confidence: f64,
    anchors: Vec<[f32; 2]>,
}

impl OnnxFaceDetector {
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;
        Ok(Self {
            session,
            confidence,
            anchors: generate_anchors(),
        })
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let input_tensor = preprocess(frame, INPUT_SIZE);
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // BlazeFace outputs two tensors:
        // - regressors: [1, 896, 16] (box deltas + keypoints)
        // - classificators: [1, 896, 1] (confidence scores)
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }

        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        let num_anchors = self.anchors.len().min(NUM_ANCHORS).min(score_data.len());

        let mut best: Option<(usize, f32)> = None;
        for i in 0..num_anchors {
            let score = sigmoid(score_data[i]);
            if score < self.confidence as f32 {
                continue;
            }
            if best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((i, score));
            }
        }

        let Some((idx, _)) = best else {
            return Ok(None);
        };

        let reg_offset = idx * 16;
        if reg_offset + 4 > reg_data.len() {
            return Err("BlazeFace regressor tensor too short".into());
        }

        // Decode box center + size relative to the anchor, in unit coords
        let anchor = &self.anchors[idx];
        let cx = (anchor[0] + reg_data[reg_offset] / INPUT_SIZE as f32) as f64;
        let cy = (anchor[1] + reg_data[reg_offset + 1] / INPUT_SIZE as f32) as f64;
        let w = (reg_data[reg_offset + 2] / INPUT_SIZE as f32) as f64;
        let h = (reg_data[reg_offset + 3] / INPUT_SIZE as f32) as f64;

        Ok(Some(crop_face(frame, cx, cy, w.max(h))))
    }
}

/// Square crop around a unit-coordinate box center, padded by
/// [`CROP_MARGIN`] and clamped to frame bounds.
fn crop_face(frame: &Frame, cx: f64, cy: f64, size: f64) -> Frame {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;

    let half = size * (1.0 + CROP_MARGIN) / 2.0;
    let x1 = (((cx - half) * fw).max(0.0) as usize).min(fw as usize - 1);
    let y1 = (((cy - half) * fh).max(0.0) as usize).min(fh as usize - 1);
    let x2 = ((((cx + half) * fw).max(0.0)) as usize).clamp(x1 + 1, fw as usize);
    let y2 = ((((cy + half) * fh).max(0.0)) as usize).clamp(y1 + 1, fh as usize);

    frame.crop(x1, y1, x2, y2)
}

/// Resize frame to `size × size` and normalize to [0,1] NCHW float32.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    tensor
}

/// Generate BlazeFace anchors for the short-range model.
///
/// The short-range model uses two feature map sizes: 16×16 and 8×8,
/// with 2 and 6 anchors per cell respectively.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_frame(w: u32, h: u32) -> Frame {
        Frame::new(vec![128u8; (w * h * 3) as usize], w, h, 3)
    }

    #[test]
    fn test_preprocess_shape() {
        let tensor = preprocess(&make_frame(200, 100), 128);
        assert_eq!(tensor.shape(), &[1, 3, 128, 128]);
    }

    #[test]
    fn test_preprocess_normalized() {
        let frame = Frame::new(vec![255u8; 50 * 50 * 3], 50, 50, 3);
        let tensor = preprocess(&frame, 128);
        // All source pixels are 255, so resized pixels should be ~1.0
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_generate_anchors_count() {
        // 16×16 grid × 2 anchors + 8×8 grid × 6 anchors = 512 + 384 = 896
        assert_eq!(generate_anchors().len(), NUM_ANCHORS);
    }

    #[test]
    fn test_anchors_in_unit_range() {
        for a in &generate_anchors() {
            assert!(a[0] > 0.0 && a[0] < 1.0);
            assert!(a[1] > 0.0 && a[1] < 1.0);
        }
    }

    #[test]
    fn test_sigmoid_zero() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_sigmoid_saturates() {
        assert!((sigmoid(10.0) - 1.0).abs() < 0.001);
        assert!(sigmoid(-10.0) < 0.001);
    }

    #[test]
    fn test_crop_face_is_square_when_unclamped() {
        let frame = make_frame(100, 100);
        // Box of size 0.2 centered in the frame
        let crop = crop_face(&frame, 0.5, 0.5, 0.2);
        assert_eq!(crop.width(), crop.height());
        // 0.2 * 1.2 margin = 0.24 of 100px = 24px
        assert_eq!(crop.width(), 24);
    }

    #[test]
    fn test_crop_face_clamps_to_bounds() {
        let frame = make_frame(100, 100);
        // Box hanging off the top-left corner
        let crop = crop_face(&frame, 0.02, 0.02, 0.2);
        assert!(crop.width() <= 100);
        assert!(crop.height() <= 100);
        assert!(crop.width() > 0 && crop.height() > 0);
    }

    #[test]
    fn test_crop_face_degenerate_box_yields_nonempty_crop() {
        let frame = make_frame(100, 100);
        let crop = crop_face(&frame, 0.5, 0.5, 0.0);
        assert!(crop.width() >= 1);
        assert!(crop.height() >= 1);
    }
}
