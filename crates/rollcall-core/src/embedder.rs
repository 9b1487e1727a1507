//! ArcFace embedding extraction via ONNX Runtime.
//!
//! Faces are aligned to the canonical 112×112 pose from their detected
//! landmarks before the embedding forward pass.

use crate::alignment;
use crate::types::{Embedding, FaceBox};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const INPUT_SIZE: usize = alignment::ALIGNED_SIZE;
/// ArcFace normalizes symmetrically around the midpoint, unlike SCRFD.
const PIXEL_MEAN: f32 = 127.5;
const PIXEL_STD: f32 = 127.5;
const EMBEDDING_DIM: usize = 512;

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("embedding model not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("face has no landmarks; alignment needs the detector's five points")]
    MissingLandmarks,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ArcFace-based embedding extractor.
pub struct FaceEmbedder {
    session: Session,
}

impl FaceEmbedder {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, EmbedderError> {
        if !Path::new(model_path).exists() {
            return Err(EmbedderError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = model_path, "embedding model loaded");
        Ok(Self { session })
    }

    /// Extract an L2-normalized embedding for one detected face.
    pub fn extract(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
        face: &FaceBox,
    ) -> Result<Embedding, EmbedderError> {
        let landmarks = face.landmarks.as_ref().ok_or(EmbedderError::MissingLandmarks)?;
        let crop = alignment::align_face(gray, width, height, landmarks);
        let input = face_tensor(&crop);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("embedding output: {e}")))?;

        if raw.len() != EMBEDDING_DIM {
            return Err(EmbedderError::InferenceFailed(format!(
                "expected a {EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Embedding { values: l2_normalize(raw) })
    }
}

/// Build the NCHW input tensor from a 112×112 aligned grayscale crop,
/// replicating the single channel across all three inputs.
fn face_tensor(crop: &[u8]) -> Array4<f32> {
    let mut tensor = Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    for (i, &pixel) in crop.iter().take(INPUT_SIZE * INPUT_SIZE).enumerate() {
        let value = (pixel as f32 - PIXEL_MEAN) / PIXEL_STD;
        let (y, x) = (i / INPUT_SIZE, i % INPUT_SIZE);
        for channel in 0..3 {
            tensor[[0, channel, y, x]] = value;
        }
    }
    tensor
}

fn l2_normalize(raw: &[f32]) -> Vec<f32> {
    let norm = raw.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|v| v / norm).collect()
    } else {
        raw.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_tensor_has_nchw_shape() {
        let crop = vec![128u8; INPUT_SIZE * INPUT_SIZE];
        let tensor = face_tensor(&crop);
        assert_eq!(tensor.shape(), &[1, 3, INPUT_SIZE, INPUT_SIZE]);
    }

    #[test]
    fn face_tensor_normalizes_symmetrically() {
        let crop = vec![255u8; INPUT_SIZE * INPUT_SIZE];
        let tensor = face_tensor(&crop);
        let expected = (255.0 - PIXEL_MEAN) / PIXEL_STD;
        assert!((tensor[[0, 0, 0, 0]] - expected).abs() < 1e-6);

        let crop = vec![0u8; INPUT_SIZE * INPUT_SIZE];
        let tensor = face_tensor(&crop);
        assert!((tensor[[0, 0, 0, 0]] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn face_tensor_replicates_channels() {
        let crop: Vec<u8> = (0..INPUT_SIZE * INPUT_SIZE).map(|i| (i % 251) as u8).collect();
        let tensor = face_tensor(&crop);
        for y in (0..INPUT_SIZE).step_by(13) {
            for x in (0..INPUT_SIZE).step_by(7) {
                assert_eq!(tensor[[0, 0, y, x]], tensor[[0, 1, y, x]]);
                assert_eq!(tensor[[0, 1, y, x]], tensor[[0, 2, y, x]]);
            }
        }
    }

    #[test]
    fn l2_normalize_yields_a_unit_vector() {
        let normalized = l2_normalize(&[3.0, 4.0]);
        let norm: f32 = normalized.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn l2_normalize_leaves_the_zero_vector_alone() {
        assert_eq!(l2_normalize(&[0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
    }
}
