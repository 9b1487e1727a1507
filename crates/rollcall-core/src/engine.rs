//! The detect/embed seam between camera frames and the matcher.

use crate::detector::{DetectorError, FaceDetector};
use crate::embedder::{EmbedderError, FaceEmbedder};
use crate::types::{Embedding, FaceBox};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("embedder: {0}")]
    Embedder(#[from] EmbedderError),
}

/// Face detection and embedding extraction over grayscale frames.
///
/// Everything above inference — gallery loading, the recognition thread,
/// the marking rule — talks to the models through this trait, so it can be
/// exercised with synthetic embeddings in tests.
pub trait FaceEngine {
    /// Detect faces, highest confidence first.
    fn detect(&mut self, gray: &[u8], width: u32, height: u32)
        -> Result<Vec<FaceBox>, EngineError>;

    /// Extract the embedding for one detected face.
    fn embed(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
        face: &FaceBox,
    ) -> Result<Embedding, EngineError>;
}

/// ONNX-backed engine: SCRFD for detection, ArcFace for embeddings.
pub struct OnnxEngine {
    detector: FaceDetector,
    embedder: FaceEmbedder,
}

impl OnnxEngine {
    /// Load both models, failing fast if either is missing or unloadable.
    pub fn load(detector_model: &str, embedding_model: &str) -> Result<Self, EngineError> {
        let detector = FaceDetector::load(detector_model)?;
        let embedder = FaceEmbedder::load(embedding_model)?;
        Ok(Self { detector, embedder })
    }
}

impl FaceEngine for OnnxEngine {
    fn detect(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceBox>, EngineError> {
        Ok(self.detector.detect(gray, width, height)?)
    }

    fn embed(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
        face: &FaceBox,
    ) -> Result<Embedding, EngineError> {
        Ok(self.embedder.extract(gray, width, height, face)?)
    }
}
