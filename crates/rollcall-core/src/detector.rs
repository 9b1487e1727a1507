//! SCRFD face detection via ONNX Runtime.
//!
//! Decodes the anchor-free SCRFD outputs over strides 8/16/32 and cleans
//! them up with a confidence filter and non-maximum suppression.

use crate::types::FaceBox;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const INPUT_SIZE: usize = 640;
const PIXEL_MEAN: f32 = 127.5;
const PIXEL_STD: f32 = 128.0;
const SCORE_THRESHOLD: f32 = 0.5;
const NMS_IOU_THRESHOLD: f32 = 0.4;
const STRIDES: [usize; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;
/// 3 strides × (scores, boxes, landmarks), in the standard insightface
/// export order: all scores first, then all boxes, then all landmarks.
const EXPECTED_OUTPUTS: usize = 9;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("detection model not found: {0}")]
    ModelNotFound(String),
    #[error("unexpected model shape: {0}")]
    ModelShape(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Mapping between the source frame and the letterboxed model input.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn fit(width: usize, height: usize) -> Self {
        let scale =
            (INPUT_SIZE as f32 / width as f32).min(INPUT_SIZE as f32 / height as f32);
        let new_w = (width as f32 * scale).round();
        let new_h = (height as f32 * scale).round();
        Self {
            scale,
            pad_x: (INPUT_SIZE as f32 - new_w) / 2.0,
            pad_y: (INPUT_SIZE as f32 - new_h) / 2.0,
        }
    }

    /// Map a point from model-input space back into frame space.
    fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// SCRFD-based face detector.
pub struct FaceDetector {
    session: Session,
}

impl FaceDetector {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let outputs = session.outputs().len();
        if outputs != EXPECTED_OUTPUTS {
            return Err(DetectorError::ModelShape(format!(
                "expected {EXPECTED_OUTPUTS} output tensors (scores/boxes/landmarks per stride), got {outputs}"
            )));
        }

        tracing::info!(path = model_path, "face detection model loaded");
        Ok(Self { session })
    }

    /// Detect faces in a grayscale frame, highest confidence first.
    pub fn detect(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceBox>, DetectorError> {
        let letterbox = Letterbox::fit(width as usize, height as usize);
        let input = preprocess(gray, width as usize, height as usize, &letterbox);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut faces = Vec::new();
        for (level, &stride) in STRIDES.iter().enumerate() {
            let (_, scores) = outputs[level].try_extract_tensor::<f32>().map_err(|e| {
                DetectorError::InferenceFailed(format!("scores at stride {stride}: {e}"))
            })?;
            let (_, boxes) = outputs[level + 3].try_extract_tensor::<f32>().map_err(|e| {
                DetectorError::InferenceFailed(format!("boxes at stride {stride}: {e}"))
            })?;
            let (_, landmarks) =
                outputs[level + 6].try_extract_tensor::<f32>().map_err(|e| {
                    DetectorError::InferenceFailed(format!("landmarks at stride {stride}: {e}"))
                })?;

            decode_stride(stride, scores, boxes, landmarks, &letterbox, &mut faces);
        }

        Ok(non_max_suppress(faces, NMS_IOU_THRESHOLD))
    }
}

/// Letterbox a grayscale frame into the square NCHW input tensor.
///
/// The frame is bilinearly resized to fit, centered, and padded with the
/// pixel mean (which normalizes to zero). Grayscale is replicated across
/// the three input channels.
fn preprocess(gray: &[u8], width: usize, height: usize, letterbox: &Letterbox) -> Array4<f32> {
    let new_w = (width as f32 * letterbox.scale).round() as usize;
    let new_h = (height as f32 * letterbox.scale).round() as usize;
    let resized = resize_bilinear(gray, width, height, new_w, new_h);

    let x0 = letterbox.pad_x.floor() as usize;
    let y0 = letterbox.pad_y.floor() as usize;

    let mut tensor = Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    for y in 0..INPUT_SIZE {
        for x in 0..INPUT_SIZE {
            let pixel = if (y0..y0 + new_h).contains(&y) && (x0..x0 + new_w).contains(&x) {
                resized[(y - y0) * new_w + (x - x0)] as f32
            } else {
                PIXEL_MEAN
            };
            let value = (pixel - PIXEL_MEAN) / PIXEL_STD;
            tensor[[0, 0, y, x]] = value;
            tensor[[0, 1, y, x]] = value;
            tensor[[0, 2, y, x]] = value;
        }
    }
    tensor
}

/// Bilinear grayscale resize.
fn resize_bilinear(src: &[u8], src_w: usize, src_h: usize, dst_w: usize, dst_h: usize) -> Vec<u8> {
    let x_ratio = src_w as f32 / dst_w as f32;
    let y_ratio = src_h as f32 / dst_h as f32;

    let mut dst = vec![0u8; dst_w * dst_h];
    for y in 0..dst_h {
        let sy = ((y as f32 + 0.5) * y_ratio - 0.5).max(0.0);
        let y0 = (sy as usize).min(src_h - 1);
        let y1 = (y0 + 1).min(src_h - 1);
        let fy = sy - y0 as f32;

        for x in 0..dst_w {
            let sx = ((x as f32 + 0.5) * x_ratio - 0.5).max(0.0);
            let x0 = (sx as usize).min(src_w - 1);
            let x1 = (x0 + 1).min(src_w - 1);
            let fx = sx - x0 as f32;

            let top = src[y0 * src_w + x0] as f32 * (1.0 - fx)
                + src[y0 * src_w + x1] as f32 * fx;
            let bottom = src[y1 * src_w + x0] as f32 * (1.0 - fx)
                + src[y1 * src_w + x1] as f32 * fx;
            dst[y * dst_w + x] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
        }
    }
    dst
}

/// Decode one stride level's anchor-free outputs into face boxes.
fn decode_stride(
    stride: usize,
    scores: &[f32],
    boxes: &[f32],
    landmarks: &[f32],
    letterbox: &Letterbox,
    out: &mut Vec<FaceBox>,
) {
    let cells = INPUT_SIZE / stride;
    let anchors = cells * cells * ANCHORS_PER_CELL;

    for anchor in 0..anchors {
        let score = scores.get(anchor).copied().unwrap_or(0.0);
        if score <= SCORE_THRESHOLD {
            continue;
        }

        let cell = anchor / ANCHORS_PER_CELL;
        let cx = ((cell % cells) * stride) as f32;
        let cy = ((cell / cells) * stride) as f32;

        // Box offsets are distances (left, top, right, bottom) from the
        // anchor center, in units of the stride.
        let b = anchor * 4;
        if b + 3 >= boxes.len() {
            continue;
        }
        let s = stride as f32;
        let (x1, y1) = letterbox.unmap(cx - boxes[b] * s, cy - boxes[b + 1] * s);
        let (x2, y2) = letterbox.unmap(cx + boxes[b + 2] * s, cy + boxes[b + 3] * s);

        let k = anchor * 10;
        let points = if k + 9 < landmarks.len() {
            let mut points = [(0.0f32, 0.0f32); 5];
            for (i, point) in points.iter_mut().enumerate() {
                *point = letterbox.unmap(
                    cx + landmarks[k + i * 2] * s,
                    cy + landmarks[k + i * 2 + 1] * s,
                );
            }
            Some(points)
        } else {
            None
        };

        out.push(FaceBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: score,
            landmarks: points,
        });
    }
}

/// Drop every detection that overlaps a higher-confidence detection.
/// The result stays sorted by descending confidence.
fn non_max_suppress(mut faces: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    faces.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<FaceBox> = Vec::with_capacity(faces.len());
    for face in faces {
        if kept.iter().all(|k| iou(k, &face) <= iou_threshold) {
            kept.push(face);
        }
    }
    kept
}

/// Intersection-over-union of two boxes.
fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let left = a.x.max(b.x);
    let top = a.y.max(b.y);
    let right = (a.x + a.width).min(b.x + b.width);
    let bottom = (a.y + a.height).min(b.y + b.height);

    let overlap = (right - left).max(0.0) * (bottom - top).max(0.0);
    let union = a.width * a.height + b.width * b.height - overlap;
    if union > 0.0 {
        overlap / union
    } else {
        0.0
    }
}
