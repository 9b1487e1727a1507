//! rollcall-core — face detection, embedding extraction, and gallery matching.
//!
//! Detection uses SCRFD and embeddings use ArcFace, both running on CPU via
//! ONNX Runtime. Matching is nearest-neighbor Euclidean distance against the
//! enrolled gallery.

pub mod alignment;
pub mod detector;
pub mod embedder;
pub mod engine;
pub mod gallery;
pub mod matcher;
pub mod types;

pub use engine::{EngineError, FaceEngine, OnnxEngine};
pub use gallery::{load_gallery, Gallery, GalleryError};
pub use matcher::{match_embedding, MatchOutcome, DEFAULT_MATCH_THRESHOLD};
pub use types::{Embedding, FaceBox, GalleryEntry};
