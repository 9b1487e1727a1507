use std::path::PathBuf;

/// Runtime configuration, loaded from `ROLLCALL_*` environment variables.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Maximum embedding distance accepted as a positive match.
    pub match_threshold: f32,
    /// Recognize every Nth captured frame.
    pub frame_stride: u64,
    /// Integer downsample factor applied before detection.
    pub detect_downsample: u32,
    /// Frames to discard at startup while auto-exposure settles.
    pub warmup_frames: usize,
    /// Directory receiving the dated attendance CSVs.
    pub log_dir: PathBuf,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            camera_device: std::env::var("ROLLCALL_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_dir: std::env::var("ROLLCALL_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("models")),
            match_threshold: env_f32(
                "ROLLCALL_MATCH_THRESHOLD",
                rollcall_core::DEFAULT_MATCH_THRESHOLD,
            ),
            frame_stride: env_u64("ROLLCALL_FRAME_STRIDE", 5).max(1),
            detect_downsample: env_u32("ROLLCALL_DETECT_DOWNSAMPLE", 2).max(1),
            warmup_frames: env_usize("ROLLCALL_WARMUP_FRAMES", 4),
            log_dir: std::env::var("ROLLCALL_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join("det_10g.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the ArcFace embedding model.
    pub fn embedding_model_path(&self) -> String {
        self.model_dir
            .join("w600k_r50.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
