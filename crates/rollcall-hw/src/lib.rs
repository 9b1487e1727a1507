//! rollcall-hw — hardware abstraction for camera capture.
//!
//! V4L2 camera access plus the pixel format conversions the rest of the
//! system works in: grayscale for recognition, RGB for the preview.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, CameraStream, DeviceInfo, PixelFormat};
pub use frame::Frame;
