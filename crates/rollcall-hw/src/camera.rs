//! V4L2 camera capture via the `v4l` crate.

use crate::frame::{self, Frame};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const REQUESTED_WIDTH: u32 = 640;
const REQUESTED_HEIGHT: u32 = 480;
const STREAM_BUFFERS: u32 = 4;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("frame conversion failed: {0}")]
    Conversion(#[from] frame::FrameError),
}

/// Negotiated pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed, 2 bytes per pixel.
    Yuyv,
    /// 8-bit grayscale, 1 byte per pixel.
    Grey,
}

/// Info about a discovered V4L2 capture device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
}

/// An open V4L2 camera with a negotiated format.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pixel_format: PixelFormat,
}

impl Camera {
    /// Open a camera device by path (e.g. `/dev/video0`).
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device
            .query_caps()
            .map_err(|e| CameraError::CaptureFailed(format!("cannot query capabilities: {e}")))?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        let mut fmt = device
            .format()
            .map_err(|e| CameraError::FormatNegotiationFailed(format!("cannot get format: {e}")))?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = REQUESTED_WIDTH;
        fmt.height = REQUESTED_HEIGHT;

        let negotiated = device
            .set_format(&fmt)
            .map_err(|e| CameraError::FormatNegotiationFailed(format!("cannot set format: {e}")))?;

        let pixel_format = if negotiated.fourcc == FourCC::new(b"YUYV") {
            PixelFormat::Yuyv
        } else if negotiated.fourcc == FourCC::new(b"GREY") {
            PixelFormat::Grey
        } else {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format {:?} (need YUYV or GREY)",
                negotiated.fourcc
            )));
        };

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?negotiated.fourcc,
            "negotiated format"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            pixel_format,
        })
    }

    /// Start a memory-mapped capture stream borrowing this camera.
    pub fn stream(&self) -> Result<CameraStream<'_>, CameraError> {
        let stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| CameraError::CaptureFailed(format!("cannot create mmap stream: {e}")))?;
        Ok(CameraStream {
            stream,
            width: self.width,
            height: self.height,
            pixel_format: self.pixel_format,
        })
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(device) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = device.query_caps() else {
                continue;
            };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
            });
        }

        devices
    }
}

/// A running capture stream; frames are dequeued one at a time.
pub struct CameraStream<'a> {
    stream: MmapStream<'a>,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
}

impl CameraStream<'_> {
    /// Dequeue the next frame and convert it once to grayscale and RGB.
    pub fn next_frame(&mut self) -> Result<Frame, CameraError> {
        let (buf, meta) = self
            .stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("cannot dequeue buffer: {e}")))?;

        let (gray, rgb) = match self.pixel_format {
            PixelFormat::Yuyv => (
                frame::yuyv_to_gray(buf, self.width, self.height)?,
                frame::yuyv_to_rgb(buf, self.width, self.height)?,
            ),
            PixelFormat::Grey => {
                let pixels = (self.width * self.height) as usize;
                if buf.len() < pixels {
                    return Err(CameraError::CaptureFailed(format!(
                        "GREY buffer too short: expected {pixels} bytes, got {}",
                        buf.len()
                    )));
                }
                let gray = buf[..pixels].to_vec();
                let rgb = frame::gray_to_rgb(&gray);
                (gray, rgb)
            }
        };

        Ok(Frame {
            gray,
            rgb,
            width: self.width,
            height: self.height,
            sequence: meta.sequence,
        })
    }
}
