//! The live capture loop: read, display, sample, recognize, mark.

use crate::attendance::Session;
use crate::display::Preview;
use crate::recognition::{RecognizerHandle, Sighting};
use anyhow::{Context, Result};
use rollcall_hw::CameraStream;

pub struct CaptureOptions {
    /// Recognize every Nth captured frame.
    pub frame_stride: u64,
    /// Integer downsample factor applied before detection.
    pub detect_downsample: u32,
}

/// Run the capture loop until the operator quits or the camera fails.
///
/// Every frame is displayed. Every `frame_stride`-th frame is additionally
/// recognized; its sightings stay overlaid until the next processed frame
/// replaces them, so the preview stays smooth while recognition runs at a
/// fraction of the frame rate.
pub fn run(
    stream: &mut CameraStream<'_>,
    recognizer: &RecognizerHandle,
    session: &mut Session,
    preview: &mut Preview,
    options: &CaptureOptions,
) -> Result<()> {
    let mut frames_read: u64 = 0;
    let mut last_sightings: Vec<Sighting> = Vec::new();

    while preview.is_open() {
        let frame = match stream.next_frame() {
            Ok(frame) => frame,
            Err(error) => {
                tracing::error!(%error, "camera read failed, stopping capture");
                break;
            }
        };
        frames_read += 1;

        if frames_read % options.frame_stride == 0 {
            let (gray, width, height) = frame.downsampled_gray(options.detect_downsample);
            let sightings = recognizer
                .recognize(gray, width, height)
                .context("recognition failed")?;

            // Detection ran on the downsampled frame; map the boxes back
            // to full resolution before marking and drawing.
            let factor = options.detect_downsample.max(1) as f32;
            last_sightings = sightings
                .into_iter()
                .map(|s| Sighting { face: s.face.scaled(factor), name: s.name })
                .collect();

            mark_sightings(session, &last_sightings)
                .context("failed to append to the attendance ledger")?;
        }

        preview
            .present(&frame, &last_sightings)
            .context("failed to refresh the preview window")?;
    }

    Ok(())
}

/// Mark every recognized sighting; unfamiliar faces are ignored.
fn mark_sightings(session: &mut Session, sightings: &[Sighting]) -> std::io::Result<()> {
    for sighting in sightings {
        if let Some(name) = &sighting.name {
            session.mark(name)?;
        }
    }
    Ok(())
}
