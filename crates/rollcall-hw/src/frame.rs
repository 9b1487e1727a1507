//! Frame type and pixel format conversion.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("buffer too short: expected {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },
}

/// One captured camera frame, converted once into both working formats:
/// grayscale for recognition, RGB for the operator preview.
#[derive(Clone)]
pub struct Frame {
    pub gray: Vec<u8>,
    /// Packed RGB8, 3 bytes per pixel.
    pub rgb: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sequence: u32,
}

impl Frame {
    /// Box-filter downsample of the grayscale channel by an integer factor.
    ///
    /// Returns the smaller buffer with its dimensions. A factor of 1 (or 0)
    /// is a plain copy; trailing rows and columns that do not fill a whole
    /// block are dropped.
    pub fn downsampled_gray(&self, factor: u32) -> (Vec<u8>, u32, u32) {
        if factor <= 1 {
            return (self.gray.clone(), self.width, self.height);
        }

        let out_w = self.width / factor;
        let out_h = self.height / factor;
        let block = factor * factor;

        let mut out = Vec::with_capacity((out_w * out_h) as usize);
        for by in 0..out_h {
            for bx in 0..out_w {
                let mut sum = 0u32;
                for dy in 0..factor {
                    for dx in 0..factor {
                        let x = bx * factor + dx;
                        let y = by * factor + dy;
                        sum += self.gray[(y * self.width + x) as usize] as u32;
                    }
                }
                out.push((sum / block) as u8);
            }
        }
        (out, out_w, out_h)
    }
}

/// Extract the Y plane from packed YUYV 4:2:2 ([Y0, U, Y1, V] per pixel pair).
pub fn yuyv_to_gray(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::BufferTooShort { expected, actual: yuyv.len() });
    }
    Ok(yuyv[..expected].iter().step_by(2).copied().collect())
}

/// Convert packed YUYV 4:2:2 to RGB8 with the BT.601 studio-swing matrix.
/// Both pixels of a pair share the chroma pair.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::BufferTooShort { expected, actual: yuyv.len() });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for quad in yuyv[..expected].chunks_exact(4) {
        let (u, v) = (quad[1], quad[3]);
        for y in [quad[0], quad[2]] {
            let (r, g, b) = ycbcr_to_rgb(y, u, v);
            rgb.extend_from_slice(&[r, g, b]);
        }
    }
    Ok(rgb)
}

fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
    let luma = 1.164 * (y as f32 - 16.0);
    let d = cb as f32 - 128.0;
    let e = cr as f32 - 128.0;
    let clamp = |v: f32| v.round().clamp(0.0, 255.0) as u8;
    (
        clamp(luma + 1.596 * e),
        clamp(luma - 0.392 * d - 0.813 * e),
        clamp(luma + 2.017 * d),
    )
}

/// Replicate an 8-bit grayscale buffer into RGB8.
pub fn gray_to_rgb(gray: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(gray.len() * 3);
    for &p in gray {
        rgb.extend_from_slice(&[p, p, p]);
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_gray(gray: Vec<u8>, width: u32, height: u32) -> Frame {
        Frame { gray, rgb: Vec::new(), width, height, sequence: 0 }
    }

    #[test]
    fn yuyv_gray_takes_every_even_byte() {
        // 2×1 image: [Y0=100, U=128, Y1=200, V=128]
        let gray = yuyv_to_gray(&[100, 128, 200, 128], 2, 1).unwrap();
        assert_eq!(gray, vec![100, 200]);
    }

    #[test]
    fn yuyv_gray_4x2() {
        let yuyv: Vec<u8> = (0..16).collect();
        let gray = yuyv_to_gray(&yuyv, 4, 2).unwrap();
        assert_eq!(gray, vec![0, 2, 4, 6, 8, 10, 12, 14]);
    }

    #[test]
    fn yuyv_gray_rejects_short_buffers() {
        assert!(yuyv_to_gray(&[100, 128], 2, 1).is_err());
    }

    #[test]
    fn yuyv_rgb_neutral_chroma_is_grayscale() {
        // Neutral chroma (128): studio-swing white (235) and black (16).
        let rgb = yuyv_to_rgb(&[235, 128, 16, 128], 2, 1).unwrap();
        assert_eq!(rgb, vec![255, 255, 255, 0, 0, 0]);
    }

    #[test]
    fn yuyv_rgb_produces_three_bytes_per_pixel() {
        let yuyv = vec![128u8; 4 * 2 * 2];
        let rgb = yuyv_to_rgb(&yuyv, 4, 2).unwrap();
        assert_eq!(rgb.len(), 4 * 2 * 3);
    }

    #[test]
    fn yuyv_rgb_rejects_short_buffers() {
        assert!(yuyv_to_rgb(&[0, 0], 2, 1).is_err());
    }

    #[test]
    fn gray_rgb_replicates_each_pixel() {
        assert_eq!(gray_to_rgb(&[7, 200]), vec![7, 7, 7, 200, 200, 200]);
    }

    #[test]
    fn downsample_averages_blocks() {
        #[rustfmt::skip]
        let gray = vec![
            10, 20, 30, 40,
            10, 20, 30, 40,
            50, 50, 60, 60,
            50, 50, 60, 60,
        ];
        let frame = frame_with_gray(gray, 4, 4);
        let (small, w, h) = frame.downsampled_gray(2);
        assert_eq!((w, h), (2, 2));
        assert_eq!(small, vec![15, 35, 50, 60]);
    }

    #[test]
    fn downsample_factor_one_is_a_copy() {
        let frame = frame_with_gray(vec![1, 2, 3, 4], 2, 2);
        let (same, w, h) = frame.downsampled_gray(1);
        assert_eq!((w, h), (2, 2));
        assert_eq!(same, vec![1, 2, 3, 4]);
    }

    #[test]
    fn downsample_drops_partial_blocks() {
        let frame = frame_with_gray(vec![9; 5 * 3], 5, 3);
        let (small, w, h) = frame.downsampled_gray(2);
        assert_eq!((w, h), (2, 1));
        assert_eq!(small, vec![9, 9]);
    }
}
