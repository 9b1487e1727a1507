//! Landmark-based face alignment.
//!
//! Estimates a 4-DOF similarity transform (scale, rotation, translation)
//! from the five detected landmarks to the canonical InsightFace reference
//! positions and warps the face into a square crop for the embedder.

/// Canonical InsightFace landmark positions for a 112×112 crop:
/// left eye, right eye, nose tip, left mouth corner, right mouth corner.
const REFERENCE_POINTS: [(f32, f32); 5] = [
    (38.2946, 51.6963),
    (73.5318, 51.5014),
    (56.0252, 71.7366),
    (41.5493, 92.3655),
    (70.7299, 92.2041),
];

pub const ALIGNED_SIZE: usize = 112;

/// `[a, -b, tx; b, a, ty]` — scale and rotation packed into (a, b).
#[derive(Debug, Clone, Copy)]
struct Similarity {
    a: f32,
    b: f32,
    tx: f32,
    ty: f32,
}

impl Similarity {
    /// Least-squares fit mapping `src` points onto `dst` points.
    ///
    /// Each correspondence contributes two rows to the normal equations:
    ///   sx·a − sy·b + tx = dx
    ///   sy·a + sx·b + ty = dy
    fn fit(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Self {
        // [AᵀA | Aᵀb] as a 4×5 augmented system.
        let mut normal = [[0.0f32; 5]; 4];
        for i in 0..5 {
            let (sx, sy) = src[i];
            let (dx, dy) = dst[i];
            let rows = [([sx, -sy, 1.0, 0.0], dx), ([sy, sx, 0.0, 1.0], dy)];
            for (row, rhs) in rows {
                for j in 0..4 {
                    for k in 0..4 {
                        normal[j][k] += row[j] * row[k];
                    }
                    normal[j][4] += row[j] * rhs;
                }
            }
        }
        let [a, b, tx, ty] = solve(&mut normal);
        Self { a, b, tx, ty }
    }
}

/// Gaussian elimination with partial pivoting on the 4×5 augmented system.
fn solve(m: &mut [[f32; 5]; 4]) -> [f32; 4] {
    for col in 0..4 {
        let pivot_row = (col..4)
            .max_by(|&r, &s| m[r][col].abs().total_cmp(&m[s][col].abs()))
            .unwrap_or(col);
        m.swap(col, pivot_row);

        let pivot = m[col][col];
        if pivot.abs() < 1e-12 {
            // Degenerate landmarks; fall back to an identity-ish transform.
            return [1.0, 0.0, 0.0, 0.0];
        }

        for row in col + 1..4 {
            let factor = m[row][col] / pivot;
            for k in col..5 {
                m[row][k] -= factor * m[col][k];
            }
        }
    }

    let mut x = [0.0f32; 4];
    for row in (0..4).rev() {
        let mut acc = m[row][4];
        for k in row + 1..4 {
            acc -= m[row][k] * x[k];
        }
        x[row] = acc / m[row][row];
    }
    x
}

/// Warp the frame so the detected landmarks land on the reference points,
/// producing the aligned square crop. Out-of-frame samples read as black.
pub fn align_face(
    gray: &[u8],
    width: u32,
    height: u32,
    landmarks: &[(f32, f32); 5],
) -> Vec<u8> {
    let t = Similarity::fit(landmarks, &REFERENCE_POINTS);
    warp_to_crop(gray, width as usize, height as usize, &t)
}

fn warp_to_crop(gray: &[u8], width: usize, height: usize, t: &Similarity) -> Vec<u8> {
    let mut crop = vec![0u8; ALIGNED_SIZE * ALIGNED_SIZE];

    let det = t.a * t.a + t.b * t.b;
    if det < 1e-12 {
        return crop;
    }

    let sample = |x: i32, y: i32| -> f32 {
        if x >= 0 && (x as usize) < width && y >= 0 && (y as usize) < height {
            gray[y as usize * width + x as usize] as f32
        } else {
            0.0
        }
    };

    for oy in 0..ALIGNED_SIZE {
        for ox in 0..ALIGNED_SIZE {
            // Inverse similarity: undo the translation, then rotate and
            // scale back through the conjugate over the determinant.
            let dx = ox as f32 - t.tx;
            let dy = oy as f32 - t.ty;
            let sx = (t.a * dx + t.b * dy) / det;
            let sy = (t.a * dy - t.b * dx) / det;

            let x0 = sx.floor() as i32;
            let y0 = sy.floor() as i32;
            let fx = sx - x0 as f32;
            let fy = sy - y0 as f32;

            let top = sample(x0, y0) * (1.0 - fx) + sample(x0 + 1, y0) * fx;
            let bottom = sample(x0, y0 + 1) * (1.0 - fx) + sample(x0 + 1, y0 + 1) * fx;
            crop[oy * ALIGNED_SIZE + ox] =
                (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
        }
    }
    crop
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fitting_points_onto_themselves_is_the_identity() {
        let t = Similarity::fit(&REFERENCE_POINTS, &REFERENCE_POINTS);
        assert!((t.a - 1.0).abs() < 1e-4, "a = {}", t.a);
        assert!(t.b.abs() < 1e-4, "b = {}", t.b);
        assert!(t.tx.abs() < 1e-3, "tx = {}", t.tx);
        assert!(t.ty.abs() < 1e-3, "ty = {}", t.ty);
    }

    #[test]
    fn doubled_landmarks_fit_with_half_scale() {
        let src = REFERENCE_POINTS.map(|(x, y)| (x * 2.0, y * 2.0));
        let t = Similarity::fit(&src, &REFERENCE_POINTS);
        assert!((t.a - 0.5).abs() < 0.05, "a = {}, expected ~0.5", t.a);
        assert!(t.b.abs() < 0.05, "b = {}", t.b);
    }

    #[test]
    fn aligned_crop_has_fixed_size() {
        let frame = vec![128u8; 640 * 480];
        let crop = align_face(&frame, 640, 480, &REFERENCE_POINTS);
        assert_eq!(crop.len(), ALIGNED_SIZE * ALIGNED_SIZE);
    }

    #[test]
    fn landmark_neighborhood_maps_to_the_reference_position() {
        let (w, h) = (200usize, 200usize);
        let mut frame = vec![0u8; w * h];

        let src: [(f32, f32); 5] = [
            (80.0, 60.0),
            (120.0, 60.0),
            (100.0, 85.0),
            (85.0, 110.0),
            (115.0, 110.0),
        ];

        // A 5×5 bright patch at the left eye survives the bilinear warp.
        let (lx, ly) = (src[0].0 as usize, src[0].1 as usize);
        for y in ly - 2..=ly + 2 {
            for x in lx - 2..=lx + 2 {
                frame[y * w + x] = 255;
            }
        }

        let crop = align_face(&frame, w as u32, h as u32, &src);

        let ref_x = REFERENCE_POINTS[0].0.round() as usize;
        let ref_y = REFERENCE_POINTS[0].1.round() as usize;
        let mut brightest = 0u8;
        for y in ref_y - 1..=ref_y + 1 {
            for x in ref_x - 1..=ref_x + 1 {
                brightest = brightest.max(crop[y * ALIGNED_SIZE + x]);
            }
        }
        assert!(
            brightest > 100,
            "expected a bright patch near ({ref_x}, {ref_y}), max {brightest}"
        );
    }
}
