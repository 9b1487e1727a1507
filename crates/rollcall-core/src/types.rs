/// Bounding box for a detected face, with optional five-point landmarks.
#[derive(Debug, Clone)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// [left eye, right eye, nose, left mouth corner, right mouth corner].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl FaceBox {
    /// Uniformly scale all coordinates, mapping a detection made on a
    /// downsampled frame back to full resolution.
    pub fn scaled(&self, factor: f32) -> FaceBox {
        FaceBox {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
            confidence: self.confidence,
            landmarks: self
                .landmarks
                .map(|points| points.map(|(x, y)| (x * factor, y * factor))),
        }
    }
}

/// Face embedding vector (512-dimensional for ArcFace, L2-normalized).
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// Euclidean distance to another embedding.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// One enrolled person: a name and the reference embedding it was built from.
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub name: String,
    pub embedding: Embedding,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        let a = Embedding { values: vec![0.5, -0.5, 1.0] };
        assert_eq!(a.euclidean_distance(&a), 0.0);
    }

    #[test]
    fn distance_is_euclidean() {
        let a = Embedding { values: vec![0.0, 0.0] };
        let b = Embedding { values: vec![3.0, 4.0] };
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Embedding { values: vec![1.0, 2.0, 3.0] };
        let b = Embedding { values: vec![-1.0, 0.5, 2.0] };
        assert_eq!(a.euclidean_distance(&b), b.euclidean_distance(&a));
    }

    #[test]
    fn scaled_box_scales_everything_but_confidence() {
        let face = FaceBox {
            x: 10.0,
            y: 20.0,
            width: 30.0,
            height: 40.0,
            confidence: 0.9,
            landmarks: Some([(1.0, 2.0); 5]),
        };
        let scaled = face.scaled(2.0);
        assert_eq!(scaled.x, 20.0);
        assert_eq!(scaled.y, 40.0);
        assert_eq!(scaled.width, 60.0);
        assert_eq!(scaled.height, 80.0);
        assert_eq!(scaled.confidence, 0.9);
        assert_eq!(scaled.landmarks.unwrap()[0], (2.0, 4.0));
    }
}
