//! Nearest-neighbor matching against the enrolled gallery.

use crate::types::{Embedding, GalleryEntry};

/// Default maximum Euclidean distance accepted as a positive match.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.5;

/// Result of matching one observed embedding against the gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    /// Name of the nearest gallery entry, when within the threshold.
    pub name: Option<String>,
    /// Distance to the nearest entry; infinite for an empty gallery.
    pub nearest_distance: f32,
}

/// Match an observed embedding against every gallery entry.
///
/// Takes the entry at minimum Euclidean distance and accepts it only when
/// that distance is strictly below `threshold`; otherwise the face is
/// unfamiliar (`name: None`). Equidistant minima resolve to the earliest
/// gallery entry. Pure function over its inputs.
pub fn match_embedding(
    probe: &Embedding,
    gallery: &[GalleryEntry],
    threshold: f32,
) -> MatchOutcome {
    let mut nearest: Option<usize> = None;
    let mut nearest_distance = f32::INFINITY;

    for (index, entry) in gallery.iter().enumerate() {
        let distance = probe.euclidean_distance(&entry.embedding);
        if distance < nearest_distance {
            nearest_distance = distance;
            nearest = Some(index);
        }
    }

    match nearest {
        Some(index) if nearest_distance < threshold => MatchOutcome {
            name: Some(gallery[index].name.clone()),
            nearest_distance,
        },
        _ => MatchOutcome { name: None, nearest_distance },
    }
}
