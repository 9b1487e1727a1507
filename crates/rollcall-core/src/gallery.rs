//! Enrollment: build the gallery from a directory of reference photos.

use crate::engine::FaceEngine;
use crate::types::GalleryEntry;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extensions recognized as reference photos (compared case-insensitively).
const PHOTO_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("cannot read gallery directory {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no usable faces in {} — every image was skipped", .0.display())]
    NoUsableFaces(PathBuf),
}

/// The enrolled set: names and reference embeddings, index-aligned.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    pub fn from_entries(entries: Vec<GalleryEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scan `dir` for reference photos and enroll one person per usable image.
///
/// The person's name is the file stem; only the first (highest confidence)
/// face in an image is used. Unreadable images and images without a
/// detectable face are skipped with a warning. Fails only when the directory
/// cannot be read or yields zero usable embeddings.
pub fn load_gallery(dir: &Path, engine: &mut dyn FaceEngine) -> Result<Gallery, GalleryError> {
    let read_dir = std::fs::read_dir(dir).map_err(|source| GalleryError::Unreadable {
        path: dir.to_path_buf(),
        source,
    })?;

    // Sorted order keeps enrollment (and matcher tie-breaks) deterministic.
    let mut photos: Vec<PathBuf> = read_dir
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_photo(path))
        .collect();
    photos.sort();

    let mut entries = Vec::new();
    for path in &photos {
        let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let image = match image::open(path) {
            Ok(image) => image.to_luma8(),
            Err(error) => {
                tracing::warn!(file = %path.display(), %error, "cannot decode image, skipping");
                continue;
            }
        };
        let (width, height) = image.dimensions();

        let faces = match engine.detect(image.as_raw(), width, height) {
            Ok(faces) => faces,
            Err(error) => {
                tracing::warn!(file = %path.display(), %error, "detection failed, skipping");
                continue;
            }
        };
        let Some(face) = faces.first() else {
            tracing::warn!(file = %path.display(), "no face detected, skipping");
            continue;
        };

        let embedding = match engine.embed(image.as_raw(), width, height, face) {
            Ok(embedding) => embedding,
            Err(error) => {
                tracing::warn!(file = %path.display(), %error, "embedding failed, skipping");
                continue;
            }
        };

        tracing::info!(name, file = %path.display(), "enrolled");
        entries.push(GalleryEntry { name: name.to_owned(), embedding });
    }

    if entries.is_empty() {
        return Err(GalleryError::NoUsableFaces(dir.to_path_buf()));
    }
    Ok(Gallery { entries })
}

fn is_photo(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| PHOTO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, FaceEngine};
    use crate::types::{Embedding, FaceBox};

    /// Unique per-test directory, removed on drop.
    struct TempDir {
        path: PathBuf,
    }

    impl TempDir {
        fn new(tag: &str) -> Self {
            let path = std::env::temp_dir()
                .join(format!("rollcall_gallery_{tag}_{}", std::process::id()));
            let _ = std::fs::remove_dir_all(&path);
            std::fs::create_dir_all(&path).unwrap();
            Self { path }
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }

    /// Finds one face in any image at least 4 px wide; the embedding is the
    /// mean pixel value, so different test images stay distinguishable.
    struct StubEngine;

    impl FaceEngine for StubEngine {
        fn detect(
            &mut self,
            _gray: &[u8],
            width: u32,
            height: u32,
        ) -> Result<Vec<FaceBox>, EngineError> {
            if width < 4 {
                return Ok(Vec::new());
            }
            Ok(vec![FaceBox {
                x: 0.0,
                y: 0.0,
                width: width as f32,
                height: height as f32,
                confidence: 0.9,
                landmarks: None,
            }])
        }

        fn embed(
            &mut self,
            gray: &[u8],
            _width: u32,
            _height: u32,
            _face: &FaceBox,
        ) -> Result<Embedding, EngineError> {
            let mean = gray.iter().map(|&p| p as f32).sum::<f32>() / gray.len() as f32;
            Ok(Embedding { values: vec![mean] })
        }
    }

    fn write_photo(dir: &Path, name: &str, side: u32, value: u8) {
        let photo = image::GrayImage::from_pixel(side, side, image::Luma([value]));
        photo.save(dir.join(name)).unwrap();
    }

    #[test]
    fn enrolls_one_entry_per_usable_photo() {
        let tmp = TempDir::new("usable");
        write_photo(&tmp.path, "alice.png", 8, 100);
        write_photo(&tmp.path, "bob.jpg", 8, 200);
        // The stub finds no face in a 2 px image; counts as a skipped file.
        write_photo(&tmp.path, "faceless.png", 2, 50);
        std::fs::write(tmp.path.join("notes.txt"), "not a photo").unwrap();

        let gallery = load_gallery(&tmp.path, &mut StubEngine).unwrap();

        assert_eq!(gallery.len(), 2);
        assert_eq!(gallery.names().collect::<Vec<_>>(), ["alice", "bob"]);
    }

    #[test]
    fn extension_filter_is_case_insensitive() {
        let tmp = TempDir::new("upper");
        write_photo(&tmp.path, "carol.PNG", 8, 80);

        let gallery = load_gallery(&tmp.path, &mut StubEngine).unwrap();
        assert_eq!(gallery.names().collect::<Vec<_>>(), ["carol"]);
    }

    #[test]
    fn zero_usable_faces_is_fatal() {
        let tmp = TempDir::new("empty");
        write_photo(&tmp.path, "faceless.png", 2, 50);

        let result = load_gallery(&tmp.path, &mut StubEngine);
        assert!(matches!(result, Err(GalleryError::NoUsableFaces(_))));
    }

    #[test]
    fn missing_directory_is_fatal() {
        let result = load_gallery(Path::new("/nonexistent/rollcall-gallery"), &mut StubEngine);
        assert!(matches!(result, Err(GalleryError::Unreadable { .. })));
    }
}
