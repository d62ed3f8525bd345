//! Thumbnails of matched images, in the order they were found.

use crate::matcher::MatchedImage;
use anyhow::{Context, Result};
use image::RgbaImage;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub path: PathBuf,
    pub distance: f32,
    /// `None` when the file could not be thumbnailed; drawn as a placeholder.
    pub thumbnail: Option<RgbaImage>,
}

#[derive(Debug, Clone, Default)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    pub fn from_matches(matches: &[MatchedImage], max_box: u32) -> Self {
        let mut gallery = Self::default();
        gallery.show(matches, max_box);
        gallery
    }

    /// Append one entry per match, bounded to `max_box` pixels square.
    pub fn show(&mut self, matches: &[MatchedImage], max_box: u32) {
        for hit in matches {
            let thumbnail = match make_thumbnail(&hit.path, max_box) {
                Ok(thumb) => Some(thumb),
                Err(e) => {
                    tracing::warn!("Failed to load thumbnail for {}: {e:#}", hit.path.display());
                    None
                }
            };
            self.entries.push(GalleryEntry {
                path: hit.path.clone(),
                distance: hit.distance,
                thumbnail,
            });
        }
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Decode `path` and shrink it to fit inside `max_box` x `max_box`,
/// keeping the aspect ratio. Small images are left at their size.
pub fn make_thumbnail(path: &Path, max_box: u32) -> Result<RgbaImage> {
    let img = image::open(path)
        .with_context(|| format!("cannot open image: {}", path.display()))?;
    let max_box = max_box.max(1);
    let thumb = if img.width() > max_box || img.height() > max_box {
        img.thumbnail(max_box, max_box)
    } else {
        img
    };
    Ok(thumb.to_rgba8())
}
