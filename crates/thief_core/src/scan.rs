use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File name suffixes accepted as candidate images. Matching is case-sensitive.
pub const IMAGE_SUFFIXES: [&str; 3] = [".png", ".jpg", ".jpeg"];

/// Images found directly inside a user-chosen folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSet {
    pub folder: PathBuf,
    /// Candidate paths in directory listing order.
    pub images: Vec<PathBuf>,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// List the candidate images in `path` (non-recursive).
pub fn scan_candidates(path: impl AsRef<Path>) -> Result<CandidateSet> {
    let root = path.as_ref();
    if !root.exists() {
        anyhow::bail!("Path does not exist: {}", root.display());
    }
    if !root.is_dir() {
        anyhow::bail!("Path is not a directory: {}", root.display());
    }

    let mut images: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("walkdir error: {}", e);
                continue;
            }
        };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if is_candidate_image(path) {
            images.push(path.to_path_buf());
        }
    }

    tracing::info!(
        folder = %root.display(),
        count = images.len(),
        "selected image folder"
    );
    Ok(CandidateSet {
        folder: root.to_path_buf(),
        images,
    })
}

pub fn is_candidate_image(path: &Path) -> bool {
    match path.file_name().and_then(|s| s.to_str()) {
        Some(name) => IMAGE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)),
        None => false,
    }
}
