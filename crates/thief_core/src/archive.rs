use anyhow::{Context, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// No matches, so no file was created.
    NothingToDownload,
    Written { path: PathBuf, files: usize },
}

impl ArchiveOutcome {
    pub fn message(&self) -> String {
        match self {
            ArchiveOutcome::NothingToDownload => "No images to download.".to_string(),
            ArchiveOutcome::Written { path, files } => {
                format!("Saved {files} images to {}", path.display())
            }
        }
    }
}

/// Write every matched file into a zip at `dest`, stored under its base name.
pub fn export_archive(matches: &[PathBuf], dest: impl AsRef<Path>) -> Result<ArchiveOutcome> {
    let dest = dest.as_ref();
    if matches.is_empty() {
        tracing::info!("no matched images to download");
        return Ok(ArchiveOutcome::NothingToDownload);
    }

    let file = File::create(dest)
        .with_context(|| format!("cannot create archive: {}", dest.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in matches {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("no file name in {}", path.display()))?;
        let mut src =
            File::open(path).with_context(|| format!("cannot read {}", path.display()))?;
        zip.start_file(name, options)?;
        io::copy(&mut src, &mut zip)?;
    }
    zip.finish()?;

    tracing::info!(files = matches.len(), "archive written to {}", dest.display());
    Ok(ArchiveOutcome::Written {
        path: dest.to_path_buf(),
        files: matches.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;
    use tempfile::tempdir;
    use zip::ZipArchive;

    #[test]
    fn empty_match_list_creates_no_file() -> Result<()> {
        let dir = tempdir()?;
        let dest = dir.path().join("out.zip");
        let outcome = export_archive(&[], &dest)?;
        assert_eq!(outcome, ArchiveOutcome::NothingToDownload);
        assert_eq!(outcome.message(), "No images to download.");
        assert!(!dest.exists());
        Ok(())
    }

    #[test]
    fn archive_holds_files_under_base_names() -> Result<()> {
        let dir = tempdir()?;
        let sub = dir.path().join("shots");
        fs::create_dir(&sub)?;
        let a = sub.join("a.jpg");
        let b = sub.join("b.png");
        fs::write(&a, b"first")?;
        fs::write(&b, b"second")?;
        let dest = dir.path().join("matches.zip");

        let outcome = export_archive(&[a, b], &dest)?;
        assert_eq!(
            outcome,
            ArchiveOutcome::Written { path: dest.clone(), files: 2 }
        );

        let mut zip = ZipArchive::new(File::open(&dest)?)?;
        let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["a.jpg", "b.png"]);
        let mut body = String::new();
        zip.by_name("b.png")?.read_to_string(&mut body)?;
        assert_eq!(body, "second");
        Ok(())
    }

    #[test]
    fn unreadable_match_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let dest = dir.path().join("out.zip");
        let err = export_archive(&[dir.path().join("gone.jpg")], &dest).unwrap_err();
        assert!(format!("{err:#}").contains("gone.jpg"));
        Ok(())
    }

    #[test]
    fn unwritable_destination_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("a.jpg");
        fs::write(&src, b"x")?;
        let dest = dir.path().join("missing").join("out.zip");
        assert!(export_archive(&[src], &dest).is_err());
        Ok(())
    }
}
