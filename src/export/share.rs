/// Sharing rendered sheets and saving files to the export folder

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::document::NamedFile;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShareError {
    #[error("El sistema no soporta compartir archivos.")]
    Unsupported,
    #[error("no se pudo compartir: {0}")]
    Failed(String),
    #[error("no se pudo guardar {file}: {reason}")]
    Save { file: String, reason: String },
}

/// Native share surface (share sheet, intent chooser...)
pub trait ShareSink: Send + Sync {
    fn share(&self, title: &str, text: &str, files: &[NamedFile]) -> Result<(), ShareError>;
}

/// Desktop builds have no share sheet to hand files to
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopShare;

impl ShareSink for DesktopShare {
    fn share(&self, _title: &str, _text: &str, _files: &[NamedFile]) -> Result<(), ShareError> {
        Err(ShareError::Unsupported)
    }
}

/// How a share request ended up being delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareOutcome {
    Shared(usize),
    /// No share surface, files were written to this folder instead
    Saved { dir: PathBuf, count: usize },
}

/// Write each file into `dir`, creating it if needed. Existing files are overwritten.
pub fn save_files(dir: &Path, files: &[NamedFile]) -> Result<Vec<PathBuf>, ShareError> {
    std::fs::create_dir_all(dir).map_err(|e| ShareError::Save {
        file: dir.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let path = dir.join(&file.name);
        std::fs::write(&path, &file.bytes).map_err(|e| ShareError::Save {
            file: file.name.clone(),
            reason: e.to_string(),
        })?;
        info!("💾 Saved {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// Hand files to the share surface, falling back to one download per file
/// in `fallback_dir` when sharing is not supported
pub fn share_or_save(
    sink: &dyn ShareSink,
    fallback_dir: &Path,
    files: &[NamedFile],
) -> Result<ShareOutcome, ShareError> {
    match sink.share("Hojas de vida", "Adjunto registros.", files) {
        Ok(()) => Ok(ShareOutcome::Shared(files.len())),
        Err(ShareError::Unsupported) => {
            warn!("Share not supported, saving {} files instead", files.len());
            save_files(fallback_dir, files)?;
            Ok(ShareOutcome::Saved {
                dir: fallback_dir.to_path_buf(),
                count: files.len(),
            })
        }
        Err(e) => Err(e),
    }
}
