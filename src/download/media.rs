//! Downloaded media artifacts and their work directories.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use super::DownloadError;

/// Extensions treated as video output.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "mkv", "m4v"];

/// Fresh per-request directory a strategy writes into.
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    /// Create a uniquely named directory under `parent`.
    pub fn create_in(parent: &Path) -> Result<Self, DownloadError> {
        let parent = std::path::absolute(parent)?;
        std::fs::create_dir_all(&parent)?;
        let dir = tempfile::Builder::new().prefix("vidfetch-").tempdir_in(&parent)?;
        Ok(Self { dir })
    }

    /// Absolute path of the directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Turn the directory into an artifact pointing at `file`.
    ///
    /// Fails if `file` is not an existing regular file.
    pub fn into_media(self, file: PathBuf) -> Result<DownloadedMedia, DownloadError> {
        if !file.is_file() {
            return Err(DownloadError::NoOutput);
        }
        Ok(DownloadedMedia { path: file, dir: self.dir })
    }

    /// Turn the directory into an artifact for the first video file it holds.
    pub async fn into_first_video(self) -> Result<DownloadedMedia, DownloadError> {
        let file = find_first_video(self.path()).await?.ok_or(DownloadError::NoOutput)?;
        self.into_media(file)
    }
}

/// A video fetched to local disk.
///
/// The artifact owns its work directory: `discard` (or dropping it) removes
/// the file together with anything else the strategy left behind.
pub struct DownloadedMedia {
    path: PathBuf,
    dir: TempDir,
}

impl DownloadedMedia {
    /// Absolute path of the video file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used when presenting the file to a client.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string())
    }

    /// Remove the file and its work directory.
    pub async fn discard(self) {
        let path = self.path;
        let dir = self.dir;
        match tokio::task::spawn_blocking(move || dir.close()).await {
            Ok(Ok(())) => debug!("Removed downloaded media {}", path.display()),
            Ok(Err(e)) => warn!("Failed to remove downloaded media {}: {}", path.display(), e),
            Err(e) => warn!("Cleanup task for {} failed: {}", path.display(), e),
        }
    }
}

impl std::fmt::Debug for DownloadedMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadedMedia").field("path", &self.path).finish()
    }
}

/// Whether a path looks like a video by its extension.
pub fn has_video_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.iter().any(|v| ext.eq_ignore_ascii_case(v)))
        .unwrap_or(false)
}

/// Find the first video file inside `dir`, searching subdirectories too.
///
/// Entries are visited in name order so the result is stable.
pub async fn find_first_video(dir: &Path) -> io::Result<Option<PathBuf>> {
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await?;
        let mut files = Vec::new();
        let mut dirs = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                dirs.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }

        files.sort();
        if let Some(found) = files.into_iter().find(|p| has_video_extension(p)) {
            return Ok(Some(found));
        }

        // Reverse so the smallest name is popped first
        dirs.sort();
        pending.extend(dirs.into_iter().rev());
    }

    Ok(None)
}
