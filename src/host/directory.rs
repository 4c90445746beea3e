use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::info;

use super::{DownloadHandle, Downloads};
use crate::error::HostError;
use crate::raster::RasterPayload;

/// Downloads into a directory on disk.
///
/// A handle is a staged temporary file inside the target directory. Saving
/// copies it to its final name, never overwriting an existing file;
/// releasing deletes the staged file.
#[derive(Debug)]
pub struct DirectoryDownloads {
    dir: PathBuf,
    next_id: AtomicU64,
    staged: Mutex<HashMap<u64, NamedTempFile>>,
}

impl DirectoryDownloads {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            next_id: AtomicU64::new(0),
            staged: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn io_error(&self, source: std::io::Error) -> HostError {
        HostError::Io {
            path: self.dir.clone(),
            source,
        }
    }
}

#[async_trait]
impl Downloads for DirectoryDownloads {
    async fn create_handle(&self, payload: RasterPayload) -> Result<DownloadHandle, HostError> {
        let dir = self.dir.clone();
        let staged = tokio::task::spawn_blocking(move || stage(&dir, payload.bytes()))
            .await
            .map_err(|e| self.io_error(std::io::Error::other(e)))?
            .map_err(|e| self.io_error(e))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, staged);
        Ok(DownloadHandle::new(id))
    }

    async fn save(&self, handle: &DownloadHandle, filename: &str) -> Result<(), HostError> {
        let name = Path::new(filename)
            .file_name()
            .ok_or_else(|| HostError::Rejected(format!("not a file name: {filename:?}")))?;
        let staged_path = self
            .staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&handle.id())
            .map(|file| file.path().to_path_buf())
            .ok_or(HostError::UnknownHandle(handle.id()))?;

        let dest = unique_destination(&self.dir, Path::new(name));
        tokio::fs::copy(&staged_path, &dest).await.map_err(|source| HostError::Io {
            path: dest.clone(),
            source,
        })?;
        info!(path = %dest.display(), "saved download");
        Ok(())
    }

    fn release(&self, handle: DownloadHandle) {
        // Dropping the temp file deletes it.
        self.staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.id());
    }
}

/// Writes the payload to a fresh temporary file inside `dir`.
fn stage(dir: &Path, bytes: &[u8]) -> std::io::Result<NamedTempFile> {
    std::fs::create_dir_all(dir)?;
    let mut staged = tempfile::Builder::new()
        .prefix(".qrbatch-")
        .suffix(".part")
        .tempfile_in(dir)?;
    staged.write_all(bytes)?;
    staged.flush()?;
    Ok(staged)
}

/// `dir/name`, or `dir/stem (n).ext` for the first free `n` if taken.
fn unique_destination(dir: &Path, name: &Path) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let stem = name.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let ext = name.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();
    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("{stem} ({n}){ext}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
