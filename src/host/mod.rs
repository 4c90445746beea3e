//! Host platform services: clipboard and file download.
//!
//! Actions only talk to the traits below. In-memory implementations back
//! the tests, `CommandClipboard` and `DirectoryDownloads` back the CLI.

mod command;
mod directory;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HostError;
use crate::raster::RasterPayload;

pub use command::{CommandClipboard, MIME_PLACEHOLDER};
pub use directory::DirectoryDownloads;
pub use memory::{MemoryClipboard, MemoryDownloads};

/// Clipboard of the host.
#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), HostError>;

    /// Whether image writes are available right now. Probe before every
    /// [`Clipboard::write_image`].
    fn supports_images(&self) -> bool;

    async fn write_image(&self, payload: &[u8], mime_type: &str) -> Result<(), HostError>;
}

/// Temporary resource a download service allocates for one payload.
///
/// Not `Clone`: exactly one owner gives it back through
/// [`Downloads::release`].
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct DownloadHandle {
    id: u64,
}

impl DownloadHandle {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// File download service of the host.
#[async_trait]
pub trait Downloads: Send + Sync {
    /// Stages `payload` and returns a handle to it.
    async fn create_handle(&self, payload: RasterPayload) -> Result<DownloadHandle, HostError>;

    /// Triggers the download of a staged payload under `filename`.
    async fn save(&self, handle: &DownloadHandle, filename: &str) -> Result<(), HostError>;

    /// Frees whatever the handle holds. Safe to call once the download has
    /// been triggered.
    fn release(&self, handle: DownloadHandle);
}

/// A download handle released when dropped, whichever way the scope exits.
pub struct ScopedHandle<'a> {
    downloads: &'a dyn Downloads,
    handle: Option<DownloadHandle>,
}

impl<'a> ScopedHandle<'a> {
    pub async fn acquire(downloads: &'a dyn Downloads, payload: RasterPayload) -> Result<Self, HostError> {
        let handle = downloads.create_handle(payload).await?;
        Ok(Self {
            downloads,
            handle: Some(handle),
        })
    }

    pub async fn save(&self, filename: &str) -> Result<(), HostError> {
        match &self.handle {
            Some(handle) => self.downloads.save(handle, filename).await,
            None => Err(HostError::Rejected("download handle already released".to_string())),
        }
    }
}

impl Drop for ScopedHandle<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.downloads.release(handle);
        }
    }
}

/// The host services an action controller is wired to.
#[derive(Clone)]
pub struct HostServices {
    pub clipboard: Arc<dyn Clipboard>,
    pub downloads: Arc<dyn Downloads>,
}

impl HostServices {
    pub fn new(clipboard: Arc<dyn Clipboard>, downloads: Arc<dyn Downloads>) -> Self {
        Self { clipboard, downloads }
    }
}

impl std::fmt::Debug for HostServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostServices").finish_non_exhaustive()
    }
}
