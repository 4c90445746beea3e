use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{Clipboard, DownloadHandle, Downloads};
use crate::error::HostError;
use crate::raster::RasterPayload;

/// Clipboard kept in memory. Image support and rejections are switchable.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    images: AtomicBool,
    reject: Mutex<Option<String>>,
    text: Mutex<Option<String>>,
    image: Mutex<Option<(Vec<u8>, String)>>,
    writes: AtomicU64,
}

impl MemoryClipboard {
    /// A clipboard that accepts both text and images.
    pub fn new() -> Self {
        Self {
            images: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// A clipboard that only accepts text.
    pub fn text_only() -> Self {
        Self::default()
    }

    pub fn set_image_support(&self, supported: bool) {
        self.images.store(supported, Ordering::SeqCst);
    }

    /// Makes every following write fail with `message`; `None` restores.
    pub fn reject_with(&self, message: Option<&str>) {
        *lock(&self.reject) = message.map(str::to_string);
    }

    pub fn text(&self) -> Option<String> {
        lock(&self.text).clone()
    }

    /// Last image written, with its MIME type.
    pub fn image(&self) -> Option<(Vec<u8>, String)> {
        lock(&self.image).clone()
    }

    /// Number of successful writes.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), HostError> {
        match lock(&self.reject).as_deref() {
            Some(message) => Err(HostError::Rejected(message.to_string())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    async fn write_text(&self, text: &str) -> Result<(), HostError> {
        self.check()?;
        *lock(&self.text) = Some(text.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn supports_images(&self) -> bool {
        self.images.load(Ordering::SeqCst)
    }

    async fn write_image(&self, payload: &[u8], mime_type: &str) -> Result<(), HostError> {
        self.check()?;
        *lock(&self.image) = Some((payload.to_vec(), mime_type.to_string()));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Download service kept in memory; tracks handles still alive.
#[derive(Debug, Default)]
pub struct MemoryDownloads {
    next_id: AtomicU64,
    staged: Mutex<HashMap<u64, RasterPayload>>,
    saved: Mutex<Vec<(String, Vec<u8>)>>,
    reject: Mutex<Option<String>>,
}

impl MemoryDownloads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following save fail with `message`; `None` restores.
    pub fn reject_with(&self, message: Option<&str>) {
        *lock(&self.reject) = message.map(str::to_string);
    }

    /// Handles created and not yet released.
    pub fn live_handles(&self) -> usize {
        lock(&self.staged).len()
    }

    /// Files saved so far, in order, as (filename, bytes).
    pub fn saved(&self) -> Vec<(String, Vec<u8>)> {
        lock(&self.saved).clone()
    }
}

#[async_trait]
impl Downloads for MemoryDownloads {
    async fn create_handle(&self, payload: RasterPayload) -> Result<DownloadHandle, HostError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.staged).insert(id, payload);
        Ok(DownloadHandle::new(id))
    }

    async fn save(&self, handle: &DownloadHandle, filename: &str) -> Result<(), HostError> {
        if let Some(message) = lock(&self.reject).clone() {
            return Err(HostError::Rejected(message));
        }
        let bytes = lock(&self.staged)
            .get(&handle.id())
            .map(|p| p.bytes().to_vec())
            .ok_or(HostError::UnknownHandle(handle.id()))?;
        lock(&self.saved).push((filename.to_string(), bytes));
        Ok(())
    }

    fn release(&self, handle: DownloadHandle) {
        lock(&self.staged).remove(&handle.id());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
