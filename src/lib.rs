//! # qrbatch
//!
//! A Rust library for generating batches of QR codes from multi-line text and exporting them.
//!
//! `qrbatch` turns every non-blank line of an input text into its own QR code. Each code comes with
//! three actions: copy the source text, copy the code as a PNG image, or download the PNG. One code
//! at a time can be shown in a larger, enlarged view with its own set of actions.
//!
//! ## Features
//!
//! - Split input into items: one per line, trimmed, blank lines dropped, duplicates kept.
//! - Render each item as SVG (error correction level H, black on white).
//! - Rasterize the SVG into a white-backed PNG of an exact pixel size.
//! - Per-item action feedback (`idle`, `pending`, `succeeded`, `failed`) that reverts after 1.5 s.
//! - Pluggable clipboard and download services, with in-memory, command and directory backends.
//! - Safe Rust implementation with no unsafe code.
//!
//! ## Example
//!
//! Generate a batch and download every code into a directory:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use qrbatch::batch::{BatchCoordinator, Viewport};
//! use qrbatch::host::{DirectoryDownloads, HostServices, MemoryClipboard};
//! use qrbatch::item::RenderContext;
//! use qrbatch::render::QrSvgRenderer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let host = HostServices::new(Arc::new(MemoryClipboard::new()), Arc::new(DirectoryDownloads::new("codes")));
//!     let ctx = RenderContext::new(Arc::new(QrSvgRenderer::default()), host);
//!     let mut batch = BatchCoordinator::new(ctx, Viewport::new(1280.0, 800.0));
//!
//!     batch.set_input_text("https://example.com\nhello");
//!     for item in batch.generate() {
//!         if let Err(err) = item.actions().download_image().await {
//!             eprintln!("{}: {err}", item.text());
//!         }
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`sanitize`]: Filename sanitizing for downloads.
//! - [`render`]: SVG rendering of codes and rendering surfaces.
//! - [`raster`]: SVG to PNG conversion.
//! - [`host`]: Clipboard and download services.
//! - [`actions`]: Copy and download actions with per-instance feedback.
//! - [`item`]: One rendered code with its actions.
//! - [`batch`]: The generated batch and the enlarged view.
//! - [`config`]: Persisted settings.

#![forbid(unsafe_code)]

pub mod actions;
pub mod batch;
pub mod config;
pub mod error;
pub mod host;
pub mod item;
pub mod raster;
pub mod render;
pub mod sanitize;

pub use actions::{ActionController, ActionKind, ButtonView, FeedbackState};
pub use batch::{split_items, BatchCoordinator, Viewport};
pub use error::{ActionError, HostError, RasterError, RenderError};
pub use item::{Activation, ItemRenderer, Placement, RenderContext};
pub use raster::{to_raster, RasterPayload};
pub use sanitize::sanitize_filename;
