//! Error types for every stage of the pipeline.
//!
//! Raster and precondition failures are terminal for the call that raised
//! them. They are turned into feedback state at the action layer and never
//! escape past it.

use std::path::PathBuf;

use crate::actions::ActionKind;

/// Failure while producing the vector rendering of a code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("data too long for a QR code ({0} bytes)")]
    DataTooLong(usize),
    #[error("cannot encode text as a QR code: {0}")]
    Unencodable(String),
}

/// Failure while converting a rendered vector code into a PNG payload.
///
/// Each variant names the stage that failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RasterError {
    #[error("svg to png conversion failed: rendering surface reference is not valid")]
    RefInvalid,
    #[error("svg to png conversion failed: no vector node found inside the rendering surface")]
    NodeMissing,
    #[error("svg to png conversion failed: invalid size {0}")]
    InvalidSize(f64),
    #[error("svg to png conversion failed: image decode: {0}")]
    ImageDecodeFailed(String),
    #[error("svg to png conversion failed: png encode: {0}")]
    EncodeFailed(String),
}

/// Rejection reported by a host clipboard or download service.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("{0}")]
    Rejected(String),
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}")]
    CommandFailed { command: String, status: String },
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unknown download handle {0}")]
    UnknownHandle(u64),
}

/// Failure of one action on one item.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("No text to copy.")]
    NoText,
    #[error("Clipboard API for images not supported.")]
    ClipboardImageUnsupported,
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error("{operation} failed: {source}")]
    Host {
        operation: ActionKind,
        source: HostError,
    },
}

impl ActionError {
    pub(crate) fn host(operation: ActionKind) -> impl FnOnce(HostError) -> Self {
        move |source| ActionError::Host { operation, source }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
}
