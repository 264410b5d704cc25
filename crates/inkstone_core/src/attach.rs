//! Attachment I/O collaborator contract.
//!
//! The actual byte shuffling (clipboard grab, file copy) lives outside
//! this core; the controller only records the returned metadata against
//! the current note.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Where attachment bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    Clipboard,
    File { path: PathBuf },
}

/// Metadata for a file the collaborator has stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub local_path: String,
    pub filename: String,
    pub ext: String,
    pub size: u64,
}

/// Failure to capture or store attachment bytes.
#[derive(Debug)]
pub struct AttachmentIoError {
    pub message: String,
}

impl AttachmentIoError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for AttachmentIoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "attachment io failure: {}", self.message)
    }
}

impl Error for AttachmentIoError {}

/// Stores attachment bytes and reports where they landed.
pub trait AttachmentIo {
    fn store(&self, source: &AttachmentSource) -> Result<StoredFile, AttachmentIoError>;
}
