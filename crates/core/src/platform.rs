//! Platform services the client relies on besides the backend.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("Failed to update autostart: {0}")]
    Autostart(#[source] std::io::Error),

    #[error("Failed to open '{path}': {source}")]
    Reveal {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Launch-at-login toggle. The platform is the source of truth, so callers
/// query [`Autostart::is_enabled`] again after changing it.
#[async_trait]
pub trait Autostart: Send + Sync {
    async fn is_enabled(&self) -> Result<bool, PlatformError>;

    async fn enable(&self) -> Result<(), PlatformError>;

    async fn disable(&self) -> Result<(), PlatformError>;
}

/// Extension filter shown by a file dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    pub name: String,
    /// Extensions without the leading dot.
    pub extensions: Vec<String>,
}

/// Single-file open dialog.
///
/// Filters are advisory: some dialogs let the user pick anything, so the
/// returned path must still be validated.
#[async_trait]
pub trait FilePicker: Send + Sync {
    async fn pick_file(&self, filter: &FileFilter) -> Option<PathBuf>;
}

/// Shows a path in the desktop file manager.
pub trait Revealer: Send + Sync {
    fn reveal(&self, path: &Path) -> Result<(), PlatformError>;
}
