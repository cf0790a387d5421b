//! Sound pack import from drag-and-drop, the import button and the tray.
//!
//! Drag events arrive per element, so entering a child element fires an
//! enter before the leave of its parent. A depth counter pairs them up so
//! the drop zone only deactivates when the pointer really leaves it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::events::{EventChannel, Subscription};
use crate::platform::{FileFilter, FilePicker};
use crate::store::StateStore;

/// Accepted archive suffixes, matched case-insensitively.
pub const ARCHIVE_EXTENSIONS: &[&str] = &[".zip", ".rar", ".7z", ".tar", ".tar.gz", ".tgz", ".gz"];

pub const NOT_INSTALLED_MESSAGE: &str =
    "Wayvibes is not installed. Install it first (e.g. `sudo pacman -S wayvibes`) to import sound packs.";

pub const INVALID_ARCHIVE_MESSAGE: &str =
    "Unsupported file. Sound packs must be .zip, .rar, .7z, .tar, .tar.gz, .tgz or .gz archives.";

pub fn is_archive_path(path: impl AsRef<Path>) -> bool {
    let lower = path.as_ref().to_string_lossy().to_lowercase();
    ARCHIVE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Dialog filter matching [`ARCHIVE_EXTENSIONS`].
pub fn archive_filter() -> FileFilter {
    FileFilter {
        name: "Sound pack archives".to_string(),
        extensions: ARCHIVE_EXTENSIONS
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_string())
            .collect(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DragState {
    depth: u32,
}

impl DragState {
    pub fn depth(self) -> u32 {
        self.depth
    }

    pub fn is_dragging(self) -> bool {
        self.depth > 0
    }

    pub fn enter(self) -> Self {
        Self {
            depth: self.depth.saturating_add(1),
        }
    }

    pub fn leave(self) -> Self {
        Self {
            depth: self.depth.saturating_sub(1),
        }
    }

    pub fn reset(self) -> Self {
        Self::default()
    }
}

/// A file carried by a drag gesture. `path` is `None` when the environment
/// does not expose filesystem paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedFile {
    pub name: String,
    pub path: Option<PathBuf>,
}

impl DroppedFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            path: Some(path),
        }
    }

    pub fn without_path(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
        }
    }
}

/// One drag/drop event as delivered by the UI toolkit.
#[derive(Debug, Clone, Default)]
pub struct DragEvent {
    /// Whether the payload advertises files at all. During enter/leave the
    /// file list itself is usually not readable yet.
    pub has_files: bool,
    pub files: Vec<DroppedFile>,
    default_prevented: bool,
}

impl DragEvent {
    pub fn with_files(files: Vec<DroppedFile>) -> Self {
        Self {
            has_files: true,
            files,
            default_prevented: false,
        }
    }

    /// An enter/leave/over event whose payload advertises files.
    pub fn carrying_files() -> Self {
        Self {
            has_files: true,
            ..Self::default()
        }
    }

    /// Payload without files, e.g. dragged text.
    pub fn without_files() -> Self {
        Self::default()
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

pub struct DragImportController {
    store: Arc<StateStore>,
    picker: Arc<dyn FilePicker>,
    drag: Mutex<DragState>,
}

impl DragImportController {
    pub fn new(store: Arc<StateStore>, picker: Arc<dyn FilePicker>) -> Self {
        Self {
            store,
            picker,
            drag: Mutex::new(DragState::default()),
        }
    }

    pub fn drag_state(&self) -> DragState {
        *self.drag.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_state().is_dragging()
    }

    fn update_drag(&self, f: impl FnOnce(DragState) -> DragState) -> DragState {
        let mut drag = self.drag.lock().unwrap_or_else(|e| e.into_inner());
        *drag = f(*drag);
        *drag
    }

    pub fn on_drag_enter(&self, event: &DragEvent) {
        if !event.has_files || !self.store.is_daemon_installed() {
            return;
        }
        let drag = self.update_drag(DragState::enter);
        tracing::trace!(depth = drag.depth(), "drag enter");
    }

    pub fn on_drag_leave(&self, event: &DragEvent) {
        if !event.has_files {
            return;
        }
        let drag = self.update_drag(DragState::leave);
        tracing::trace!(depth = drag.depth(), "drag leave");
    }

    /// Must be called for every drag-over so the drop is accepted.
    pub fn on_drag_over(&self, event: &mut DragEvent) {
        event.prevent_default();
    }

    pub async fn on_drop(&self, event: &mut DragEvent) {
        event.prevent_default();
        self.update_drag(DragState::reset);

        if !self.store.is_daemon_installed() {
            self.store.set_last_error(Some(NOT_INSTALLED_MESSAGE.to_string()));
            return;
        }

        let Some(path) = event.files.first().and_then(|file| file.path.clone()) else {
            tracing::debug!("drop carried no file path; ignoring");
            return;
        };

        if is_archive_path(&path) {
            self.store.import_sound_pack(&path).await;
        } else {
            tracing::debug!(path = %path.display(), "rejected dropped file");
            self.store.set_last_error(Some(INVALID_ARCHIVE_MESSAGE.to_string()));
        }
    }

    pub async fn on_import_click(&self) {
        if !self.store.is_daemon_installed() {
            self.store.set_last_error(Some(NOT_INSTALLED_MESSAGE.to_string()));
            return;
        }

        let Some(path) = self.picker.pick_file(&archive_filter()).await else {
            return;
        };

        // Dialog filters are only a hint; check again.
        if is_archive_path(&path) {
            self.store.import_sound_pack(&path).await;
        } else {
            tracing::debug!(path = %path.display(), "rejected picked file");
            self.store.set_last_error(Some(INVALID_ARCHIVE_MESSAGE.to_string()));
        }
    }

    /// Run [`Self::on_import_click`] whenever the channel fires. The listener
    /// is removed when the returned subscription is dropped.
    ///
    /// Must be called from within a Tokio runtime; the handler spawns onto it.
    pub fn listen_tray_import(
        self: &Arc<Self>,
        channel: &EventChannel<()>,
    ) -> Result<Subscription, tokio::runtime::TryCurrentError> {
        let runtime = tokio::runtime::Handle::try_current()?;
        let controller = Arc::downgrade(self);
        let name = channel.name();
        Ok(channel.listen(move |_| {
            let Some(controller) = controller.upgrade() else {
                return;
            };
            tracing::debug!(channel = name, "import requested");
            runtime.spawn(async move { controller.on_import_click().await });
        }))
    }
}
