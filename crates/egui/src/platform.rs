//! Desktop collaborators: XDG autostart entry, native file dialog, and the
//! file manager opener.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use wayvibes_core::{Autostart, FileFilter, FilePicker, PlatformError, Revealer};

const DESKTOP_FILE: &str = "wayvibes-ui.desktop";

/// Launch at login through `<config_dir>/autostart/wayvibes-ui.desktop`.
/// The entry existing is what "enabled" means.
pub struct XdgAutostart {
    entry: PathBuf,
    exec: String,
}

impl XdgAutostart {
    pub fn new(config_dir: &Path, exec: impl Into<String>) -> Self {
        Self {
            entry: config_dir.join("autostart").join(DESKTOP_FILE),
            exec: exec.into(),
        }
    }

    /// Entry for the running executable in the user's config directory.
    pub fn for_current_exe() -> io::Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no config directory"))?;
        let exe = std::env::current_exe()?;
        Ok(Self::new(&config_dir, exe.to_string_lossy()))
    }

    fn desktop_entry(&self) -> String {
        format!(
            "[Desktop Entry]\n\
             Type=Application\n\
             Name=Wayvibes\n\
             Comment=Mechanical keyboard sounds\n\
             Exec={}\n\
             Terminal=false\n\
             X-GNOME-Autostart-enabled=true\n",
            self.exec
        )
    }
}

#[async_trait]
impl Autostart for XdgAutostart {
    async fn is_enabled(&self) -> Result<bool, PlatformError> {
        tokio::fs::try_exists(&self.entry)
            .await
            .map_err(PlatformError::Autostart)
    }

    async fn enable(&self) -> Result<(), PlatformError> {
        if let Some(parent) = self.entry.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(PlatformError::Autostart)?;
        }
        tokio::fs::write(&self.entry, self.desktop_entry())
            .await
            .map_err(PlatformError::Autostart)?;
        tracing::info!(entry = %self.entry.display(), "autostart enabled");
        Ok(())
    }

    async fn disable(&self) -> Result<(), PlatformError> {
        match tokio::fs::remove_file(&self.entry).await {
            Ok(()) => {
                tracing::info!(entry = %self.entry.display(), "autostart disabled");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(PlatformError::Autostart(err)),
        }
    }
}

/// Native open dialog that starts in the directory of the previous pick.
pub struct RfdPicker {
    last_dir: Arc<Mutex<Option<PathBuf>>>,
}

impl RfdPicker {
    pub fn new(start_dir: Option<PathBuf>) -> Self {
        Self {
            last_dir: Arc::new(Mutex::new(start_dir)),
        }
    }

    pub fn last_dir(&self) -> Option<PathBuf> {
        self.last_dir.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl FilePicker for RfdPicker {
    async fn pick_file(&self, filter: &FileFilter) -> Option<PathBuf> {
        let mut dialog = rfd::AsyncFileDialog::new()
            .set_title("Import sound pack")
            .add_filter(&filter.name, filter.extensions.as_slice());
        if let Some(dir) = self.last_dir() {
            dialog = dialog.set_directory(dir);
        }

        let path = dialog.pick_file().await?.path().to_path_buf();
        if let Some(parent) = path.parent() {
            *self.last_dir.lock().unwrap_or_else(|e| e.into_inner()) = Some(parent.to_path_buf());
        }
        Some(path)
    }
}

/// Opens a directory with the desktop's default handler.
pub struct SystemRevealer {
    opener: &'static str,
}

impl Default for SystemRevealer {
    fn default() -> Self {
        let opener = if cfg!(target_os = "macos") {
            "open"
        } else if cfg!(target_os = "windows") {
            "explorer"
        } else {
            "xdg-open"
        };
        Self { opener }
    }
}

impl Revealer for SystemRevealer {
    fn reveal(&self, path: &Path) -> Result<(), PlatformError> {
        Command::new(self.opener)
            .arg(path)
            .spawn()
            .map(|_| ())
            .map_err(|source| PlatformError::Reveal {
                path: path.to_path_buf(),
                source,
            })
    }
}
