//! In-memory doubles for the backend and platform collaborators.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::gateway::{CommandGateway, GatewayError, GatewayResult, command};
use crate::model::{AppConfig, SoundPack, WayvibesStatus};
use crate::platform::{Autostart, FileFilter, FilePicker, PlatformError, Revealer};

pub fn pack(id: &str) -> SoundPack {
    SoundPack {
        id: id.to_string(),
        name: id.to_uppercase(),
        version: "1.0.0".to_string(),
        author: None,
        description: None,
    }
}

/// Backend that keeps its state in memory and behaves like the real one for
/// the commands the store uses.
#[derive(Default)]
pub struct MockGateway {
    status: Mutex<WayvibesStatus>,
    packs: Mutex<Vec<SoundPack>>,
    config: Mutex<AppConfig>,
    failures: Mutex<HashMap<&'static str, String>>,
    calls: Mutex<Vec<String>>,
    status_hold: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
}

impl MockGateway {
    pub fn installed() -> Self {
        let gateway = Self::default();
        *gateway.status.lock().expect("lock") = WayvibesStatus {
            installed: true,
            running: false,
            version: Some("0.4.1".to_string()),
            pid: None,
        };
        gateway
    }

    pub fn not_installed() -> Self {
        Self::default()
    }

    pub fn set_packs(&self, packs: Vec<SoundPack>) {
        *self.packs.lock().expect("lock") = packs;
    }

    pub fn set_config(&self, config: AppConfig) {
        *self.config.lock().expect("lock") = config;
    }

    pub fn fail(&self, command: &'static str, message: &str) {
        self.failures
            .lock()
            .expect("lock")
            .insert(command, message.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }

    /// Make `get_wayvibes_status` signal the first notifier when entered and
    /// wait on the second before replying.
    pub fn hold_status(&self) -> (Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.status_hold.lock().expect("lock") = Some((entered.clone(), release.clone()));
        (entered, release)
    }

    fn record(&self, command: &'static str, detail: Option<String>) -> GatewayResult<()> {
        let entry = match detail {
            Some(detail) => format!("{command}:{detail}"),
            None => command.to_string(),
        };
        self.calls.lock().expect("lock").push(entry);
        match self.failures.lock().expect("lock").get(command) {
            Some(message) => Err(GatewayError::Command {
                command,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn restart_daemon(&self) {
        let mut status = self.status.lock().expect("lock");
        if status.installed {
            status.running = true;
            status.pid = Some(4242);
        }
    }
}

#[async_trait]
impl CommandGateway for MockGateway {
    async fn get_wayvibes_status(&self) -> GatewayResult<WayvibesStatus> {
        let hold = self.status_hold.lock().expect("lock").clone();
        if let Some((entered, release)) = hold {
            entered.notify_one();
            release.notified().await;
        }
        self.record(command::GET_WAYVIBES_STATUS, None)?;
        Ok(self.status.lock().expect("lock").clone())
    }

    async fn get_sound_packs(&self) -> GatewayResult<Vec<SoundPack>> {
        self.record(command::GET_SOUND_PACKS, None)?;
        Ok(self.packs.lock().expect("lock").clone())
    }

    async fn import_sound_pack(&self, path: &Path) -> GatewayResult<SoundPack> {
        self.record(command::IMPORT_SOUND_PACK, Some(path.display().to_string()))?;
        let stem = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.split('.').next())
            .unwrap_or("pack");
        let imported = pack(stem);
        self.packs.lock().expect("lock").push(imported.clone());
        let mut config = self.config.lock().expect("lock");
        if config.active_pack_id.is_none() {
            config.active_pack_id = Some(imported.id.clone());
        }
        Ok(imported)
    }

    async fn delete_sound_pack(&self, pack_id: &str) -> GatewayResult<()> {
        self.record(command::DELETE_SOUND_PACK, Some(pack_id.to_string()))?;
        self.packs.lock().expect("lock").retain(|p| p.id != pack_id);
        let mut config = self.config.lock().expect("lock");
        if config.active_pack_id.as_deref() == Some(pack_id) {
            config.active_pack_id = None;
        }
        Ok(())
    }

    async fn get_pack_path(&self, pack_id: &str) -> GatewayResult<String> {
        self.record(command::GET_PACK_PATH, Some(pack_id.to_string()))?;
        if self.packs.lock().expect("lock").iter().any(|p| p.id == pack_id) {
            Ok(format!("/packs/{pack_id}"))
        } else {
            Err(GatewayError::Command {
                command: command::GET_PACK_PATH,
                message: "Pack not found".to_string(),
            })
        }
    }

    async fn get_config(&self) -> GatewayResult<AppConfig> {
        self.record(command::GET_CONFIG, None)?;
        Ok(self.config.lock().expect("lock").clone())
    }

    async fn set_volume(&self, volume: f32) -> GatewayResult<()> {
        self.record(command::SET_VOLUME, Some(volume.to_string()))?;
        self.config.lock().expect("lock").volume = volume;
        Ok(())
    }

    async fn toggle_pause(&self) -> GatewayResult<()> {
        self.record(command::TOGGLE_PAUSE, None)?;
        let paused = {
            let mut config = self.config.lock().expect("lock");
            config.paused = !config.paused;
            config.paused
        };
        if paused {
            let mut status = self.status.lock().expect("lock");
            status.running = false;
            status.pid = None;
        } else {
            self.restart_daemon();
        }
        Ok(())
    }

    async fn stop_wayvibes(&self) -> GatewayResult<()> {
        self.record(command::STOP_WAYVIBES, None)?;
        self.config.lock().expect("lock").paused = true;
        let mut status = self.status.lock().expect("lock");
        status.running = false;
        status.pid = None;
        Ok(())
    }

    async fn set_active_pack(&self, pack_id: &str) -> GatewayResult<()> {
        self.record(command::SET_ACTIVE_PACK, Some(pack_id.to_string()))?;
        let paused = {
            let mut config = self.config.lock().expect("lock");
            config.active_pack_id = Some(pack_id.to_string());
            config.paused
        };
        if !paused {
            self.restart_daemon();
        }
        Ok(())
    }
}

pub struct MockAutostart {
    enabled: Mutex<bool>,
    ignore_writes: bool,
}

impl MockAutostart {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Mutex::new(enabled),
            ignore_writes: false,
        }
    }

    /// A platform that accepts enable/disable but never changes state.
    pub fn ignoring_writes(enabled: bool) -> Self {
        Self {
            enabled: Mutex::new(enabled),
            ignore_writes: true,
        }
    }

    fn write(&self, enabled: bool) {
        if !self.ignore_writes {
            *self.enabled.lock().expect("lock") = enabled;
        }
    }
}

#[async_trait]
impl Autostart for MockAutostart {
    async fn is_enabled(&self) -> Result<bool, PlatformError> {
        Ok(*self.enabled.lock().expect("lock"))
    }

    async fn enable(&self) -> Result<(), PlatformError> {
        self.write(true);
        Ok(())
    }

    async fn disable(&self) -> Result<(), PlatformError> {
        self.write(false);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockPicker {
    selection: Mutex<Option<PathBuf>>,
    opened: AtomicUsize,
    last_filter: Mutex<Option<FileFilter>>,
}

impl MockPicker {
    pub fn selecting(path: &str) -> Self {
        let picker = Self::default();
        *picker.selection.lock().expect("lock") = Some(PathBuf::from(path));
        picker
    }

    pub fn cancelled() -> Self {
        Self::default()
    }

    pub fn times_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn last_filter(&self) -> Option<FileFilter> {
        self.last_filter.lock().expect("lock").clone()
    }
}

#[async_trait]
impl FilePicker for MockPicker {
    async fn pick_file(&self, filter: &FileFilter) -> Option<PathBuf> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        *self.last_filter.lock().expect("lock") = Some(filter.clone());
        self.selection.lock().expect("lock").clone()
    }
}

#[derive(Default)]
pub struct MockRevealer {
    revealed: Mutex<Vec<PathBuf>>,
}

impl MockRevealer {
    pub fn revealed(&self) -> Vec<PathBuf> {
        self.revealed.lock().expect("lock").clone()
    }
}

impl Revealer for MockRevealer {
    fn reveal(&self, path: &Path) -> Result<(), PlatformError> {
        self.revealed.lock().expect("lock").push(path.to_path_buf());
        Ok(())
    }
}
