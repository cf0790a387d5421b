//! Client-side state container.
//!
//! The backend is the source of truth for daemon status and playback config.
//! Every mutating action follows the same cycle: mark the store as loading,
//! run the backend command, re-fetch the affected reads, and apply them in a
//! single update. Readers observe snapshots through a `watch` channel and
//! never see a half-applied refresh.
//!
//! `set_volume` is the exception: the slider value is applied locally when
//! the call is made, ahead of the backend write, and is not rolled back when
//! that write fails. The local value may disagree with the backend until the
//! next `refresh_all`. [`VolumeWriter`] serializes the writes for a slider.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::gateway::{CommandGateway, GatewayError};
use crate::model::{AppConfig, DEFAULT_VOLUME, SoundPack, WayvibesStatus};
use crate::platform::{Autostart, PlatformError, Revealer};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Everything the UI renders from, as one immutable value.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    pub wayvibes_status: WayvibesStatus,
    pub sound_packs: Vec<SoundPack>,
    pub active_pack_id: Option<String>,
    pub volume: f32,
    pub paused: bool,
    pub autostart_enabled: bool,
    /// Advisory gate: the UI disables controls while set. The store itself
    /// does not reject overlapping actions.
    pub is_loading: bool,
    pub last_error: Option<String>,
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self {
            wayvibes_status: WayvibesStatus::default(),
            sound_packs: Vec::new(),
            active_pack_id: None,
            volume: DEFAULT_VOLUME,
            paused: false,
            autostart_enabled: false,
            is_loading: false,
            last_error: None,
        }
    }
}

/// Reads fetched after a mutation. Fields left as `None` keep their
/// current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Refresh {
    pub status: Option<WayvibesStatus>,
    pub sound_packs: Option<Vec<SoundPack>>,
    pub config: Option<AppConfig>,
    pub autostart_enabled: Option<bool>,
}

impl StoreSnapshot {
    pub fn active_pack(&self) -> Option<&SoundPack> {
        let id = self.active_pack_id.as_deref()?;
        self.sound_packs.iter().find(|pack| pack.id == id)
    }

    pub fn begin_loading(self) -> Self {
        Self {
            is_loading: true,
            last_error: None,
            ..self
        }
    }

    pub fn apply(self, refresh: Refresh) -> Self {
        let mut next = self;
        if let Some(status) = refresh.status {
            next.wayvibes_status = status;
        }
        if let Some(packs) = refresh.sound_packs {
            next.sound_packs = packs;
        }
        if let Some(config) = refresh.config {
            next.active_pack_id = config.active_pack_id;
            next.volume = config.volume;
            next.paused = config.paused;
        }
        if let Some(enabled) = refresh.autostart_enabled {
            next.autostart_enabled = enabled;
        }
        next
    }

    pub fn finish(self, refresh: Refresh) -> Self {
        Self {
            is_loading: false,
            ..self.apply(refresh)
        }
    }

    pub fn fail(self, message: String) -> Self {
        Self {
            is_loading: false,
            last_error: Some(message),
            ..self
        }
    }

    pub fn with_volume(self, volume: f32) -> Self {
        Self { volume, ..self }
    }

    pub fn with_error(self, message: Option<String>) -> Self {
        Self {
            last_error: message,
            ..self
        }
    }
}

/// Store operations, used for logging and fallback error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    RefreshAll,
    ImportSoundPack,
    DeleteSoundPack,
    SetActivePack,
    SetVolume,
    TogglePause,
    StopWayvibes,
    SetAutostart,
}

impl Action {
    pub fn name(self) -> &'static str {
        match self {
            Action::RefreshAll => "refresh_all",
            Action::ImportSoundPack => "import_sound_pack",
            Action::DeleteSoundPack => "delete_sound_pack",
            Action::SetActivePack => "set_active_pack",
            Action::SetVolume => "set_volume",
            Action::TogglePause => "toggle_pause",
            Action::StopWayvibes => "stop_wayvibes",
            Action::SetAutostart => "set_autostart",
        }
    }

    /// Shown when a failure carries no message of its own.
    pub fn fallback_message(self) -> &'static str {
        match self {
            Action::RefreshAll => "Failed to refresh",
            Action::ImportSoundPack => "Failed to import pack",
            Action::DeleteSoundPack => "Failed to remove pack",
            Action::SetActivePack => "Failed to activate pack",
            Action::SetVolume => "Failed to update volume",
            Action::TogglePause => "Failed to toggle pause",
            Action::StopWayvibes => "Failed to stop Wayvibes",
            Action::SetAutostart => "Failed to update autostart",
        }
    }

    fn describe(self, err: &StoreError) -> String {
        let message = err.to_string();
        if message.trim().is_empty() {
            self.fallback_message().to_string()
        } else {
            message
        }
    }
}

/// Clears the loading flag if an action future is dropped before it
/// resolves, so a cancelled action never leaves the UI disabled.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<StoreSnapshot>,
    armed: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.send_modify(|s| s.is_loading = false);
        }
    }
}

pub struct StateStore {
    gateway: Arc<dyn CommandGateway>,
    autostart: Arc<dyn Autostart>,
    state: watch::Sender<StoreSnapshot>,
}

impl StateStore {
    pub fn new(gateway: Arc<dyn CommandGateway>, autostart: Arc<dyn Autostart>) -> Self {
        Self::with_snapshot(gateway, autostart, StoreSnapshot::default())
    }

    pub fn with_snapshot(
        gateway: Arc<dyn CommandGateway>,
        autostart: Arc<dyn Autostart>,
        initial: StoreSnapshot,
    ) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            gateway,
            autostart,
            state,
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver that is marked changed after every applied update.
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.state.subscribe()
    }

    pub fn is_daemon_installed(&self) -> bool {
        self.state.borrow().wayvibes_status.installed
    }

    fn transition(&self, f: impl FnOnce(StoreSnapshot) -> StoreSnapshot) {
        self.state.send_modify(|snapshot| {
            let current = std::mem::take(snapshot);
            *snapshot = f(current);
        });
    }

    async fn run<F>(&self, action: Action, work: F)
    where
        F: Future<Output = Result<Refresh, StoreError>>,
    {
        self.transition(StoreSnapshot::begin_loading);
        let mut guard = LoadingGuard {
            state: &self.state,
            armed: true,
        };
        tracing::debug!(action = action.name(), "action started");

        match work.await {
            Ok(refresh) => {
                self.transition(|s| s.finish(refresh));
                tracing::debug!(action = action.name(), "action applied");
            }
            Err(err) => {
                let message = action.describe(&err);
                tracing::warn!(action = action.name(), "action failed: {message}");
                self.transition(|s| s.fail(message));
            }
        }
        guard.armed = false;
    }

    /// Re-read status, packs, config and autostart. Either all four are
    /// applied or none.
    pub async fn refresh_all(&self) {
        let gateway = &self.gateway;
        let autostart = &self.autostart;
        self.run(Action::RefreshAll, async {
            let (status, packs, config, autostart_enabled) = tokio::try_join!(
                async { Ok::<_, StoreError>(gateway.get_wayvibes_status().await?) },
                async { Ok::<_, StoreError>(gateway.get_sound_packs().await?) },
                async { Ok::<_, StoreError>(gateway.get_config().await?) },
                async { Ok::<_, StoreError>(autostart.is_enabled().await?) },
            )?;
            Ok(Refresh {
                status: Some(status),
                sound_packs: Some(packs),
                config: Some(config),
                autostart_enabled: Some(autostart_enabled),
            })
        })
        .await;
    }

    async fn fetch_packs_and_config(&self) -> Result<Refresh, StoreError> {
        let (packs, config) = tokio::try_join!(
            async { Ok::<_, StoreError>(self.gateway.get_sound_packs().await?) },
            async { Ok::<_, StoreError>(self.gateway.get_config().await?) },
        )?;
        Ok(Refresh {
            sound_packs: Some(packs),
            config: Some(config),
            ..Refresh::default()
        })
    }

    async fn fetch_status_and_config(&self) -> Result<Refresh, StoreError> {
        let (status, config) = tokio::try_join!(
            async { Ok::<_, StoreError>(self.gateway.get_wayvibes_status().await?) },
            async { Ok::<_, StoreError>(self.gateway.get_config().await?) },
        )?;
        Ok(Refresh {
            status: Some(status),
            config: Some(config),
            ..Refresh::default()
        })
    }

    /// Import an archive. Callers validate the path first; see
    /// [`crate::import::is_archive_path`].
    pub async fn import_sound_pack(&self, path: &Path) {
        self.run(Action::ImportSoundPack, async {
            let pack = self.gateway.import_sound_pack(path).await?;
            tracing::info!(pack_id = %pack.id, path = %path.display(), "sound pack imported");
            self.fetch_packs_and_config().await
        })
        .await;
    }

    /// Delete a pack. If it was the active one, whatever the backend reports
    /// as active afterwards is mirrored; the client does not pick a fallback.
    pub async fn delete_sound_pack(&self, pack_id: &str) {
        self.run(Action::DeleteSoundPack, async {
            self.gateway.delete_sound_pack(pack_id).await?;
            tracing::info!(pack_id, "sound pack deleted");
            self.fetch_packs_and_config().await
        })
        .await;
    }

    pub async fn set_active_pack(&self, pack_id: &str) {
        self.run(Action::SetActivePack, async {
            self.gateway.set_active_pack(pack_id).await?;
            // Activation can start or restart the daemon.
            self.fetch_status_and_config().await
        })
        .await;
    }

    /// Apply the volume locally right away, then send it to the backend.
    ///
    /// The clamped value is in the snapshot as soon as this returns; the
    /// returned future only performs the backend write and status resync.
    /// Does not touch the loading flag and does not clear a previous error.
    /// On failure the local value stays as set; the error is recorded.
    pub fn set_volume(&self, volume: f32) -> impl Future<Output = ()> + Send + '_ {
        let volume = self.apply_volume(volume);
        self.write_volume(volume)
    }

    fn apply_volume(&self, volume: f32) -> f32 {
        let volume = volume.clamp(0.0, 1.0);
        self.transition(|s| s.with_volume(volume));
        volume
    }

    async fn write_volume(&self, volume: f32) {
        let result: Result<WayvibesStatus, StoreError> = async {
            self.gateway.set_volume(volume).await?;
            Ok(self.gateway.get_wayvibes_status().await?)
        }
        .await;

        match result {
            Ok(status) => self.transition(|s| {
                s.apply(Refresh {
                    status: Some(status),
                    ..Refresh::default()
                })
            }),
            Err(err) => {
                let message = Action::SetVolume.describe(&err);
                tracing::warn!(volume, "set_volume failed: {message}");
                self.transition(|s| s.with_error(Some(message)));
            }
        }
    }

    pub async fn toggle_pause(&self) {
        self.run(Action::TogglePause, async {
            self.gateway.toggle_pause().await?;
            self.fetch_status_and_config().await
        })
        .await;
    }

    pub async fn stop_wayvibes(&self) {
        self.run(Action::StopWayvibes, async {
            self.gateway.stop_wayvibes().await?;
            self.fetch_status_and_config().await
        })
        .await;
    }

    /// Toggle launch-at-login and record what the platform reports back.
    pub async fn set_autostart_enabled(&self, enabled: bool) {
        let autostart = &self.autostart;
        self.run(Action::SetAutostart, async {
            if enabled {
                autostart.enable().await?;
            } else {
                autostart.disable().await?;
            }
            let enabled = autostart.is_enabled().await?;
            Ok(Refresh {
                autostart_enabled: Some(enabled),
                ..Refresh::default()
            })
        })
        .await;
    }

    pub fn set_last_error(&self, message: Option<String>) {
        self.transition(|s| s.with_error(message));
    }

    /// Open a pack's directory in the file manager. Failures are logged and
    /// returned; they do not go into `last_error`.
    pub async fn reveal_pack(&self, pack_id: &str, revealer: &dyn Revealer) -> Result<(), StoreError> {
        let result: Result<(), StoreError> = async {
            let path = self.gateway.get_pack_path(pack_id).await?;
            revealer.reveal(Path::new(&path))?;
            Ok(())
        }
        .await;
        if let Err(err) = &result {
            tracing::warn!(pack_id, "failed to open pack in file manager: {err}");
        }
        result
    }
}

/// Feeds slider values to the backend one write at a time.
///
/// [`VolumeWriter::set`] applies the value to the snapshot immediately. A
/// single task then writes to the backend; values superseded while a write
/// is in flight are skipped, so the last value set is the last one written.
pub struct VolumeWriter {
    store: Arc<StateStore>,
    latest: watch::Sender<f32>,
    task: JoinHandle<()>,
}

impl VolumeWriter {
    pub fn spawn(store: Arc<StateStore>, handle: &Handle) -> Self {
        let (latest, mut pending) = watch::channel(store.snapshot().volume);
        let writer = store.clone();
        let task = handle.spawn(async move {
            while pending.changed().await.is_ok() {
                let volume = *pending.borrow_and_update();
                writer.write_volume(volume).await;
            }
        });
        Self {
            store,
            latest,
            task,
        }
    }

    pub fn set(&self, volume: f32) {
        let volume = self.store.apply_volume(volume);
        self.latest.send_replace(volume);
    }
}

impl Drop for VolumeWriter {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::command;
    use crate::testing::{MockAutostart, MockGateway, MockRevealer, pack};

    fn store_with(gateway: &Arc<MockGateway>, autostart: &Arc<MockAutostart>) -> StateStore {
        StateStore::new(gateway.clone(), autostart.clone())
    }

    #[tokio::test]
    async fn test_refresh_all_applies_everything() {
        let gateway = Arc::new(MockGateway::installed());
        gateway.set_packs(vec![pack("a"), pack("b")]);
        gateway.set_config(AppConfig {
            active_pack_id: Some("b".to_string()),
            volume: 0.3,
            paused: true,
        });
        let autostart = Arc::new(MockAutostart::new(true));
        let store = store_with(&gateway, &autostart);

        store.refresh_all().await;

        let snapshot = store.snapshot();
        assert!(snapshot.wayvibes_status.installed);
        assert_eq!(snapshot.sound_packs.len(), 2);
        assert_eq!(snapshot.active_pack().map(|p| p.id.as_str()), Some("b"));
        assert_eq!(snapshot.volume, 0.3);
        assert!(snapshot.paused);
        assert!(snapshot.autostart_enabled);
        assert!(!snapshot.is_loading);
        assert_eq!(snapshot.last_error, None);
    }

    #[tokio::test]
    async fn test_refresh_all_failure_applies_nothing() {
        let gateway = Arc::new(MockGateway::installed());
        gateway.set_packs(vec![pack("a")]);
        gateway.fail(command::GET_CONFIG, "config unreadable");
        let autostart = Arc::new(MockAutostart::new(true));
        let store = store_with(&gateway, &autostart);

        store.refresh_all().await;

        let snapshot = store.snapshot();
        assert!(!snapshot.wayvibes_status.installed);
        assert!(snapshot.sound_packs.is_empty());
        assert!(!snapshot.autostart_enabled);
        assert!(!snapshot.is_loading);
        assert_eq!(snapshot.last_error.as_deref(), Some("config unreadable"));
    }

    #[tokio::test]
    async fn test_refresh_all_is_loading_only_while_in_flight() {
        let gateway = Arc::new(MockGateway::installed());
        let (entered, release) = gateway.hold_status();
        let autostart = Arc::new(MockAutostart::new(false));
        let store = Arc::new(store_with(&gateway, &autostart));
        assert!(!store.snapshot().is_loading);

        let task = tokio::spawn({
            let store = store.clone();
            async move { store.refresh_all().await }
        });
        entered.notified().await;
        assert!(store.snapshot().is_loading);

        release.notify_one();
        task.await.expect("join");
        assert!(!store.snapshot().is_loading);
    }

    #[tokio::test]
    async fn test_refresh_all_clears_loading_on_failure() {
        let gateway = Arc::new(MockGateway::installed());
        let (entered, release) = gateway.hold_status();
        gateway.fail(command::GET_SOUND_PACKS, "boom");
        let autostart = Arc::new(MockAutostart::new(false));
        let store = Arc::new(store_with(&gateway, &autostart));

        let task = tokio::spawn({
            let store = store.clone();
            async move { store.refresh_all().await }
        });
        entered.notified().await;
        release.notify_one();
        task.await.expect("join");

        let snapshot = store.snapshot();
        assert!(!snapshot.is_loading);
        assert_eq!(snapshot.last_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_next_action_clears_stale_error() {
        let gateway = Arc::new(MockGateway::installed());
        let autostart = Arc::new(MockAutostart::new(false));
        let store = store_with(&gateway, &autostart);
        store.set_last_error(Some("old".to_string()));

        store.toggle_pause().await;

        assert_eq!(store.snapshot().last_error, None);
    }

    #[tokio::test]
    async fn test_import_refreshes_packs_and_config_together() {
        let gateway = Arc::new(MockGateway::installed());
        let autostart = Arc::new(MockAutostart::new(false));
        let store = store_with(&gateway, &autostart);
        let updates = store.subscribe();

        store.import_sound_pack(Path::new("/x/pack.zip")).await;

        let snapshot = store.snapshot();
        assert_eq!(snapshot.sound_packs.len(), 1);
        assert_eq!(snapshot.active_pack_id.as_deref(), Some("pack"));
        assert!(!snapshot.is_loading);
        assert_eq!(snapshot.last_error, None);
        assert!(updates.has_changed().expect("sender alive"));
        assert_eq!(
            gateway.calls(),
            vec![
                "import_sound_pack:/x/pack.zip",
                "get_sound_packs",
                "get_config"
            ]
        );
    }

    #[tokio::test]
    async fn test_import_failure_keeps_pack_list() {
        let gateway = Arc::new(MockGateway::installed());
        gateway.set_packs(vec![pack("kept")]);
        gateway.fail(command::IMPORT_SOUND_PACK, "Invalid pack: missing config.json");
        let autostart = Arc::new(MockAutostart::new(false));
        let store = store_with(&gateway, &autostart);
        store.refresh_all().await;

        store.import_sound_pack(Path::new("/x/broken.zip")).await;

        let snapshot = store.snapshot();
        assert_eq!(snapshot.sound_packs, vec![pack("kept")]);
        assert_eq!(
            snapshot.last_error.as_deref(),
            Some("Invalid pack: missing config.json")
        );
        assert_eq!(
            gateway.calls().last().map(String::as_str),
            Some("import_sound_pack:/x/broken.zip")
        );
    }

    #[tokio::test]
    async fn test_delete_active_pack_mirrors_backend_config() {
        let gateway = Arc::new(MockGateway::installed());
        gateway.set_packs(vec![pack("a"), pack("b")]);
        gateway.set_config(AppConfig {
            active_pack_id: Some("a".to_string()),
            ..AppConfig::default()
        });
        let autostart = Arc::new(MockAutostart::new(false));
        let store = store_with(&gateway, &autostart);
        store.refresh_all().await;

        store.delete_sound_pack("a").await;

        let snapshot = store.snapshot();
        assert_eq!(snapshot.sound_packs, vec![pack("b")]);
        assert_eq!(snapshot.active_pack_id, None);
        assert_eq!(snapshot.active_pack(), None);
    }

    #[tokio::test]
    async fn test_set_active_pack_refreshes_status() {
        let gateway = Arc::new(MockGateway::installed());
        gateway.set_packs(vec![pack("a")]);
        let autostart = Arc::new(MockAutostart::new(false));
        let store = store_with(&gateway, &autostart);
        store.refresh_all().await;
        assert!(!store.snapshot().wayvibes_status.running);

        store.set_active_pack("a").await;

        let snapshot = store.snapshot();
        assert_eq!(snapshot.active_pack_id.as_deref(), Some("a"));
        assert!(snapshot.wayvibes_status.is_running());
    }

    #[tokio::test]
    async fn test_set_volume_applies_locally_and_resyncs_status() {
        let gateway = Arc::new(MockGateway::installed());
        let autostart = Arc::new(MockAutostart::new(false));
        let store = store_with(&gateway, &autostart);

        store.set_volume(0.42).await;

        let snapshot = store.snapshot();
        assert_eq!(snapshot.volume, 0.42);
        assert!(snapshot.wayvibes_status.installed);
        assert!(!snapshot.is_loading);
        assert_eq!(gateway.calls(), vec!["set_volume:0.42", "get_wayvibes_status"]);
    }

    // The volume is intentionally optimistic: a failed backend call does not
    // roll it back. This is accepted inconsistency, not a bug.
    #[tokio::test]
    async fn test_set_volume_failure_keeps_optimistic_value() {
        let gateway = Arc::new(MockGateway::installed());
        gateway.fail(command::SET_VOLUME, "daemon restart failed");
        let autostart = Arc::new(MockAutostart::new(false));
        let store = store_with(&gateway, &autostart);

        store.set_volume(0.42).await;

        let snapshot = store.snapshot();
        assert_eq!(snapshot.volume, 0.42);
        assert_eq!(snapshot.last_error.as_deref(), Some("daemon restart failed"));
        assert!(!snapshot.is_loading);
    }

    #[tokio::test]
    async fn test_set_volume_does_not_clear_previous_error() {
        let gateway = Arc::new(MockGateway::installed());
        let autostart = Arc::new(MockAutostart::new(false));
        let store = store_with(&gateway, &autostart);
        store.set_last_error(Some("earlier".to_string()));

        store.set_volume(0.9).await;

        assert_eq!(store.snapshot().last_error.as_deref(), Some("earlier"));
    }

    #[tokio::test]
    async fn test_set_volume_is_clamped() {
        let gateway = Arc::new(MockGateway::installed());
        let autostart = Arc::new(MockAutostart::new(false));
        let store = store_with(&gateway, &autostart);

        store.set_volume(1.7).await;

        assert_eq!(store.snapshot().volume, 1.0);
    }

    #[tokio::test]
    async fn test_set_volume_applies_before_the_write_is_awaited() {
        let gateway = Arc::new(MockGateway::installed());
        let autostart = Arc::new(MockAutostart::new(false));
        let store = store_with(&gateway, &autostart);

        let write = store.set_volume(0.42);
        assert_eq!(store.snapshot().volume, 0.42);
        assert!(gateway.calls().is_empty());

        write.await;
        assert_eq!(gateway.calls(), vec!["set_volume:0.42", "get_wayvibes_status"]);
    }

    #[tokio::test]
    async fn test_set_volume_last_call_wins_when_writes_overlap() {
        let gateway = Arc::new(MockGateway::installed());
        let autostart = Arc::new(MockAutostart::new(false));
        let store = store_with(&gateway, &autostart);

        let first = store.set_volume(0.1);
        let second = store.set_volume(0.5);
        let last = store.set_volume(0.9);
        assert_eq!(store.snapshot().volume, 0.9);

        tokio::join!(last, second, first);

        assert_eq!(store.snapshot().volume, 0.9);
        assert!(store.snapshot().wayvibes_status.installed);
    }

    #[tokio::test]
    async fn test_volume_writer_coalesces_to_the_latest_value() {
        let gateway = Arc::new(MockGateway::installed());
        let autostart = Arc::new(MockAutostart::new(false));
        let store = Arc::new(store_with(&gateway, &autostart));
        let writer = VolumeWriter::spawn(store.clone(), &Handle::current());

        for step in 1..=9 {
            writer.set(step as f32 / 10.0);
        }
        assert_eq!(store.snapshot().volume, 0.9);

        let writes = wait_for_volume_writes(&gateway, "set_volume:0.9").await;
        assert_eq!(writes, vec!["set_volume:0.9"]);
        assert_eq!(store.snapshot().volume, 0.9);
    }

    #[tokio::test]
    async fn test_volume_writer_sends_last_value_after_in_flight_write() {
        let gateway = Arc::new(MockGateway::installed());
        let (entered, release) = gateway.hold_status();
        let autostart = Arc::new(MockAutostart::new(false));
        let store = Arc::new(store_with(&gateway, &autostart));
        let writer = VolumeWriter::spawn(store.clone(), &Handle::current());

        writer.set(0.2);
        entered.notified().await;
        writer.set(0.5);
        writer.set(1.4);
        assert_eq!(store.snapshot().volume, 1.0);

        release.notify_one();
        entered.notified().await;
        release.notify_one();

        let writes = wait_for_volume_writes(&gateway, "set_volume:1").await;
        assert_eq!(writes, vec!["set_volume:0.2", "set_volume:1"]);
        assert_eq!(store.snapshot().volume, 1.0);
    }

    async fn wait_for_volume_writes(gateway: &MockGateway, last: &str) -> Vec<String> {
        for _ in 0..1000 {
            let writes: Vec<String> = gateway
                .calls()
                .into_iter()
                .filter(|call| call.starts_with("set_volume:"))
                .collect();
            if writes.last().map(String::as_str) == Some(last) {
                return writes;
            }
            tokio::task::yield_now().await;
        }
        panic!("backend never received {last}");
    }

    #[tokio::test]
    async fn test_toggle_pause_refreshes_config() {
        let gateway = Arc::new(MockGateway::installed());
        let autostart = Arc::new(MockAutostart::new(false));
        let store = store_with(&gateway, &autostart);

        store.toggle_pause().await;
        assert!(store.snapshot().paused);

        store.toggle_pause().await;
        assert!(!store.snapshot().paused);
    }

    #[tokio::test]
    async fn test_stop_wayvibes_refreshes_status_and_config() {
        let gateway = Arc::new(MockGateway::installed());
        gateway.set_packs(vec![pack("a")]);
        let autostart = Arc::new(MockAutostart::new(false));
        let store = store_with(&gateway, &autostart);
        store.set_active_pack("a").await;
        assert!(store.snapshot().wayvibes_status.running);

        store.stop_wayvibes().await;

        let snapshot = store.snapshot();
        assert!(!snapshot.wayvibes_status.running);
        assert!(snapshot.paused);
    }

    #[tokio::test]
    async fn test_autostart_reads_back_platform_state() {
        let gateway = Arc::new(MockGateway::installed());
        let autostart = Arc::new(MockAutostart::ignoring_writes(false));
        let store = store_with(&gateway, &autostart);

        store.set_autostart_enabled(true).await;

        let snapshot = store.snapshot();
        assert!(!snapshot.autostart_enabled);
        assert_eq!(snapshot.last_error, None);
    }

    #[tokio::test]
    async fn test_autostart_enable_and_disable() {
        let gateway = Arc::new(MockGateway::installed());
        let autostart = Arc::new(MockAutostart::new(false));
        let store = store_with(&gateway, &autostart);

        store.set_autostart_enabled(true).await;
        assert!(store.snapshot().autostart_enabled);

        store.set_autostart_enabled(false).await;
        assert!(!store.snapshot().autostart_enabled);
    }

    #[tokio::test]
    async fn test_empty_backend_message_uses_fallback() {
        let gateway = Arc::new(MockGateway::installed());
        gateway.fail(command::STOP_WAYVIBES, "");
        let autostart = Arc::new(MockAutostart::new(false));
        let store = store_with(&gateway, &autostart);

        store.stop_wayvibes().await;

        assert_eq!(
            store.snapshot().last_error.as_deref(),
            Some(Action::StopWayvibes.fallback_message())
        );
    }

    #[tokio::test]
    async fn test_cancelled_action_clears_loading() {
        let gateway = Arc::new(MockGateway::installed());
        let (entered, _release) = gateway.hold_status();
        let autostart = Arc::new(MockAutostart::new(false));
        let store = Arc::new(store_with(&gateway, &autostart));

        let task = tokio::spawn({
            let store = store.clone();
            async move { store.refresh_all().await }
        });
        entered.notified().await;
        assert!(store.snapshot().is_loading);

        task.abort();
        let _ = task.await;

        assert!(!store.snapshot().is_loading);
    }

    #[tokio::test]
    async fn test_reveal_pack_uses_backend_path() {
        let gateway = Arc::new(MockGateway::installed());
        gateway.set_packs(vec![pack("a")]);
        let autostart = Arc::new(MockAutostart::new(false));
        let store = store_with(&gateway, &autostart);
        let revealer = MockRevealer::default();

        store.reveal_pack("a", &revealer).await.expect("reveal");

        assert_eq!(revealer.revealed(), vec![std::path::PathBuf::from("/packs/a")]);
        assert_eq!(store.snapshot().last_error, None);
    }

    #[tokio::test]
    async fn test_reveal_unknown_pack_does_not_touch_last_error() {
        let gateway = Arc::new(MockGateway::installed());
        let autostart = Arc::new(MockAutostart::new(false));
        let store = store_with(&gateway, &autostart);
        let revealer = MockRevealer::default();

        let result = store.reveal_pack("missing", &revealer).await;

        assert!(result.is_err());
        assert!(revealer.revealed().is_empty());
        assert_eq!(store.snapshot().last_error, None);
    }
}
