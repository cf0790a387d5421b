use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Context;
use eframe::egui;
use tokio::runtime::Runtime;
use tokio::sync::watch;
use wayvibes_core::{
    DragEvent, DragImportController, EventChannel, KeyEvent, KeypressFeedback, SoundPack,
    StateStore, StoreSnapshot, Subscription, TRAY_IMPORT_EVENT, VolumeWriter, volume_percent,
};
use wayvibes_spectrum::{AudioSpectrumController, FrequencyPoller, SpectrumState};

use crate::config::Config;
use crate::gateway::ProcessGateway;
use crate::input::{DragSignal, HoverTracker, dropped_file, key_events};
use crate::platform::{RfdPicker, SystemRevealer, XdgAutostart};

const PULSE_DURATION: Duration = Duration::from_millis(160);
const SPECTRUM_HEIGHT: f32 = 72.0;
const STARTING_REPAINT: Duration = Duration::from_millis(50);

pub struct WayvibesApp {
    // Dropped before the runtime so the tasks are aborted while it still exists.
    poller: Option<FrequencyPoller>,
    volume: VolumeWriter,
    _tray_subscription: Subscription,
    keypress: KeypressFeedback,

    config: Config,
    store: Arc<StateStore>,
    snapshot: watch::Receiver<StoreSnapshot>,
    importer: Arc<DragImportController>,
    picker: Arc<RfdPicker>,
    revealer: Arc<SystemRevealer>,
    keys: EventChannel<KeyEvent>,
    tray_import: EventChannel<()>,
    hover: HoverTracker,

    spectrum: Arc<Mutex<AudioSpectrumController>>,
    spectrum_bars: Arc<Mutex<Vec<u8>>>,

    volume_draft: Option<f32>,
    pulse_seen: u64,
    pulse_started: Option<Instant>,

    runtime: Runtime,
}

impl WayvibesApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        runtime: Runtime,
        config: Config,
    ) -> anyhow::Result<Self> {
        let gateway = ProcessGateway::from_command_line(&config.backend_command)
            .context("backend_command is empty")?;
        let autostart = XdgAutostart::for_current_exe().context("locating autostart entry")?;
        let store = Arc::new(StateStore::new(Arc::new(gateway), Arc::new(autostart)));
        let picker = Arc::new(RfdPicker::new(config.last_import_dir.clone()));
        let importer = Arc::new(DragImportController::new(store.clone(), picker.clone()));

        let tray_import = EventChannel::new(TRAY_IMPORT_EVENT);
        let tray_subscription = {
            let _guard = runtime.enter();
            importer.listen_tray_import(&tray_import)?
        };

        let keys = EventChannel::new("keydown");
        let keypress = KeypressFeedback::attach(&keys);

        // Repaint whenever the store publishes, including from background tasks.
        let mut updates = store.subscribe();
        let ctx = cc.egui_ctx.clone();
        runtime.spawn(async move {
            while updates.changed().await.is_ok() {
                ctx.request_repaint();
            }
        });

        let initial = store.clone();
        runtime.spawn(async move { initial.refresh_all().await });
        let volume = VolumeWriter::spawn(store.clone(), runtime.handle());

        tracing::info!("wayvibes-ui started");
        Ok(Self {
            poller: None,
            volume,
            _tray_subscription: tray_subscription,
            keypress,
            config,
            snapshot: store.subscribe(),
            store,
            importer,
            picker,
            revealer: Arc::new(SystemRevealer::default()),
            keys,
            tray_import,
            hover: HoverTracker::default(),
            spectrum: Arc::new(Mutex::new(AudioSpectrumController::with_cpal())),
            spectrum_bars: Arc::new(Mutex::new(Vec::new())),
            volume_draft: None,
            pulse_seen: 0,
            pulse_started: None,
            runtime,
        })
    }

    fn dispatch<F, Fut>(&self, action: F)
    where
        F: FnOnce(Arc<StateStore>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.runtime.spawn(action(self.store.clone()));
    }

    fn forward_input(&mut self, ctx: &egui::Context) {
        let (key_events, hovering, dropped) = ctx.input(|i| {
            let keys = key_events(&i.events);
            let dropped: Vec<_> = i.raw.dropped_files.iter().map(dropped_file).collect();
            (keys, !i.raw.hovered_files.is_empty(), dropped)
        });

        for event in &key_events {
            self.keys.emit(event);
        }

        match self.hover.update(hovering, dropped) {
            Some(DragSignal::Enter) => self.importer.on_drag_enter(&DragEvent::carrying_files()),
            Some(DragSignal::Leave) => self.importer.on_drag_leave(&DragEvent::carrying_files()),
            Some(DragSignal::Drop(files)) => {
                let importer = self.importer.clone();
                self.runtime.spawn(async move {
                    let mut event = DragEvent::with_files(files);
                    importer.on_drop(&mut event).await;
                });
            }
            None => {}
        }
    }

    fn remember_import_dir(&mut self) {
        let picked = self.picker.last_dir();
        if picked.is_some() && picked != self.config.last_import_dir {
            self.config.last_import_dir = picked;
            if let Err(err) = self.config.save() {
                tracing::warn!("failed to save config: {err:#}");
            }
        }
    }

    fn set_spectrum(&mut self, ctx: &egui::Context, enabled: bool) {
        if !enabled {
            self.poller = None;
            self.spectrum.lock().unwrap_or_else(|e| e.into_inner()).stop();
            self.spectrum_bars.lock().unwrap_or_else(|e| e.into_inner()).clear();
            return;
        }

        // Returns at once; the poller picks up the device when it opens and
        // ends on its own if opening fails.
        self.spectrum
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .start(self.runtime.handle());

        let bars = self.spectrum_bars.clone();
        let ctx = ctx.clone();
        self.poller = Some(FrequencyPoller::spawn_on(
            self.runtime.handle(),
            self.spectrum.clone(),
            self.config.spectrum_period(),
            move |data| {
                let mut bars = bars.lock().unwrap_or_else(|e| e.into_inner());
                bars.clear();
                bars.extend_from_slice(data);
                ctx.request_repaint();
            },
        ));
    }

    fn menu_bar(&self, ui: &mut egui::Ui) {
        egui::menu::bar(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui.button("Import pack…").clicked() {
                    self.tray_import.emit(&());
                    ui.close_menu();
                }
                if ui.button("Quit").clicked() {
                    ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
                }
            });
        });
    }

    fn status_section(&self, ui: &mut egui::Ui, snapshot: &StoreSnapshot) {
        let status = &snapshot.wayvibes_status;
        ui.horizontal(|ui| {
            let (color, text) = if !status.installed {
                (egui::Color32::GRAY, "Not installed".to_string())
            } else if status.is_running() {
                let pid = status.pid().map(|pid| format!(" (pid {pid})")).unwrap_or_default();
                (egui::Color32::from_rgb(100, 180, 100), format!("Running{pid}"))
            } else {
                (egui::Color32::from_rgb(200, 160, 60), "Stopped".to_string())
            };
            ui.colored_label(color, "●");
            ui.label(text);
            if let Some(version) = &status.version {
                ui.weak(format!("v{version}"));
            }
        });

        if !status.installed {
            ui.label(wayvibes_core::NOT_INSTALLED_MESSAGE);
            return;
        }

        ui.horizontal(|ui| {
            let label = if snapshot.paused { "▶ Resume" } else { "⏸ Pause" };
            if ui
                .add_enabled(!snapshot.is_loading, egui::Button::new(label))
                .clicked()
            {
                self.dispatch(|store| async move { store.toggle_pause().await });
            }
            if ui
                .add_enabled(
                    !snapshot.is_loading && status.is_running(),
                    egui::Button::new("⏹ Stop"),
                )
                .clicked()
            {
                self.dispatch(|store| async move { store.stop_wayvibes().await });
            }
        });
    }

    fn volume_section(&mut self, ui: &mut egui::Ui, snapshot: &StoreSnapshot) {
        let mut volume = self.volume_draft.unwrap_or(snapshot.volume);
        ui.horizontal(|ui| {
            ui.label("Volume");
            let response = ui.add(egui::Slider::new(&mut volume, 0.0..=1.0).show_value(false));
            ui.label(format!("{}%", volume_percent(volume)));

            if response.dragged() {
                self.volume_draft = Some(volume);
            } else {
                self.volume_draft = None;
            }
            if response.changed() {
                self.volume.set(volume);
            }
        });
    }

    fn packs_section(&self, ui: &mut egui::Ui, snapshot: &StoreSnapshot) {
        ui.horizontal(|ui| {
            ui.heading("Sound packs");
            if ui
                .add_enabled(!snapshot.is_loading, egui::Button::new("Import…"))
                .clicked()
            {
                let importer = self.importer.clone();
                self.runtime.spawn(async move { importer.on_import_click().await });
            }
        });

        if self.importer.is_dragging() {
            egui::Frame::group(ui.style())
                .stroke(egui::Stroke::new(2.0, ui.visuals().selection.bg_fill))
                .show(ui, |ui| {
                    ui.set_min_width(ui.available_width());
                    ui.label("Drop the archive to import it");
                });
        }

        if snapshot.sound_packs.is_empty() {
            ui.weak("No sound packs yet. Drop an archive here or use Import.");
            return;
        }

        egui::ScrollArea::vertical().max_height(260.0).show(ui, |ui| {
            for pack in &snapshot.sound_packs {
                let active = snapshot.active_pack_id.as_deref() == Some(pack.id.as_str());
                self.pack_row(ui, pack, active, snapshot.is_loading);
            }
        });
    }

    fn pack_row(&self, ui: &mut egui::Ui, pack: &SoundPack, active: bool, loading: bool) {
        egui::Frame::group(ui.style()).show(ui, |ui| {
            ui.set_min_width(ui.available_width());
            ui.horizontal(|ui| {
                let name = egui::RichText::new(&pack.name);
                ui.label(if active { name.strong() } else { name });
                ui.weak(format!("v{}", pack.version));
                if let Some(author) = &pack.author {
                    ui.weak(format!("by {author}"));
                }
            });
            if let Some(description) = &pack.description {
                ui.label(description);
            }
            ui.horizontal(|ui| {
                if active {
                    ui.colored_label(egui::Color32::from_rgb(100, 180, 100), "Active");
                } else if ui.add_enabled(!loading, egui::Button::new("Use")).clicked() {
                    let id = pack.id.clone();
                    self.dispatch(move |store| async move { store.set_active_pack(&id).await });
                }
                if ui.button("Open folder").clicked() {
                    let id = pack.id.clone();
                    let revealer = self.revealer.clone();
                    self.dispatch(move |store| async move {
                        if let Err(err) = store.reveal_pack(&id, revealer.as_ref()).await {
                            tracing::debug!(pack = %id, "reveal failed: {err}");
                        }
                    });
                }
                if ui.add_enabled(!loading, egui::Button::new("Delete")).clicked() {
                    let id = pack.id.clone();
                    self.dispatch(move |store| async move { store.delete_sound_pack(&id).await });
                }
            });
        });
    }

    fn settings_section(&mut self, ui: &mut egui::Ui, snapshot: &StoreSnapshot) {
        let mut autostart = snapshot.autostart_enabled;
        if ui
            .add_enabled(
                !snapshot.is_loading,
                egui::Checkbox::new(&mut autostart, "Launch at login"),
            )
            .changed()
        {
            self.dispatch(move |store| async move { store.set_autostart_enabled(autostart).await });
        }

        let (state, error) = {
            let mut spectrum = self.spectrum.lock().unwrap_or_else(|e| e.into_inner());
            (spectrum.update(), spectrum.error().map(str::to_string))
        };
        let mut enabled = state != SpectrumState::Disabled;
        ui.horizontal(|ui| {
            if ui.checkbox(&mut enabled, "Input spectrum").changed() {
                let ctx = ui.ctx().clone();
                self.set_spectrum(&ctx, enabled);
            }
            if state == SpectrumState::Starting {
                ui.spinner();
                ui.ctx().request_repaint_after(STARTING_REPAINT);
            }
        });
        if let Some(error) = error {
            ui.colored_label(egui::Color32::from_rgb(220, 120, 80), error);
        }
    }

    fn spectrum_view(&self, ui: &mut egui::Ui) {
        let bars = self.spectrum_bars.lock().unwrap_or_else(|e| e.into_inner());
        if bars.is_empty() {
            return;
        }
        let (rect, _) = ui.allocate_exact_size(
            egui::vec2(ui.available_width(), SPECTRUM_HEIGHT),
            egui::Sense::hover(),
        );
        let painter = ui.painter_at(rect);
        let width = rect.width() / bars.len() as f32;
        let color = ui.visuals().selection.bg_fill;
        for (i, value) in bars.iter().enumerate() {
            let height = rect.height() * f32::from(*value) / 255.0;
            let left = rect.left() + i as f32 * width;
            let bar = egui::Rect::from_min_max(
                egui::pos2(left + 1.0, rect.bottom() - height),
                egui::pos2(left + width - 1.0, rect.bottom()),
            );
            painter.rect_filled(bar, 0.0, color);
        }
    }

    fn keypress_badge(&mut self, ui: &mut egui::Ui) {
        let state = self.keypress.snapshot();
        if state.pulse_id != self.pulse_seen {
            self.pulse_seen = state.pulse_id;
            self.pulse_started = Some(Instant::now());
        }
        let Some(key) = state.last_key else {
            ui.weak("Press any key");
            return;
        };

        let pulsing = self
            .pulse_started
            .is_some_and(|started| started.elapsed() < PULSE_DURATION);
        let text = egui::RichText::new(key).monospace().strong();
        if pulsing {
            ui.label(text.color(egui::Color32::YELLOW));
            ui.ctx().request_repaint_after(PULSE_DURATION);
        } else {
            ui.label(text);
        }
    }

    fn error_banner(&self, ui: &mut egui::Ui, snapshot: &StoreSnapshot) {
        let Some(error) = &snapshot.last_error else {
            return;
        };
        ui.horizontal(|ui| {
            ui.colored_label(egui::Color32::RED, error);
            if ui.small_button("✕").clicked() {
                self.store.set_last_error(None);
            }
        });
    }
}

impl eframe::App for WayvibesApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.forward_input(ctx);
        self.remember_import_dir();
        let snapshot = self.snapshot.borrow_and_update().clone();

        egui::TopBottomPanel::top("menu").show(ctx, |ui| self.menu_bar(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Wayvibes");
            self.error_banner(ui, &snapshot);
            if snapshot.is_loading {
                ui.spinner();
            }

            self.status_section(ui, &snapshot);
            ui.separator();
            self.volume_section(ui, &snapshot);
            ui.separator();
            self.packs_section(ui, &snapshot);
            ui.separator();
            self.settings_section(ui, &snapshot);
            self.spectrum_view(ui);
            ui.separator();
            self.keypress_badge(ui);
        });
    }
}
