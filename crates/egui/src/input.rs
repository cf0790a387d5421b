//! Translating egui's per-frame input into the events the core expects.

use eframe::egui;
use wayvibes_core::{DroppedFile, KeyEvent};

/// Key presses in the shape of DOM keydowns, in arrival order.
///
/// A press that produces text is reported as that text ("a", "A", "-"),
/// taking the repeat flag from its `Key` event, which egui emits just before
/// the `Text`. Presses with no text ("Enter", "ArrowUp", ctrl chords) fall
/// back to the key name. Releases map to nothing.
pub fn key_events(events: &[egui::Event]) -> Vec<KeyEvent> {
    let mut out = Vec::new();
    let mut pending: Option<(egui::Key, bool)> = None;

    for event in events {
        match event {
            egui::Event::Key {
                key,
                pressed: true,
                repeat,
                ..
            } => {
                if let Some((key, repeat)) = pending.replace((*key, *repeat)) {
                    out.push(keydown(key.name(), repeat));
                }
            }
            egui::Event::Text(text) => {
                let repeat = pending.take().is_some_and(|(_, repeat)| repeat);
                out.push(keydown(text, repeat));
            }
            _ => {}
        }
    }
    if let Some((key, repeat)) = pending {
        out.push(keydown(key.name(), repeat));
    }
    out
}

fn keydown(key: &str, repeat: bool) -> KeyEvent {
    if repeat {
        KeyEvent::repeated(key)
    } else {
        KeyEvent::new(key)
    }
}

#[derive(Debug, PartialEq)]
pub enum DragSignal {
    Enter,
    Leave,
    Drop(Vec<DroppedFile>),
}

/// egui reports drags as "files are hovering this frame" rather than as
/// enter/leave events, so edges are derived here.
#[derive(Debug, Default)]
pub struct HoverTracker {
    hovering: bool,
}

impl HoverTracker {
    pub fn update(&mut self, hovering: bool, dropped: Vec<DroppedFile>) -> Option<DragSignal> {
        let was_hovering = std::mem::replace(&mut self.hovering, hovering);
        if !dropped.is_empty() {
            self.hovering = false;
            return Some(DragSignal::Drop(dropped));
        }
        match (was_hovering, hovering) {
            (false, true) => Some(DragSignal::Enter),
            (true, false) => Some(DragSignal::Leave),
            _ => None,
        }
    }
}

pub fn dropped_file(file: &egui::DroppedFile) -> DroppedFile {
    match &file.path {
        Some(path) => DroppedFile::from_path(path.clone()),
        None => DroppedFile::without_path(file.name.clone()),
    }
}
