//! Data types mirrored from the Wayvibes backend.
//!
//! These types are deserialized from the backend's JSON replies. Field names
//! follow the backend's camelCase convention on the wire.

use serde::{Deserialize, Serialize};

/// Volume used before the first config read completes.
pub const DEFAULT_VOLUME: f32 = 0.7;

/// State of the external sound daemon as reported by the backend.
///
/// When `installed` is false the `running` and `pid` fields carry no meaning;
/// use [`WayvibesStatus::is_running`] rather than reading `running` directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WayvibesStatus {
    pub installed: bool,
    pub running: bool,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub pid: Option<u32>,
}

impl WayvibesStatus {
    pub fn is_running(&self) -> bool {
        self.installed && self.running
    }

    pub fn pid(&self) -> Option<u32> {
        if self.is_running() { self.pid } else { None }
    }
}

/// An imported sound pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundPack {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Playback configuration owned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub active_pack_id: Option<String>,
    pub volume: f32,
    pub paused: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            active_pack_id: None,
            volume: DEFAULT_VOLUME,
            paused: false,
        }
    }
}

/// Round a `[0, 1]` volume to a whole percentage for display.
pub fn volume_percent(volume: f32) -> u8 {
    (volume.clamp(0.0, 1.0) * 100.0).round() as u8
}
