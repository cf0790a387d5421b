//! Typed call boundary to the external Wayvibes backend.
//!
//! The backend owns the daemon, the pack directory and the persisted config.
//! Implementations of [`CommandGateway`] only marshal arguments and results;
//! they must not add retries, caching or validation.

use std::path::Path;

use async_trait::async_trait;

use crate::model::{AppConfig, SoundPack, WayvibesStatus};

/// Names of the backend commands, as they appear on the wire.
pub mod command {
    pub const GET_WAYVIBES_STATUS: &str = "get_wayvibes_status";
    pub const GET_SOUND_PACKS: &str = "get_sound_packs";
    pub const IMPORT_SOUND_PACK: &str = "import_sound_pack";
    pub const DELETE_SOUND_PACK: &str = "delete_sound_pack";
    pub const GET_PACK_PATH: &str = "get_pack_path";
    pub const GET_CONFIG: &str = "get_config";
    pub const SET_VOLUME: &str = "set_volume";
    pub const TOGGLE_PAUSE: &str = "toggle_pause";
    pub const STOP_WAYVIBES: &str = "stop_wayvibes";
    pub const SET_ACTIVE_PACK: &str = "set_active_pack";
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The backend ran the command and reported a failure. The message is
    /// shown to the user as-is.
    #[error("{message}")]
    Command {
        command: &'static str,
        message: String,
    },

    #[error("Failed to reach backend for '{command}': {source}")]
    Unavailable {
        command: &'static str,
        source: std::io::Error,
    },

    #[error("Invalid reply from backend for '{command}': {source}")]
    Decode {
        command: &'static str,
        source: serde_json::Error,
    },
}

impl GatewayError {
    pub fn command(&self) -> &'static str {
        match self {
            GatewayError::Command { command, .. }
            | GatewayError::Unavailable { command, .. }
            | GatewayError::Decode { command, .. } => command,
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// The fixed command surface of the backend.
#[async_trait]
pub trait CommandGateway: Send + Sync {
    async fn get_wayvibes_status(&self) -> GatewayResult<WayvibesStatus>;

    async fn get_sound_packs(&self) -> GatewayResult<Vec<SoundPack>>;

    async fn import_sound_pack(&self, path: &Path) -> GatewayResult<SoundPack>;

    async fn delete_sound_pack(&self, pack_id: &str) -> GatewayResult<()>;

    /// Directory of an installed pack on disk.
    async fn get_pack_path(&self, pack_id: &str) -> GatewayResult<String>;

    async fn get_config(&self) -> GatewayResult<AppConfig>;

    async fn set_volume(&self, volume: f32) -> GatewayResult<()>;

    async fn toggle_pause(&self) -> GatewayResult<()>;

    async fn stop_wayvibes(&self) -> GatewayResult<()>;

    async fn set_active_pack(&self, pack_id: &str) -> GatewayResult<()>;
}
