//! Client-side state and input handling for the Wayvibes UI.
//!
//! The backend that runs the sound daemon and manages pack files is reached
//! through [`CommandGateway`]. Everything here is toolkit-agnostic; the UI
//! crate forwards its events in and renders [`StoreSnapshot`]s out.

pub mod events;
pub mod gateway;
pub mod import;
pub mod keypress;
pub mod model;
pub mod platform;
pub mod store;

#[cfg(test)]
mod testing;

pub use events::{EventChannel, Subscription, TRAY_IMPORT_EVENT};
pub use gateway::{CommandGateway, GatewayError, GatewayResult};
pub use import::{
    ARCHIVE_EXTENSIONS, DragEvent, DragImportController, DragState, DroppedFile,
    INVALID_ARCHIVE_MESSAGE, NOT_INSTALLED_MESSAGE, archive_filter, is_archive_path,
};
pub use keypress::{KeyEvent, KeypressFeedback, KeypressState};
pub use model::{AppConfig, DEFAULT_VOLUME, SoundPack, WayvibesStatus, volume_percent};
pub use platform::{Autostart, FileFilter, FilePicker, PlatformError, Revealer};
pub use store::{Action, Refresh, StateStore, StoreError, StoreSnapshot, VolumeWriter};
