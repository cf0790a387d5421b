use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_SPECTRUM_FPS: u32 = 240;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Helper executable implementing the backend commands, optionally
    /// followed by arguments.
    pub backend_command: String,
    pub log_level: String,
    pub spectrum_fps: u32,
    pub last_import_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_command: "wayvibes-ui-backend".to_string(),
            log_level: "info".to_string(),
            spectrum_fps: 60,
            last_import_dir: None,
        }
    }
}

impl Config {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("wayvibes-ui").join("config.toml"))
    }

    /// Defaults when there is no config directory or no file yet. A file that
    /// exists but does not parse is an error.
    pub fn load() -> anyhow::Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err).with_context(|| format!("reading {}", path.display())),
        };
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path().context("no config directory")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)
            .with_context(|| format!("writing {}", path.display()))
    }

    pub fn spectrum_period(&self) -> Duration {
        let fps = self.spectrum_fps.clamp(1, MAX_SPECTRUM_FPS);
        Duration::from_secs_f64(1.0 / f64::from(fps))
    }
}
