use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shortest time a frame stays on the panel
pub const FRAME_FLOOR: Duration = Duration::from_millis(200);

/// Wait after a failed iteration before trying again
pub const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Top-level service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory holding one theme file per panel resolution
    pub config_dir: PathBuf,
    /// Font used when a theme names none
    pub default_font: Option<PathBuf>,
    pub frame_floor: Duration,
    pub retry_backoff: Duration,
}

impl ServiceConfig {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            default_font: None,
            frame_floor: FRAME_FLOOR,
            retry_backoff: RETRY_BACKOFF,
        }
    }

    pub fn theme_path(&self, file_name: &str) -> PathBuf {
        self.config_dir.join(file_name)
    }

    pub fn default_font(&self) -> Option<&Path> {
        self.default_font.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum LogOutput {
    /// Human-readable console output (development)
    #[default]
    Console,
    /// Daily-rotating file in the given directory (production)
    File(PathBuf),
}

impl LogOutput {
    pub fn from_dir(dir: Option<PathBuf>) -> Self {
        match dir {
            Some(dir) => LogOutput::File(dir),
            None => LogOutput::Console,
        }
    }
}
