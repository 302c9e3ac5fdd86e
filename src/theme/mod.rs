/// Theme files: the YAML layout the desktop editor writes, resolved into a
/// `DisplayConfig` for one panel resolution.
pub mod loader;
pub mod model;

use std::path::PathBuf;

use thiserror::Error;

pub use loader::load;
pub use model::DisplayConfig;

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("theme file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid color '{0}'")]
    InvalidColor(String),

    #[error("invalid rotation {0}, expected a multiple of 90")]
    InvalidRotation(i64),
}
