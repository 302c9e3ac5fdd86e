/// Named telemetry values and the background task that samples them.
pub mod system;
pub mod timer;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

pub use system::SystemMetrics;
pub use timer::MetricsTimer;

/// Shown for any metric that has no current value
pub const UNAVAILABLE: &str = "N/A";

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("unknown metric '{0}'")]
    Unknown(String),

    #[error("sensor unavailable for '{0}'")]
    Unavailable(String),
}

/// A source of named scalar readings.
pub trait MetricsSource: Send + Sync {
    /// Take fresh readings. Called once per sampling tick.
    fn refresh(&self) {}

    fn get_metric_value(&self, name: &str) -> Result<String, MetricsError>;
}

/// Latest value per metric name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    values: HashMap<String, String>,
}

impl MetricsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: String) {
        self.values.insert(name.to_string(), value);
    }

    /// Value for `name`, or "N/A"
    pub fn get(&self, name: &str) -> &str {
        self.values.get(name).map(String::as_str).unwrap_or(UNAVAILABLE)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub type SharedSnapshot = Arc<Mutex<MetricsSnapshot>>;

/// Copy the snapshot out and release the lock before drawing.
pub fn read_snapshot(shared: &SharedSnapshot) -> MetricsSnapshot {
    shared.lock().unwrap_or_else(|p| p.into_inner()).clone()
}
