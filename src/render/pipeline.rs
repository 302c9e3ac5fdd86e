/// A fully built frame pipeline for one loaded theme: background source,
/// compositor, metrics snapshot and the timer feeding it.
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use image::RgbImage;
use tracing::info;

use crate::metrics::{read_snapshot, MetricsSnapshot, MetricsSource, MetricsTimer, SharedSnapshot};
use crate::render::compositor::Compositor;
use crate::render::sources::BackgroundSource;
use crate::render::text::{self, SharedFont};
use crate::theme::DisplayConfig;

/// Produces the next output frame and how long to show it.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<(RgbImage, Duration)>;

    /// Hand over the metrics timer so it can be stopped and joined.
    fn take_metrics_timer(&mut self) -> Option<MetricsTimer> {
        None
    }
}

pub struct Pipeline {
    background: BackgroundSource,
    compositor: Compositor,
    snapshot: SharedSnapshot,
    timer: Option<MetricsTimer>,
}

impl Pipeline {
    /// Build from a loaded config. Starts the metrics timer, so this must run
    /// inside a tokio runtime.
    pub fn build(config: DisplayConfig, metrics: Arc<dyn MetricsSource>, default_font: Option<&Path>) -> Result<Self> {
        let font = text::load_font(config.font_path.as_deref(), default_font);
        Self::with_font(config, metrics, font)
    }

    pub fn with_font(config: DisplayConfig, metrics: Arc<dyn MetricsSource>, font: SharedFont) -> Result<Self> {
        let background = BackgroundSource::load(&config.background, config.width, config.height)
            .with_context(|| format!("Failed to load background {}", config.background.path.display()))?;

        let snapshot: SharedSnapshot = Arc::new(Mutex::new(MetricsSnapshot::new()));
        let timer = MetricsTimer::start(metrics, config.metric_names(), snapshot.clone());

        info!(
            "Pipeline ready: {}x{}, rotation {:?}, {} background frame(s)",
            config.width,
            config.height,
            config.rotation,
            background.frame_count()
        );
        Ok(Self {
            background,
            compositor: Compositor::new(config, font),
            snapshot,
            timer,
        })
    }

    pub fn config(&self) -> &DisplayConfig {
        self.compositor.config()
    }
}

impl FrameSource for Pipeline {
    fn next_frame(&mut self) -> Result<(RgbImage, Duration)> {
        let metrics = read_snapshot(&self.snapshot);
        let (background, duration) = self.background.current_frame();
        let frame = self.compositor.compose(background, &metrics, &Local::now());
        Ok((frame, duration))
    }

    fn take_metrics_timer(&mut self) -> Option<MetricsTimer> {
        self.timer.take()
    }
}
