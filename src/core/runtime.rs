/// Device runtime loop: render, transmit, sleep, and swap in a fresh
/// pipeline whenever the theme file changes on disk.
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{anyhow, Context, Result};
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::config::ServiceConfig;
use crate::device::Device;
use crate::metrics::{MetricsSource, MetricsTimer};
use crate::render::{FrameSource, Pipeline};
use crate::theme;

/// Builds a frame source from a theme file.
pub trait PipelineBuilder: Send {
    fn build(&self, theme: &Path, width: u32, height: u32) -> Result<Box<dyn FrameSource>>;
}

/// Loads the YAML theme and wires it to the system metrics.
pub struct ThemePipelineBuilder {
    metrics: Arc<dyn MetricsSource>,
    default_font: Option<PathBuf>,
}

impl ThemePipelineBuilder {
    pub fn new(metrics: Arc<dyn MetricsSource>, default_font: Option<PathBuf>) -> Self {
        Self { metrics, default_font }
    }
}

impl PipelineBuilder for ThemePipelineBuilder {
    fn build(&self, theme: &Path, width: u32, height: u32) -> Result<Box<dyn FrameSource>> {
        let config = theme::load(theme, width, height)?;
        let pipeline = Pipeline::build(config, self.metrics.clone(), self.default_font.as_deref())?;
        Ok(Box::new(pipeline))
    }
}

pub struct Runtime {
    device: Device,
    builder: Box<dyn PipelineBuilder>,
    theme_path: PathBuf,
    pipeline: Option<Box<dyn FrameSource>>,
    /// mtime of the last load attempt, successful or not
    loaded_mtime: Option<SystemTime>,
    /// Timers of replaced pipelines, joined between frames
    retired: Vec<MetricsTimer>,
    frame_floor: Duration,
    retry_backoff: Duration,
    frames_sent: u64,
}

impl Runtime {
    pub fn new(device: Device, builder: Box<dyn PipelineBuilder>, config: &ServiceConfig) -> Self {
        let theme_path = config.theme_path(&device.descriptor().config_file_name());
        info!("Theme for {}: {}", device.descriptor().name, theme_path.display());
        Self {
            device,
            builder,
            theme_path,
            pipeline: None,
            loaded_mtime: None,
            retired: Vec::new(),
            frame_floor: config.frame_floor,
            retry_backoff: config.retry_backoff,
            frames_sent: 0,
        }
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Rebuild the pipeline if the theme file is newer than the last load.
    /// A failed build keeps the current pipeline.
    fn check_reload(&mut self) {
        let mtime = match fs::metadata(&self.theme_path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(e) => {
                if self.pipeline.is_none() {
                    debug!("Theme {} not readable: {}", self.theme_path.display(), e);
                }
                return;
            }
        };
        if self.loaded_mtime.is_some_and(|loaded| mtime <= loaded) {
            return;
        }

        if self.pipeline.is_some() {
            info!("Theme {} changed, reloading", self.theme_path.display());
        } else {
            info!("Loading theme {}", self.theme_path.display());
        }
        self.loaded_mtime = Some(mtime);

        let descriptor = self.device.descriptor();
        match self.builder.build(&self.theme_path, descriptor.width, descriptor.height) {
            Ok(fresh) => {
                if let Some(mut old) = self.pipeline.replace(fresh) {
                    self.retired.extend(old.take_metrics_timer());
                }
                info!("Pipeline rebuilt");
            }
            Err(e) if self.pipeline.is_some() => {
                warn!("Theme reload failed, keeping previous configuration: {:#}", e);
            }
            Err(e) => {
                warn!("Theme load failed: {:#}", e);
            }
        }
    }

    /// One iteration: reload check, render, transmit. Returns how long to
    /// wait before the next frame.
    pub fn step(&mut self) -> Result<Duration> {
        self.check_reload();

        let pipeline = self
            .pipeline
            .as_mut()
            .ok_or_else(|| anyhow!("no valid theme loaded from {}", self.theme_path.display()))?;
        let (frame, duration) = pipeline.next_frame().context("Failed to render frame")?;
        self.device.send_frame(&frame).context("Failed to send frame")?;

        self.frames_sent += 1;
        if self.frames_sent == 1 {
            info!("First frame sent to {}", self.device.descriptor().name);
        }
        Ok(duration.max(self.frame_floor))
    }

    async fn join_retired(&mut self) {
        for timer in self.retired.drain(..) {
            timer.shutdown().await;
        }
    }

    /// Run until `shutdown` resolves, then stop the metrics task and end
    /// the device session. Needs a multi-threaded runtime.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);
        info!("Streaming to {}", self.device.descriptor().name);

        loop {
            let delay = match tokio::task::block_in_place(|| self.step()) {
                Ok(delay) => delay,
                Err(e) => {
                    error!("Frame iteration failed: {:#}", e);
                    self.retry_backoff
                }
            };
            self.join_retired().await;

            tokio::select! {
                _ = &mut shutdown => break,
                _ = time::sleep(delay) => {}
            }
        }

        info!("Shutting down after {} frames", self.frames_sent);
        if let Some(timer) = self.pipeline.as_mut().and_then(|p| p.take_metrics_timer()) {
            self.retired.push(timer);
        }
        self.join_retired().await;
        self.pipeline = None;
        tokio::task::block_in_place(|| self.device.shutdown());
        Ok(())
    }
}
