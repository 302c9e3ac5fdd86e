/// Periodic metrics sampler.
/// Runs on its own tokio task, independent of frame rendering.
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::metrics::{MetricsSnapshot, MetricsSource, SharedSnapshot, UNAVAILABLE};

pub const SAMPLE_PERIOD: Duration = Duration::from_secs(1);

pub struct MetricsTimer {
    handle: Option<JoinHandle<()>>,
}

impl MetricsTimer {
    /// Start sampling `names` into `snapshot`. Returns `None` when there is
    /// nothing to sample. Must be called within a tokio runtime.
    pub fn start(
        source: Arc<dyn MetricsSource>,
        names: Vec<String>,
        snapshot: SharedSnapshot,
    ) -> Option<Self> {
        if names.is_empty() {
            debug!("No metric widgets configured, metrics timer not started");
            return None;
        }

        info!("Starting metrics timer for {} metrics", names.len());
        let names = Arc::new(names);
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(SAMPLE_PERIOD);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;

                let source = source.clone();
                let names = names.clone();
                let sampled = tokio::task::spawn_blocking(move || sample(source.as_ref(), &names)).await;

                match sampled {
                    Ok(fresh) => {
                        let mut shared = snapshot.lock().unwrap_or_else(|p| p.into_inner());
                        *shared = fresh;
                    }
                    Err(e) => warn!("Metrics sampling task failed: {}", e),
                }
            }
        });

        Some(Self { handle: Some(handle) })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the task and wait for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
            info!("Metrics timer stopped");
        }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Metrics timer aborted");
        }
    }
}

/// One sampling pass. A failing metric becomes "N/A" on its own.
pub fn sample(source: &dyn MetricsSource, names: &[String]) -> MetricsSnapshot {
    source.refresh();
    let mut snapshot = MetricsSnapshot::new();
    for name in names {
        let value = match source.get_metric_value(name) {
            Ok(v) => v,
            Err(e) => {
                debug!("Metric {} unavailable: {}", name, e);
                UNAVAILABLE.to_string()
            }
        };
        snapshot.set(name, value);
    }
    snapshot
}
