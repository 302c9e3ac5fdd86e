use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod config;
mod core;
mod device;
mod metrics;
mod render;
mod theme;

use crate::config::{LogOutput, ServiceConfig};
use crate::core::{Runtime, ThemePipelineBuilder};
use crate::device::{registry, Device, DeviceError};
use crate::metrics::SystemMetrics;

#[derive(Parser, Debug)]
#[command(name = "lcd-streamer", about = "Stream telemetry and media to USB LCD panels")]
struct Args {
    /// Directory holding config_<W><H>.yaml theme files
    #[arg(short, long)]
    config: PathBuf,

    /// TrueType font used when a theme names none
    #[arg(long)]
    font: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write daily-rotating logs here instead of the console
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn init_logging(level: &str, output: &LogOutput) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| level.parse().unwrap_or_default());
    match output {
        LogOutput::Console => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
        LogOutput::File(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "lcd-streamer.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Some(guard)
        }
    }
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received"),
        _ = terminate => info!("SIGTERM received"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(&args.log_level, &LogOutput::from_dir(args.log_dir.clone()));

    info!("lcd-streamer v{} starting (config: {})", env!("CARGO_PKG_VERSION"), args.config.display());

    let descriptor = match registry::find_connected() {
        Ok(Some(d)) => d,
        Ok(None) => {
            error!("No supported LCD panel connected");
            return Err(DeviceError::NotFound.into());
        }
        Err(e) => {
            error!("USB enumeration failed: {}", e);
            return Err(e).context("USB enumeration failed");
        }
    };
    info!(
        "Found {} ({:04x}:{:04x}), {}x{}",
        descriptor.name, descriptor.vendor_id, descriptor.product_id, descriptor.width, descriptor.height
    );

    let mut device = Device::open(descriptor).with_context(|| format!("Failed to open {}", descriptor.name))?;
    if let Err(e) = device.reset() {
        warn!("Bus reset failed: {}", e);
    }

    let mut service = ServiceConfig::new(&args.config);
    service.default_font = args.font.clone();

    let metrics = Arc::new(SystemMetrics::new());
    let builder = ThemePipelineBuilder::new(metrics, service.default_font().map(Path::to_path_buf));
    let runtime = Runtime::new(device, Box::new(builder), &service);

    runtime.run_until(shutdown_signal()).await?;

    info!("lcd-streamer shutdown");
    Ok(())
}
