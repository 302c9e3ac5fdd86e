/// Host telemetry: CPU and memory through sysinfo, GPU through DRM sysfs
/// with an nvidia-smi fallback.
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use sysinfo::{Components, CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tracing::{debug, info};

use crate::metrics::{MetricsError, MetricsSource};

const DRM_ROOT: &str = "/sys/class/drm";
const VENDOR_AMD: u32 = 0x1002;
const VENDOR_INTEL: u32 = 0x8086;
const VENDOR_NVIDIA: u32 = 0x10de;

#[derive(Debug, Default, Clone, PartialEq)]
struct Readings {
    cpu_usage: Option<f32>,
    cpu_temperature: Option<f32>,
    cpu_frequency: Option<u64>,
    ram_used: Option<u64>,
    ram_total: Option<u64>,
    gpu_usage: Option<f32>,
    gpu_temperature: Option<f32>,
    gpu_frequency: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
enum GpuBackend {
    /// `/sys/class/drm/cardN/device`
    Drm { device: PathBuf, hwmon: Option<PathBuf> },
    NvidiaSmi,
    None,
}

#[derive(Debug, Clone)]
struct GpuInfo {
    vendor: &'static str,
    name: String,
    backend: GpuBackend,
}

struct Probes {
    system: System,
    components: Components,
}

pub struct SystemMetrics {
    probes: Mutex<Probes>,
    readings: Mutex<Readings>,
    gpu: GpuInfo,
}

impl SystemMetrics {
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );
        let components = Components::new_with_refreshed_list();
        let gpu = detect_gpu();
        info!("Metrics source ready (GPU: {} {})", gpu.vendor, gpu.name);

        Self {
            probes: Mutex::new(Probes { system, components }),
            readings: Mutex::new(Readings::default()),
            gpu,
        }
    }

    fn read(&self) -> Readings {
        self.readings.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSource for SystemMetrics {
    fn refresh(&self) {
        let mut probes = self.probes.lock().unwrap_or_else(|p| p.into_inner());
        probes.system.refresh_cpu_all();
        probes.system.refresh_memory();
        probes.components.refresh();

        let mut fresh = Readings {
            cpu_usage: Some(probes.system.global_cpu_usage()),
            cpu_temperature: cpu_temperature(&probes.components),
            cpu_frequency: probes.system.cpus().first().map(|c| c.frequency()).filter(|f| *f > 0),
            ram_used: Some(probes.system.used_memory()),
            ram_total: Some(probes.system.total_memory()).filter(|t| *t > 0),
            ..Readings::default()
        };
        drop(probes);

        match &self.gpu.backend {
            GpuBackend::Drm { device, hwmon } => {
                fresh.gpu_usage = read_int(&device.join("gpu_busy_percent")).map(|v| v as f32);
                fresh.gpu_temperature = hwmon
                    .as_deref()
                    .and_then(|h| read_int(&h.join("temp1_input")))
                    .map(|milli| milli as f32 / 1000.0);
                fresh.gpu_frequency = hwmon
                    .as_deref()
                    .and_then(|h| read_int(&h.join("freq1_input")))
                    .map(|hz| (hz / 1_000_000) as u64)
                    .or_else(|| active_dpm_clock(&device.join("pp_dpm_sclk")));
            }
            GpuBackend::NvidiaSmi => {
                if let Some((usage, temp, freq)) = query_nvidia() {
                    fresh.gpu_usage = Some(usage);
                    fresh.gpu_temperature = Some(temp);
                    fresh.gpu_frequency = Some(freq);
                }
            }
            GpuBackend::None => {}
        }

        *self.readings.lock().unwrap_or_else(|p| p.into_inner()) = fresh;
    }

    fn get_metric_value(&self, name: &str) -> Result<String, MetricsError> {
        let r = self.read();
        let missing = || MetricsError::Unavailable(name.to_string());
        match name {
            "cpu_usage" => r.cpu_usage.map(|v| format!("{:.0}", v)).ok_or_else(missing),
            "cpu_temperature" => r.cpu_temperature.map(|v| format!("{:.0}", v)).ok_or_else(missing),
            "cpu_frequency" => r.cpu_frequency.map(|v| v.to_string()).ok_or_else(missing),
            "ram_usage" => match (r.ram_used, r.ram_total) {
                (Some(used), Some(total)) => Ok(format!("{:.0}", used as f64 * 100.0 / total as f64)),
                _ => Err(missing()),
            },
            "ram_used" => r.ram_used.map(gib).ok_or_else(missing),
            "ram_total" => r.ram_total.map(gib).ok_or_else(missing),
            "gpu_usage" => r.gpu_usage.map(|v| format!("{:.0}", v)).ok_or_else(missing),
            "gpu_temperature" => r.gpu_temperature.map(|v| format!("{:.0}", v)).ok_or_else(missing),
            "gpu_frequency" => r.gpu_frequency.map(|v| v.to_string()).ok_or_else(missing),
            "gpu_name" => Ok(self.gpu.name.clone()),
            "gpu_vendor" => Ok(self.gpu.vendor.to_string()),
            _ => Err(MetricsError::Unknown(name.to_string())),
        }
    }
}

fn gib(bytes: u64) -> String {
    format!("{:.1}", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
}

/// Package sensors first, then per-core sensors, hottest wins.
fn cpu_temperature(components: &Components) -> Option<f32> {
    let pick = |keys: &[&str]| {
        components
            .list()
            .iter()
            .filter(|c| {
                let label = c.label().to_lowercase();
                keys.iter().any(|k| label.contains(k))
            })
            .map(|c| c.temperature())
            .filter(|t| t.is_finite() && *t > 0.0)
            .reduce(f32::max)
    };
    pick(&["package", "tctl", "tdie", "cpu"]).or_else(|| pick(&["core"]))
}

fn read_int(path: &Path) -> Option<i64> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn read_hex(path: &Path) -> Option<u32> {
    let s = fs::read_to_string(path).ok()?;
    u32::from_str_radix(s.trim().trim_start_matches("0x"), 16).ok()
}

/// The line marked `*` in a `pp_dpm_sclk` table, e.g. `1: 1800Mhz *`
fn active_dpm_clock(path: &Path) -> Option<u64> {
    let table = fs::read_to_string(path).ok()?;
    parse_dpm_table(&table)
}

fn parse_dpm_table(table: &str) -> Option<u64> {
    let line = table.lines().find(|l| l.trim_end().ends_with('*'))?;
    let clock = line.split_whitespace().nth(1)?;
    clock.trim_end_matches(|c: char| c.is_ascii_alphabetic()).parse().ok()
}

fn find_hwmon(device: &Path) -> Option<PathBuf> {
    fs::read_dir(device.join("hwmon"))
        .ok()?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .find(|p| p.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with("hwmon")))
}

fn detect_gpu() -> GpuInfo {
    let mut cards: Vec<PathBuf> = fs::read_dir(DRM_ROOT)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("card") && !n.contains('-'))
                })
                .map(|p| p.join("device"))
                .collect()
        })
        .unwrap_or_default();
    cards.sort();

    // discrete AMD first, then NVIDIA, then Intel
    for wanted in [VENDOR_AMD, VENDOR_NVIDIA, VENDOR_INTEL] {
        for device in &cards {
            if read_hex(&device.join("vendor")) != Some(wanted) {
                continue;
            }
            let device_id = read_hex(&device.join("device")).unwrap_or(0);
            debug!("GPU candidate {} vendor {:04x} device {:04x}", device.display(), wanted, device_id);
            return match wanted {
                VENDOR_NVIDIA => GpuInfo {
                    vendor: "nvidia",
                    name: nvidia_name().unwrap_or_else(|| "NVIDIA GPU".to_string()),
                    backend: GpuBackend::NvidiaSmi,
                },
                VENDOR_AMD => GpuInfo {
                    vendor: "amd",
                    name: format!("AMD GPU (Device {:04x})", device_id),
                    backend: GpuBackend::Drm {
                        device: device.clone(),
                        hwmon: find_hwmon(device),
                    },
                },
                _ => GpuInfo {
                    vendor: "intel",
                    name: "Intel GPU".to_string(),
                    backend: GpuBackend::Drm {
                        device: device.clone(),
                        hwmon: find_hwmon(device),
                    },
                },
            };
        }
    }

    GpuInfo {
        vendor: "unknown",
        name: "N/A".to_string(),
        backend: GpuBackend::None,
    }
}

fn nvidia_smi(query: &str) -> Option<String> {
    let output = Command::new("nvidia-smi")
        .args([&format!("--query-gpu={}", query), "--format=csv,noheader,nounits"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()?
        .lines()
        .next()
        .map(|l| l.trim().to_string())
}

fn nvidia_name() -> Option<String> {
    nvidia_smi("name").filter(|n| !n.is_empty())
}

fn query_nvidia() -> Option<(f32, f32, u64)> {
    let line = nvidia_smi("utilization.gpu,temperature.gpu,clocks.gr")?;
    parse_nvidia_line(&line)
}

fn parse_nvidia_line(line: &str) -> Option<(f32, f32, u64)> {
    let mut fields = line.split(',').map(str::trim);
    let usage = fields.next()?.parse().ok()?;
    let temp = fields.next()?.parse().ok()?;
    let freq = fields.next()?.parse().ok()?;
    Some((usage, temp, freq))
}
