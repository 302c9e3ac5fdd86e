/// YAML theme loader.
/// Reads the editor's `display:` document and resolves it against the panel
/// resolution and the theme file's directory.
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_yaml::Value;
use tracing::{debug, info, warn};

use crate::theme::model::*;
use crate::theme::ThemeError;

#[derive(Debug, Deserialize)]
struct ThemeFile {
    display: RawDisplay,
}

#[derive(Debug, Deserialize)]
struct RawDisplay {
    #[serde(default)]
    rotation: Rotation,
    #[serde(default = "default_refresh_interval")]
    refresh_interval: f32,
    #[serde(default)]
    font_family: Option<String>,
    #[serde(default)]
    background: RawBackground,
    #[serde(default)]
    foreground: RawForeground,
    #[serde(default)]
    metrics: RawMetrics,
    #[serde(default)]
    date: Option<DateConfig>,
    #[serde(default)]
    time: Option<TimeConfig>,
    #[serde(default)]
    custom_texts: Vec<TextConfig>,
    /// Overlays are converted one by one so a bad entry only drops itself
    #[serde(default)]
    shapes: Vec<Value>,
    #[serde(default)]
    bar_graphs: Vec<Value>,
    #[serde(default)]
    circular_graphs: Vec<Value>,
    #[serde(default)]
    text_effects: TextEffects,
}

#[derive(Debug, Deserialize)]
struct RawBackground {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    path: String,
    #[serde(rename = "type", default)]
    kind: Option<BackgroundKind>,
    #[serde(default)]
    scale_mode: String,
    /// `{r,g,b}`, `[r,g,b]` or a hex string
    #[serde(default)]
    color: Value,
    #[serde(default = "default_alpha")]
    alpha: f32,
}

impl Default for RawBackground {
    fn default() -> Self {
        Self {
            enabled: true,
            path: String::new(),
            kind: None,
            scale_mode: String::new(),
            color: Value::Null,
            alpha: 1.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawForeground {
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    path: String,
    #[serde(default)]
    position: Position,
    #[serde(default = "default_alpha")]
    alpha: f32,
}

#[derive(Debug, Default, Deserialize)]
struct RawMetrics {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    configs: Vec<MetricConfig>,
}

fn default_true() -> bool {
    true
}

fn default_alpha() -> f32 {
    1.0
}

fn default_refresh_interval() -> f32 {
    1.0
}

/// Load the theme at `path` for a `width`x`height` panel.
pub fn load(path: &Path, width: u32, height: u32) -> Result<DisplayConfig, ThemeError> {
    if !path.exists() {
        return Err(ThemeError::NotFound(path.to_path_buf()));
    }
    let text = fs::read_to_string(path).map_err(|source| ThemeError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let config = parse(&text, base_dir, width, height).map_err(|source| ThemeError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        "Theme loaded from {} ({} metrics, {} texts, {} shapes, {} bars, {} arcs)",
        path.display(),
        config.metrics.len(),
        config.texts.len(),
        config.shapes.len(),
        config.bars.len(),
        config.arcs.len()
    );
    Ok(config)
}

/// Parse theme YAML; relative media paths resolve against `base_dir`.
pub fn parse(text: &str, base_dir: &Path, width: u32, height: u32) -> Result<DisplayConfig, serde_yaml::Error> {
    let file: ThemeFile = serde_yaml::from_str(text)?;
    let raw = file.display;
    let resolution = format!("{}{}", width, height);

    let background = {
        let bg = raw.background;
        let kind = match bg.kind {
            Some(kind) => kind,
            None if bg.path.is_empty() => BackgroundKind::Color,
            None => BackgroundKind::Image,
        };
        BackgroundConfig {
            enabled: bg.enabled,
            kind,
            path: resolve_path(base_dir, &bg.path),
            scale_mode: ScaleMode::parse(&bg.scale_mode),
            color: parse_background_color(&bg.color),
            alpha: bg.alpha.clamp(0.0, 1.0),
        }
    };

    let foreground = if raw.foreground.enabled && !raw.foreground.path.is_empty() {
        let path = raw.foreground.path.replace("{resolution}", &resolution);
        Some(ForegroundConfig {
            path: resolve_path(base_dir, &path),
            position: raw.foreground.position,
            alpha: raw.foreground.alpha.clamp(0.0, 1.0),
        })
    } else {
        None
    };

    let metrics = if raw.metrics.enabled {
        raw.metrics
            .configs
            .into_iter()
            .filter(|m| m.enabled)
            .filter(|m| {
                if m.name.is_empty() {
                    warn!("Skipping metric widget without a name");
                }
                !m.name.is_empty()
            })
            .collect()
    } else {
        Vec::new()
    };

    let font_path = raw.font_family.as_deref().and_then(|family| {
        let candidate = resolve_path(base_dir, family);
        if candidate.is_file() {
            Some(candidate)
        } else {
            debug!("font_family '{}' is not a font file, using default font", family);
            None
        }
    });

    Ok(DisplayConfig {
        width,
        height,
        rotation: raw.rotation,
        refresh_interval: raw.refresh_interval,
        font_path,
        background,
        foreground,
        metrics,
        date: raw.date.filter(|d| d.enabled),
        time: raw.time.filter(|t| t.enabled),
        texts: raw
            .custom_texts
            .into_iter()
            .filter(|t| t.enabled && !t.text.is_empty())
            .collect(),
        shapes: overlays::<ShapeConfig>("shapes", raw.shapes)
            .into_iter()
            .filter(|s| s.enabled)
            .collect(),
        bars: overlays::<BarConfig>("bar_graphs", raw.bar_graphs)
            .into_iter()
            .filter(|b| b.enabled)
            .collect(),
        arcs: overlays::<ArcConfig>("circular_graphs", raw.circular_graphs)
            .into_iter()
            .filter(|a| a.enabled)
            .collect(),
        effects: raw.text_effects,
    })
}

/// Convert each overlay entry on its own, skipping malformed ones.
fn overlays<T: DeserializeOwned>(section: &str, values: Vec<Value>) -> Vec<T> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_yaml::from_value(value) {
            Ok(overlay) => Some(overlay),
            Err(e) => {
                warn!("Skipping malformed {}[{}]: {}", section, index, e);
                None
            }
        })
        .collect()
}

fn resolve_path(base_dir: &Path, raw: &str) -> PathBuf {
    if raw.is_empty() {
        return PathBuf::new();
    }
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Malformed input falls back to black.
fn parse_background_color(value: &Value) -> [u8; 3] {
    fn channel(v: Option<&Value>) -> Option<u8> {
        let v = v?;
        v.as_u64()
            .map(|n| n.min(255) as u8)
            .or_else(|| v.as_f64().map(|f| f.clamp(0.0, 255.0) as u8))
    }

    let parsed = match value {
        Value::Null => return [0, 0, 0],
        Value::Mapping(_) => match (
            channel(value.get("r")),
            channel(value.get("g")),
            channel(value.get("b")),
        ) {
            (Some(r), Some(g), Some(b)) => Some([r, g, b]),
            _ => None,
        },
        Value::Sequence(seq) if seq.len() >= 3 => {
            match (channel(seq.first()), channel(seq.get(1)), channel(seq.get(2))) {
                (Some(r), Some(g), Some(b)) => Some([r, g, b]),
                _ => None,
            }
        }
        Value::String(s) => s.parse::<Rgba>().ok().map(|c| [c.r, c.g, c.b]),
        _ => None,
    };

    parsed.unwrap_or_else(|| {
        warn!("Malformed background color {:?}, using black", value);
        [0, 0, 0]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
display:
  rotation: 90
  refresh_interval: 0.5
  font_family: "Sans Bold"
  background:
    enabled: true
    path: backgrounds/loop.gif
    type: gif
    scale_mode: scaled_fill
    color: {r: 10, g: 20, b: 30}
    alpha: 0.8
  foreground:
    enabled: true
    path: "overlays/frame_{resolution}.png"
    position: {x: 4, y: 6}
    alpha: 0.5
  metrics:
    enabled: true
    configs:
      - name: cpu_usage
        label: CPU
        unit: "%"
        position: {x: 10, y: 20}
        font_size: 18
        color: "#ff0000"
        label_position: left
      - name: gpu_temperature
        enabled: false
  date:
    enabled: false
  time:
    enabled: true
    position: {x: 100, y: 100}
    font_size: 24
    color: "#ffffffff"
    use_24_hour: false
    show_am_pm: true
  custom_texts:
    - text: Hello
      position: {x: 0, y: 0}
      font_size: 12
      color: "#00ff00"
  bar_graphs:
    - metric_name: ram_usage
      position: {x: 10, y: 200}
      width: 120
      height: 10
  circular_graphs:
    - metric_name: gpu_usage
      radius: 30
  text_effects:
    shadow:
      enabled: true
      color: "#00000080"
      blur: 2
"##;

    #[test]
    fn test_parse_full_theme() {
        let cfg = parse(SAMPLE, Path::new("/themes"), 320, 240).unwrap();

        assert_eq!((cfg.width, cfg.height), (320, 240));
        assert_eq!(cfg.rotation, Rotation::R90);
        assert_eq!(cfg.refresh_interval, 0.5);
        assert_eq!(cfg.font_path, None);

        assert_eq!(cfg.background.kind, BackgroundKind::Gif);
        assert_eq!(cfg.background.path, PathBuf::from("/themes/backgrounds/loop.gif"));
        assert_eq!(cfg.background.scale_mode, ScaleMode::ScaledFill);
        assert_eq!(cfg.background.color, [10, 20, 30]);

        let fg = cfg.foreground.as_ref().unwrap();
        assert_eq!(fg.path, PathBuf::from("/themes/overlays/frame_320240.png"));
        assert_eq!(fg.position, Position { x: 4.0, y: 6.0 });

        assert_eq!(cfg.metrics.len(), 1);
        assert_eq!(cfg.metrics[0].color, Rgba::new(255, 0, 0, 255));
        assert!(cfg.date.is_none());
        assert_eq!(cfg.time.as_ref().unwrap().format_pattern(), "%I:%M %p");
        assert_eq!(cfg.texts.len(), 1);
        assert_eq!(cfg.bars[0].max_value, 100.0);
        assert_eq!(cfg.arcs[0].sweep_angle, 270.0);
        assert!(cfg.effects.shadow.enabled);
        assert_eq!(cfg.effects.shadow.blur, 2);
        assert!(!cfg.effects.outline.enabled);

        assert_eq!(cfg.metric_names(), vec!["cpu_usage", "ram_usage", "gpu_usage"]);
    }

    #[test]
    fn test_minimal_theme_defaults_to_color() {
        let cfg = parse("display: {}", Path::new("."), 480, 480).unwrap();
        assert_eq!(cfg.background.kind, BackgroundKind::Color);
        assert_eq!(cfg.background.color, [0, 0, 0]);
        assert_eq!(cfg.rotation, Rotation::R0);
        assert!(cfg.metric_names().is_empty());
    }

    #[test]
    fn test_background_color_forms() {
        assert_eq!(parse_background_color(&serde_yaml::from_str("[1, 2, 3]").unwrap()), [1, 2, 3]);
        assert_eq!(parse_background_color(&serde_yaml::from_str("'#0a141e'").unwrap()), [10, 20, 30]);
        assert_eq!(parse_background_color(&serde_yaml::from_str("{r: 1}").unwrap()), [0, 0, 0]);
        assert_eq!(parse_background_color(&serde_yaml::from_str("nonsense").unwrap()), [0, 0, 0]);
        assert_eq!(parse_background_color(&serde_yaml::from_str("true").unwrap()), [0, 0, 0]);
    }

    #[test]
    fn test_malformed_widget_color_fails() {
        let text = "display:\n  custom_texts:\n    - text: x\n      color: \"#zzz\"\n";
        assert!(parse(text, Path::new("."), 320, 240).is_err());
    }

    #[test]
    fn test_malformed_overlays_are_skipped() {
        let text = r##"
display:
  custom_texts:
    - {text: kept, color: "#ffffff"}
  shapes:
    - {shape_type: triangle, width: 10, height: 10}
    - {shape_type: rectangle, width: 20, height: 10}
  bar_graphs:
    - {metric_name: cpu_usage, fill_color: "not-a-color"}
    - {metric_name: ram_usage}
  circular_graphs:
    - {metric_name: gpu_usage, radius: "wide"}
    - {metric_name: gpu_temperature, radius: 20}
"##;
        let cfg = parse(text, Path::new("."), 320, 240).unwrap();

        assert_eq!(cfg.texts.len(), 1);
        assert_eq!(cfg.shapes.len(), 1);
        assert_eq!(cfg.shapes[0].shape_type, ShapeKind::Rectangle);
        assert_eq!(cfg.shapes[0].width, 20.0);
        assert_eq!(cfg.bars.len(), 1);
        assert_eq!(cfg.bars[0].metric_name, "ram_usage");
        assert_eq!(cfg.arcs.len(), 1);
        assert_eq!(cfg.arcs[0].radius, 20.0);
        assert_eq!(cfg.metric_names(), vec!["ram_usage", "gpu_temperature"]);
    }

    #[test]
    fn test_bad_rotation_fails() {
        assert!(parse("display:\n  rotation: 45\n", Path::new("."), 320, 240).is_err());
    }

    #[test]
    fn test_metrics_section_disabled() {
        let text = "display:\n  metrics:\n    enabled: false\n    configs:\n      - name: cpu_usage\n";
        let cfg = parse(text, Path::new("."), 320, 240).unwrap();
        assert!(cfg.metrics.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join(format!("missing-{}.yaml", uuid::Uuid::new_v4()));
        assert!(matches!(load(&path, 320, 240), Err(ThemeError::NotFound(_))));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = std::env::temp_dir().join(format!("theme-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config_320240.yaml");
        fs::write(&path, "display:\n  background:\n    path: bg.png\n").unwrap();

        let cfg = load(&path, 320, 240).unwrap();
        assert_eq!(cfg.background.kind, BackgroundKind::Image);
        assert_eq!(cfg.background.path, dir.join("bg.png"));

        fs::write(&path, "display: [").unwrap();
        assert!(matches!(load(&path, 320, 240), Err(ThemeError::Parse { .. })));
        fs::remove_dir_all(&dir).ok();
    }
}
