/// Data model for theme files written by the desktop editor.
/// Widget configs are plain values; a reload builds a fresh set.
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::theme::ThemeError;

/// 8-bit RGBA color, parsed from `#RRGGBB` or `#RRGGBBAA`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);

    pub fn to_skia(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, self.a)
    }
}

impl FromStr for Rgba {
    type Err = ThemeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let byte = |i: usize| {
            hex.get(i..i + 2)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| ThemeError::InvalidColor(s.to_string()))
        };
        match hex.len() {
            6 => Ok(Rgba::new(byte(0)?, byte(2)?, byte(4)?, 255)),
            8 => Ok(Rgba::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => Err(ThemeError::InvalidColor(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Rgba {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

/// Clockwise rotation applied to the finished frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "i64")]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl TryFrom<i64> for Rotation {
    type Error = ThemeError;

    fn try_from(degrees: i64) -> Result<Self, Self::Error> {
        match degrees.rem_euclid(360) {
            0 => Ok(Rotation::R0),
            90 => Ok(Rotation::R90),
            180 => Ok(Rotation::R180),
            270 => Ok(Rotation::R270),
            _ => Err(ThemeError::InvalidRotation(degrees)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundKind {
    Image,
    Gif,
    Video,
    ImageCollection,
    Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleMode {
    #[default]
    Stretch,
    ScaledFit,
    ScaledFill,
    Centered,
    Tiled,
}

impl ScaleMode {
    /// Unknown names fall back to stretch.
    pub fn parse(s: &str) -> Self {
        match s {
            "scaled_fit" => ScaleMode::ScaledFit,
            "scaled_fill" => ScaleMode::ScaledFill,
            "centered" => ScaleMode::Centered,
            "tiled" => ScaleMode::Tiled,
            _ => ScaleMode::Stretch,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundConfig {
    pub enabled: bool,
    pub kind: BackgroundKind,
    pub path: PathBuf,
    pub scale_mode: ScaleMode,
    pub color: [u8; 3],
    pub alpha: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForegroundConfig {
    pub path: PathBuf,
    pub position: Position,
    pub alpha: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelPosition {
    #[default]
    Left,
    Right,
    #[serde(alias = "top")]
    Above,
    #[serde(alias = "bottom")]
    Below,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreqFormat {
    #[default]
    Mhz,
    Ghz,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default = "default_metric_font_size")]
    pub font_size: f32,
    /// Falls back to `font_size`
    #[serde(default)]
    pub label_font_size: Option<f32>,
    #[serde(default = "default_text_color")]
    pub color: Rgba,
    #[serde(default)]
    pub label_position: LabelPosition,
    #[serde(default)]
    pub freq_format: FreqFormat,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl MetricConfig {
    pub fn label_size(&self) -> f32 {
        self.label_font_size.filter(|s| *s > 0.0).unwrap_or(self.font_size)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DateConfig {
    #[serde(default)]
    pub position: Position,
    #[serde(default = "default_text_font_size")]
    pub font_size: f32,
    #[serde(default = "default_text_color")]
    pub color: Rgba,
    #[serde(default = "default_true")]
    pub show_weekday: bool,
    #[serde(default)]
    pub show_year: bool,
    /// default, short or numeric
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl DateConfig {
    /// strftime pattern for the configured flags
    pub fn format_pattern(&self) -> String {
        match self.date_format.as_str() {
            "numeric" => {
                if self.show_year {
                    "%d/%m/%Y".to_string()
                } else {
                    "%d/%m".to_string()
                }
            }
            "short" => {
                let mut parts = Vec::new();
                if self.show_weekday {
                    parts.push("%a");
                }
                parts.push("%b %-d");
                if self.show_year {
                    parts.push("%Y");
                }
                parts.join(" ")
            }
            _ => {
                let mut parts = Vec::new();
                if self.show_weekday {
                    parts.push("%A");
                }
                parts.push("%-d %B");
                if self.show_year {
                    parts.push("%Y");
                }
                parts.join(" ")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimeConfig {
    #[serde(default)]
    pub position: Position,
    #[serde(default = "default_text_font_size")]
    pub font_size: f32,
    #[serde(default = "default_text_color")]
    pub color: Rgba,
    #[serde(default = "default_true")]
    pub use_24_hour: bool,
    #[serde(default)]
    pub show_seconds: bool,
    #[serde(default)]
    pub show_am_pm: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl TimeConfig {
    pub fn format_pattern(&self) -> String {
        let mut fmt = match (self.use_24_hour, self.show_seconds) {
            (true, true) => "%H:%M:%S",
            (true, false) => "%H:%M",
            (false, true) => "%I:%M:%S",
            (false, false) => "%I:%M",
        }
        .to_string();
        if !self.use_24_hour && self.show_am_pm {
            fmt.push_str(" %p");
        }
        fmt
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TextConfig {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default = "default_text_font_size")]
    pub font_size: f32,
    #[serde(default = "default_text_color")]
    pub color: Rgba,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    #[default]
    Rectangle,
    Circle,
    RoundedRectangle,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShapeConfig {
    #[serde(default)]
    pub shape_type: ShapeKind,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
    #[serde(default = "default_text_color")]
    pub color: Rgba,
    #[serde(default = "default_true")]
    pub filled: bool,
    /// Falls back to `color`
    #[serde(default)]
    pub border_color: Option<Rgba>,
    #[serde(default = "default_border_width")]
    pub border_width: f32,
    #[serde(default)]
    pub corner_radius: f32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BarConfig {
    #[serde(default)]
    pub metric_name: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default = "default_bar_width")]
    pub width: f32,
    #[serde(default = "default_bar_height")]
    pub height: f32,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default = "default_fill_color")]
    pub fill_color: Rgba,
    #[serde(default = "default_track_color")]
    pub background_color: Rgba,
    #[serde(default = "default_text_color")]
    pub border_color: Rgba,
    #[serde(default = "default_true")]
    pub show_border: bool,
    #[serde(default = "default_border_width")]
    pub border_width: f32,
    #[serde(default)]
    pub corner_radius: f32,
    #[serde(default)]
    pub min_value: f32,
    #[serde(default = "default_max_value")]
    pub max_value: f32,
    #[serde(default)]
    pub show_value: bool,
    #[serde(default)]
    pub unit: String,
    #[serde(default = "default_graph_font_size")]
    pub font_size: f32,
    #[serde(default = "default_text_color")]
    pub text_color: Rgba,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ArcConfig {
    #[serde(default)]
    pub metric_name: String,
    /// Top-left of the bounding box
    #[serde(default)]
    pub position: Position,
    #[serde(default = "default_arc_radius")]
    pub radius: f32,
    #[serde(default = "default_arc_thickness")]
    pub thickness: f32,
    /// Degrees, clockwise from 3 o'clock
    #[serde(default = "default_start_angle")]
    pub start_angle: f32,
    #[serde(default = "default_sweep_angle")]
    pub sweep_angle: f32,
    #[serde(default = "default_fill_color")]
    pub fill_color: Rgba,
    #[serde(default = "default_track_color")]
    pub background_color: Rgba,
    #[serde(default = "default_text_color")]
    pub border_color: Rgba,
    #[serde(default = "default_true")]
    pub show_background: bool,
    #[serde(default)]
    pub show_outline: bool,
    #[serde(default = "default_true")]
    pub show_value: bool,
    #[serde(default)]
    pub min_value: f32,
    #[serde(default = "default_max_value")]
    pub max_value: f32,
    #[serde(default = "default_graph_font_size")]
    pub font_size: f32,
    #[serde(default = "default_text_color")]
    pub text_color: Rgba,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShadowEffect {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_shadow_color")]
    pub color: Rgba,
    #[serde(default = "default_shadow_offset")]
    pub offset_x: i32,
    #[serde(default = "default_shadow_offset")]
    pub offset_y: i32,
    #[serde(default = "default_shadow_blur")]
    pub blur: u32,
}

impl Default for ShadowEffect {
    fn default() -> Self {
        Self {
            enabled: false,
            color: default_shadow_color(),
            offset_x: default_shadow_offset(),
            offset_y: default_shadow_offset(),
            blur: default_shadow_blur(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OutlineEffect {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_outline_color")]
    pub color: Rgba,
    #[serde(default = "default_outline_width")]
    pub width: u32,
}

impl Default for OutlineEffect {
    fn default() -> Self {
        Self {
            enabled: false,
            color: default_outline_color(),
            width: default_outline_width(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientDirection {
    #[default]
    Vertical,
    Horizontal,
    Diagonal,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GradientEffect {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_gradient_start")]
    pub color1: Rgba,
    #[serde(default = "default_gradient_end")]
    pub color2: Rgba,
    #[serde(default)]
    pub direction: GradientDirection,
}

impl Default for GradientEffect {
    fn default() -> Self {
        Self {
            enabled: false,
            color1: default_gradient_start(),
            color2: default_gradient_end(),
            direction: GradientDirection::default(),
        }
    }
}

/// Effects shared by every text draw
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TextEffects {
    #[serde(default)]
    pub shadow: ShadowEffect,
    #[serde(default)]
    pub outline: OutlineEffect,
    #[serde(default)]
    pub gradient: GradientEffect,
}

/// Complete, resolved display configuration for one panel
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
    pub refresh_interval: f32,
    pub font_path: Option<PathBuf>,
    pub background: BackgroundConfig,
    pub foreground: Option<ForegroundConfig>,
    pub metrics: Vec<MetricConfig>,
    pub date: Option<DateConfig>,
    pub time: Option<TimeConfig>,
    pub texts: Vec<TextConfig>,
    pub shapes: Vec<ShapeConfig>,
    pub bars: Vec<BarConfig>,
    pub arcs: Vec<ArcConfig>,
    pub effects: TextEffects,
}

impl DisplayConfig {
    /// Every metric name a widget reads, deduplicated, in widget order
    pub fn metric_names(&self) -> Vec<String> {
        let names = self
            .metrics
            .iter()
            .map(|m| &m.name)
            .chain(self.bars.iter().map(|b| &b.metric_name))
            .chain(self.arcs.iter().map(|a| &a.metric_name));

        let mut out: Vec<String> = Vec::new();
        for name in names {
            if !name.is_empty() && !out.contains(name) {
                out.push(name.clone());
            }
        }
        out
    }
}

fn default_true() -> bool {
    true
}

fn default_text_color() -> Rgba {
    Rgba::WHITE
}

fn default_fill_color() -> Rgba {
    Rgba::new(0, 255, 0, 255)
}

fn default_track_color() -> Rgba {
    Rgba::new(50, 50, 50, 255)
}

fn default_metric_font_size() -> f32 {
    16.0
}

fn default_text_font_size() -> f32 {
    20.0
}

fn default_graph_font_size() -> f32 {
    12.0
}

fn default_date_format() -> String {
    "default".to_string()
}

fn default_border_width() -> f32 {
    1.0
}

fn default_bar_width() -> f32 {
    100.0
}

fn default_bar_height() -> f32 {
    16.0
}

fn default_max_value() -> f32 {
    100.0
}

fn default_arc_radius() -> f32 {
    40.0
}

fn default_arc_thickness() -> f32 {
    8.0
}

fn default_start_angle() -> f32 {
    135.0
}

fn default_sweep_angle() -> f32 {
    270.0
}

fn default_shadow_color() -> Rgba {
    Rgba::new(0, 0, 0, 128)
}

fn default_shadow_offset() -> i32 {
    2
}

fn default_shadow_blur() -> u32 {
    3
}

fn default_outline_color() -> Rgba {
    Rgba::BLACK
}

fn default_outline_width() -> u32 {
    1
}

fn default_gradient_start() -> Rgba {
    Rgba::WHITE
}

fn default_gradient_end() -> Rgba {
    Rgba::new(100, 100, 255, 255)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_colors() {
        assert_eq!("#ff8000".parse::<Rgba>().unwrap(), Rgba::new(255, 128, 0, 255));
        assert_eq!("#0000ff80".parse::<Rgba>().unwrap(), Rgba::new(0, 0, 255, 128));
        assert_eq!("FFFFFF".parse::<Rgba>().unwrap(), Rgba::WHITE);
        assert!("#12345".parse::<Rgba>().is_err());
        assert!("#gg0000".parse::<Rgba>().is_err());
    }

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(Rotation::try_from(90).unwrap(), Rotation::R90);
        assert_eq!(Rotation::try_from(-90).unwrap(), Rotation::R270);
        assert_eq!(Rotation::try_from(360).unwrap(), Rotation::R0);
        assert!(Rotation::try_from(45).is_err());
    }

    #[test]
    fn test_date_patterns() {
        let mut date: DateConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(date.format_pattern(), "%A %-d %B");

        date.show_year = true;
        date.date_format = "numeric".into();
        assert_eq!(date.format_pattern(), "%d/%m/%Y");

        date.show_weekday = false;
        date.date_format = "short".into();
        assert_eq!(date.format_pattern(), "%b %-d %Y");
    }

    #[test]
    fn test_time_patterns() {
        let mut time: TimeConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(time.format_pattern(), "%H:%M");

        time.use_24_hour = false;
        time.show_am_pm = true;
        assert_eq!(time.format_pattern(), "%I:%M %p");

        time.show_seconds = true;
        time.show_am_pm = false;
        assert_eq!(time.format_pattern(), "%I:%M:%S");
    }

    #[test]
    fn test_label_position_aliases() {
        let m: MetricConfig = serde_yaml::from_str("name: cpu_usage\nlabel_position: top").unwrap();
        assert_eq!(m.label_position, LabelPosition::Above);
        let m: MetricConfig = serde_yaml::from_str("name: cpu_usage").unwrap();
        assert_eq!(m.label_position, LabelPosition::Left);
        assert_eq!(m.label_size(), m.font_size);
    }
}
