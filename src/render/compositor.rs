/// Draws every overlay widget onto a background frame and produces the
/// opaque, rotated RGB frame that goes to the panel.
use chrono::{DateTime, TimeZone};
use image::RgbImage;
use tiny_skia::Pixmap;
use tracing::{debug, warn};

use crate::metrics::MetricsSnapshot;
use crate::render::sources::image as still;
use crate::render::surface;
use crate::render::text::SharedFont;
use crate::render::widgets::{self, clock, graphs, metric, shapes, DrawContext};
use crate::theme::model::{DisplayConfig, ForegroundConfig};

struct Foreground {
    pixmap: Pixmap,
    x: i32,
    y: i32,
}

impl Foreground {
    /// Decode once per config; a missing or broken overlay is skipped.
    fn load(cfg: &ForegroundConfig) -> Option<Self> {
        let mut img = match still::open(&cfg.path) {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                warn!("Cannot load foreground image: {}", e);
                return None;
            }
        };
        let alpha = cfg.alpha.clamp(0.0, 1.0);
        if alpha < 1.0 {
            for px in img.pixels_mut() {
                px[3] = (px[3] as f32 * alpha) as u8;
            }
        }
        debug!("Foreground {} ({}x{})", cfg.path.display(), img.width(), img.height());
        Some(Self {
            pixmap: surface::pixmap_from_rgba(&img)?,
            x: cfg.position.x.round() as i32,
            y: cfg.position.y.round() as i32,
        })
    }
}

pub struct Compositor {
    config: DisplayConfig,
    font: SharedFont,
    foreground: Option<Foreground>,
}

impl Compositor {
    pub fn new(config: DisplayConfig, font: SharedFont) -> Self {
        let foreground = config.foreground.as_ref().and_then(Foreground::load);
        Self {
            config,
            font,
            foreground,
        }
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    /// Overlay everything on a copy of `background`, flatten and rotate.
    pub fn compose<Tz: TimeZone>(
        &self,
        background: &Pixmap,
        metrics: &MetricsSnapshot,
        now: &DateTime<Tz>,
    ) -> RgbImage
    where
        Tz::Offset: std::fmt::Display,
    {
        let cfg = &self.config;
        let mut canvas = background.clone();
        let ctx = DrawContext {
            font: self.font.as_ref(),
            effects: &cfg.effects,
        };

        if let Some(fg) = &self.foreground {
            surface::draw_over(&mut canvas, &fg.pixmap, fg.x, fg.y, 1.0);
        }
        for m in &cfg.metrics {
            metric::draw(&mut canvas, &ctx, m, metrics.get(&m.name));
        }
        if let Some(date) = &cfg.date {
            clock::draw_date(&mut canvas, &ctx, date, now);
        }
        if let Some(time) = &cfg.time {
            clock::draw_time(&mut canvas, &ctx, time, now);
        }
        for text in &cfg.texts {
            widgets::draw_text_widget(&mut canvas, &ctx, text);
        }
        for shape in &cfg.shapes {
            shapes::draw(&mut canvas, shape);
        }
        for bar in &cfg.bars {
            graphs::draw_bar(&mut canvas, &ctx, bar, metrics.get(&bar.metric_name));
        }
        for arc in &cfg.arcs {
            graphs::draw_arc(&mut canvas, &ctx, arc, metrics.get(&arc.metric_name));
        }

        surface::rotate(surface::flatten(&canvas), cfg.rotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::text::tests::BlockFont;
    use crate::theme::loader;
    use crate::theme::model::Rotation;
    use chrono::Utc;
    use image::Rgb;
    use std::path::Path;
    use std::sync::Arc;

    fn config(yaml: &str, w: u32, h: u32) -> DisplayConfig {
        loader::parse(yaml, Path::new("/tmp"), w, h).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 7, 14, 5, 9).unwrap()
    }

    const CPU_THEME: &str = r##"
display:
  background:
    type: color
    color: {r: 10, g: 20, b: 30}
  metrics:
    enabled: true
    configs:
      - name: cpu_usage
        label: CPU
        unit: "%"
        label_position: left
        position: {x: 20, y: 30}
        font_size: 16
        color: "#FFFFFF"
"##;

    #[test]
    fn test_metric_over_solid_background() {
        let cfg = config(CPU_THEME, 320, 240);
        let background = surface::solid(320, 240, cfg.background.color).unwrap();
        let compositor = Compositor::new(cfg, Arc::new(BlockFont));

        let mut snap = MetricsSnapshot::new();
        snap.set("cpu_usage", "55".into());
        let frame = compositor.compose(&background, &snap, &now());

        assert_eq!(frame.dimensions(), (320, 240));
        let bg = Rgb([10, 20, 30]);
        assert_eq!(frame.get_pixel(0, 0), &bg);
        assert_eq!(frame.get_pixel(19, 30), &bg);
        // "CPU: 55%": 8 cells of 8px from x=20, 16px tall from y=30
        assert_eq!(frame.get_pixel(20, 30), &Rgb([255, 255, 255]));
        assert_eq!(frame.get_pixel(20 + 8 * 8 - 1, 45), &Rgb([255, 255, 255]));
        // the space in "CPU: " is empty
        assert_eq!(frame.get_pixel(20 + 4 * 8 + 2, 35), &bg);
        assert_eq!(frame.get_pixel(20 + 8 * 8, 30), &bg);
        assert_eq!(frame.get_pixel(20, 46), &bg);
    }

    #[test]
    fn test_missing_metric_renders_na() {
        let cfg = config(CPU_THEME, 320, 240);
        let background = surface::solid(320, 240, [0, 0, 0]).unwrap();
        let compositor = Compositor::new(cfg, Arc::new(BlockFont));
        let frame = compositor.compose(&background, &MetricsSnapshot::new(), &now());
        // "CPU: N/A" is also 8 cells wide
        assert_eq!(frame.get_pixel(20 + 8 * 8 - 1, 30), &Rgb([255, 255, 255]));
        assert_eq!(frame.get_pixel(20 + 8 * 8, 30), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_rotation_applied_last() {
        let mut cfg = config(CPU_THEME, 320, 240);
        cfg.rotation = Rotation::R90;
        let background = surface::solid(320, 240, [0, 0, 0]).unwrap();
        let compositor = Compositor::new(cfg, Arc::new(BlockFont));
        let frame = compositor.compose(&background, &MetricsSnapshot::new(), &now());
        assert_eq!(frame.dimensions(), (240, 320));
        // (20, 30) rotated clockwise lands at (240 - 1 - 30, 20)
        assert_eq!(frame.get_pixel(209, 20), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_later_widgets_draw_on_top() {
        let yaml = r##"
display:
  background: {type: color, color: "#000000"}
  custom_texts:
    - {text: "X", position: {x: 0, y: 0}, font_size: 20, color: "#FF0000"}
  shapes:
    - {shape_type: rectangle, position: {x: 0, y: 0}, width: 5, height: 5, color: "#0000FF"}
"##;
        let cfg = config(yaml, 40, 40);
        let background = surface::solid(40, 40, [0, 0, 0]).unwrap();
        let compositor = Compositor::new(cfg, Arc::new(BlockFont));
        let frame = compositor.compose(&background, &MetricsSnapshot::new(), &now());
        assert_eq!(frame.get_pixel(2, 2), &Rgb([0, 0, 255]));
        assert_eq!(frame.get_pixel(7, 12), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_missing_foreground_is_skipped() {
        let yaml = r##"
display:
  background: {type: color, color: "#000000"}
  foreground: {enabled: true, path: /nonexistent/overlay.png, alpha: 0.5}
"##;
        let cfg = config(yaml, 10, 10);
        assert!(cfg.foreground.is_some());
        let background = surface::solid(10, 10, [0, 0, 0]).unwrap();
        let compositor = Compositor::new(cfg, Arc::new(BlockFont));
        let frame = compositor.compose(&background, &MetricsSnapshot::new(), &now());
        assert_eq!(frame.get_pixel(5, 5), &Rgb([0, 0, 0]));
    }
}
