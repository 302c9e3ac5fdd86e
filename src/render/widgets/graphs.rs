/// Bar and arc graphs driven by a metric reading.
use std::f32::consts::PI;

use tiny_skia::{LineCap, Path, PathBuilder, Pixmap, Stroke, Transform};
use tracing::warn;

use crate::metrics::UNAVAILABLE;
use crate::render::widgets::shapes::{fill, rounded_rect, stroke};
use crate::render::widgets::{normalize, paint, parse_number, DrawContext};
use crate::theme::model::{ArcConfig, BarConfig, Orientation, Rgba};

/// Largest angle covered by one arc segment, in degrees
const ARC_STEP: f32 = 2.0;

pub fn draw_bar(canvas: &mut Pixmap, ctx: &DrawContext, cfg: &BarConfig, raw: &str) {
    let (x, y, w, h) = (cfg.position.x, cfg.position.y, cfg.width, cfg.height);
    let Some(track) = rounded_rect(x, y, w, h, cfg.corner_radius).filter(|_| w > 0.0 && h > 0.0) else {
        warn!("Skipping bar for {}: invalid size {}x{}", cfg.metric_name, w, h);
        return;
    };

    let value = parse_number(raw);
    let fraction = value.map_or(0.0, |v| normalize(v, cfg.min_value, cfg.max_value));

    fill(canvas, &track, cfg.background_color);

    let filled = match cfg.orientation {
        Orientation::Horizontal => rounded_rect(x, y, w * fraction, h, cfg.corner_radius),
        Orientation::Vertical => {
            let fh = h * fraction;
            rounded_rect(x, y + h - fh, w, fh, cfg.corner_radius)
        }
    };
    // zero-area fills have no path
    if let Some(path) = filled {
        fill(canvas, &path, cfg.fill_color);
    }

    if cfg.show_border && cfg.border_width > 0.0 {
        stroke(canvas, &track, cfg.border_color, cfg.border_width);
    }

    if cfg.show_value {
        let text = match value {
            Some(v) => format!("{:.0}{}", v, cfg.unit),
            None => UNAVAILABLE.to_string(),
        };
        ctx.text_centered(canvas, &text, cfg.font_size, x + w / 2.0, y + h / 2.0, cfg.text_color);
    }
}

/// Open arc of radius `r` around (cx, cy), clockwise from `start` degrees.
pub fn arc_path(cx: f32, cy: f32, r: f32, start: f32, sweep: f32) -> Option<Path> {
    if sweep <= 0.0 || r <= 0.0 {
        return None;
    }
    let steps = (sweep / ARC_STEP).ceil().max(1.0) as usize;
    let point = |deg: f32| {
        let rad = deg * PI / 180.0;
        (cx + r * rad.cos(), cy + r * rad.sin())
    };
    let mut pb = PathBuilder::new();
    let (sx, sy) = point(start);
    pb.move_to(sx, sy);
    for i in 1..=steps {
        let (px, py) = point(start + sweep * i as f32 / steps as f32);
        pb.line_to(px, py);
    }
    pb.finish()
}

fn stroke_arc(canvas: &mut Pixmap, path: &Path, color: Rgba, width: f32) {
    let stroke = Stroke {
        width,
        line_cap: LineCap::Butt,
        ..Stroke::default()
    };
    canvas.stroke_path(path, &paint(color), &stroke, Transform::identity(), None);
}

pub fn draw_arc(canvas: &mut Pixmap, ctx: &DrawContext, cfg: &ArcConfig, raw: &str) {
    let (r, t) = (cfg.radius, cfg.thickness);
    if !(r > 0.0 && t > 0.0 && t <= r * 2.0) {
        warn!("Skipping arc for {}: radius {} thickness {}", cfg.metric_name, r, t);
        return;
    }
    let sweep = cfg.sweep_angle.clamp(0.0, 360.0);
    let (cx, cy) = (cfg.position.x + r, cfg.position.y + r);
    // stroke runs along the middle of the ring
    let mid = r - t / 2.0;

    let value = parse_number(raw);
    let fraction = value.map_or(0.0, |v| normalize(v, cfg.min_value, cfg.max_value));

    if cfg.show_background {
        if let Some(track) = arc_path(cx, cy, mid, cfg.start_angle, sweep) {
            stroke_arc(canvas, &track, cfg.background_color, t);
        }
    }
    if let Some(active) = arc_path(cx, cy, mid, cfg.start_angle, sweep * fraction) {
        stroke_arc(canvas, &active, cfg.fill_color, t);
    }
    if cfg.show_outline {
        for radius in [r, r - t] {
            if let Some(ring) = arc_path(cx, cy, radius, cfg.start_angle, sweep) {
                stroke_arc(canvas, &ring, cfg.border_color, 1.0);
            }
        }
    }

    if cfg.show_value {
        let text = match value {
            Some(_) => format!("{:.0}%", fraction * 100.0),
            None => UNAVAILABLE.to_string(),
        };
        ctx.text_centered(canvas, &text, cfg.font_size, cx, cy, cfg.text_color);
    }
}
