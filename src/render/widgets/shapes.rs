/// Rectangles, circles and rounded rectangles.
use tiny_skia::{FillRule, Path, PathBuilder, Pixmap, Rect, Stroke, Transform};
use tracing::warn;

use crate::render::widgets::paint;
use crate::theme::model::{Rgba, ShapeConfig, ShapeKind};

/// Rounded rectangle; a zero radius gives a plain rectangle.
pub fn rounded_rect(x: f32, y: f32, w: f32, h: f32, radius: f32) -> Option<Path> {
    let r = radius.min(w / 2.0).min(h / 2.0);
    if r <= 0.0 {
        return Some(PathBuilder::from_rect(Rect::from_xywh(x, y, w, h)?));
    }
    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x + w - r, y);
    pb.quad_to(x + w, y, x + w, y + r);
    pb.line_to(x + w, y + h - r);
    pb.quad_to(x + w, y + h, x + w - r, y + h);
    pb.line_to(x + r, y + h);
    pb.quad_to(x, y + h, x, y + h - r);
    pb.line_to(x, y + r);
    pb.quad_to(x, y, x + r, y);
    pb.close();
    pb.finish()
}

pub fn fill(canvas: &mut Pixmap, path: &Path, color: Rgba) {
    canvas.fill_path(path, &paint(color), FillRule::Winding, Transform::identity(), None);
}

pub fn stroke(canvas: &mut Pixmap, path: &Path, color: Rgba, width: f32) {
    let stroke = Stroke {
        width,
        ..Stroke::default()
    };
    canvas.stroke_path(path, &paint(color), &stroke, Transform::identity(), None);
}

fn shape_path(cfg: &ShapeConfig) -> Option<Path> {
    let (x, y, w, h) = (cfg.position.x, cfg.position.y, cfg.width, cfg.height);
    if !(w > 0.0 && h > 0.0) {
        return None;
    }
    match cfg.shape_type {
        ShapeKind::Rectangle => rounded_rect(x, y, w, h, 0.0),
        ShapeKind::RoundedRectangle => rounded_rect(x, y, w, h, cfg.corner_radius),
        ShapeKind::Circle => PathBuilder::from_oval(Rect::from_xywh(x, y, w, h)?),
    }
}

/// Filled shapes take `color` with an optional border; outline-only shapes
/// stroke in the border color, defaulting to `color`.
pub fn draw(canvas: &mut Pixmap, cfg: &ShapeConfig) {
    let Some(path) = shape_path(cfg) else {
        warn!(
            "Skipping {:?} at ({}, {}): invalid size {}x{}",
            cfg.shape_type, cfg.position.x, cfg.position.y, cfg.width, cfg.height
        );
        return;
    };

    if cfg.filled {
        fill(canvas, &path, cfg.color);
        if let Some(border) = cfg.border_color {
            if cfg.border_width > 0.0 {
                stroke(canvas, &path, border, cfg.border_width);
            }
        }
    } else {
        let width = if cfg.border_width > 0.0 { cfg.border_width } else { 1.0 };
        stroke(canvas, &path, cfg.border_color.unwrap_or(cfg.color), width);
    }
}
