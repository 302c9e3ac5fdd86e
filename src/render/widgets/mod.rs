/// Overlay widgets drawn on top of the background.
pub mod clock;
pub mod graphs;
pub mod metric;
pub mod shapes;

use tiny_skia::{Paint, Pixmap};

use crate::render::effects;
use crate::render::text::FontProvider;
use crate::theme::model::{Rgba, TextConfig, TextEffects};

/// What every text-drawing widget needs besides its own config
#[derive(Clone, Copy)]
pub struct DrawContext<'a> {
    pub font: &'a dyn FontProvider,
    pub effects: &'a TextEffects,
}

impl DrawContext<'_> {
    pub fn text(&self, canvas: &mut Pixmap, text: &str, size: f32, x: f32, y: f32, color: Rgba) {
        effects::draw_text(
            canvas,
            self.font,
            text,
            size,
            x.round() as i32,
            y.round() as i32,
            color,
            self.effects,
        );
    }

    /// Draw `text` centered on (cx, cy).
    pub fn text_centered(&self, canvas: &mut Pixmap, text: &str, size: f32, cx: f32, cy: f32, color: Rgba) {
        let extent = self.font.measure(text, size);
        let x = cx - extent.width as f32 / 2.0;
        let y = cy - extent.height as f32 / 2.0;
        self.text(canvas, text, size, x, y, color);
    }
}

/// Free text, drawn verbatim.
pub fn draw_text_widget(canvas: &mut Pixmap, ctx: &DrawContext, cfg: &TextConfig) {
    ctx.text(canvas, &cfg.text, cfg.font_size, cfg.position.x, cfg.position.y, cfg.color);
}

/// Map `value` from [min, max] onto [0, 1], clamped. An empty or inverted
/// range maps everything to 0.
pub fn normalize(value: f32, min: f32, max: f32) -> f32 {
    if !value.is_finite() || !(max > min) {
        return 0.0;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

/// Leading numeric part of a metric reading, e.g. `"55"` or `"3.2 GHz"`.
pub fn parse_number(raw: &str) -> Option<f32> {
    let raw = raw.trim();
    let end = raw
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(raw.len());
    raw[..end].parse().ok()
}

pub(crate) fn paint(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_skia());
    paint.anti_alias = true;
    paint
}
