/// Metric readouts: a value with an optional label laid out around it.
use tiny_skia::Pixmap;

use crate::metrics::UNAVAILABLE;
use crate::render::text::FontProvider;
use crate::render::widgets::{parse_number, DrawContext};
use crate::theme::model::{FreqFormat, LabelPosition, MetricConfig};

/// Vertical gap between stacked label and value lines
const STACK_GAP: f32 = 2.0;

/// One run of text at a resolved top-left position
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub size: f32,
    pub x: f32,
    pub y: f32,
}

/// Value plus unit, with frequency conversion applied. Unavailable
/// readings show as "N/A" without a unit.
pub fn format_value(cfg: &MetricConfig, raw: &str) -> String {
    if raw == UNAVAILABLE {
        return UNAVAILABLE.to_string();
    }
    if cfg.freq_format == FreqFormat::Ghz && cfg.name.contains("frequency") {
        if let Some(mhz) = parse_number(raw) {
            let unit = if cfg.unit.is_empty() || cfg.unit.eq_ignore_ascii_case("mhz") {
                "GHz"
            } else {
                cfg.unit.as_str()
            };
            return format!("{:.2}{}", mhz / 1000.0, unit);
        }
    }
    format!("{}{}", raw, cfg.unit)
}

/// Place label and value for the configured label position.
pub fn layout(cfg: &MetricConfig, value: &str, font: &dyn FontProvider) -> Vec<Segment> {
    let (x, y) = (cfg.position.x, cfg.position.y);
    let value_size = cfg.font_size;
    let label_size = cfg.label_size();

    let position = if cfg.label.is_empty() {
        LabelPosition::None
    } else {
        cfg.label_position
    };

    let seg = |text: String, size: f32, x: f32, y: f32| Segment { text, size, x, y };

    match position {
        LabelPosition::None => vec![seg(value.to_string(), value_size, x, y)],
        LabelPosition::Left | LabelPosition::Right => {
            let (first, first_size, second, second_size) = if position == LabelPosition::Left {
                (format!("{}: ", cfg.label), label_size, value.to_string(), value_size)
            } else {
                (value.to_string(), value_size, format!(" {}", cfg.label), label_size)
            };
            let a = font.measure(&first, first_size);
            let b = font.measure(&second, second_size);
            // shared baseline
            let baseline = y + a.ascent.max(b.ascent);
            vec![
                seg(first, first_size, x, baseline - a.ascent),
                seg(second, second_size, x + a.width as f32, baseline - b.ascent),
            ]
        }
        LabelPosition::Above | LabelPosition::Below => {
            let label = (cfg.label.clone(), label_size);
            let value = (value.to_string(), value_size);
            let (top, bottom) = if position == LabelPosition::Above {
                (label, value)
            } else {
                (value, label)
            };
            let t = font.measure(&top.0, top.1);
            let b = font.measure(&bottom.0, bottom.1);
            let wide = t.width.max(b.width) as f32;
            vec![
                seg(top.0, top.1, x + (wide - t.width as f32) / 2.0, y),
                seg(bottom.0, bottom.1, x + (wide - b.width as f32) / 2.0, y + t.height as f32 + STACK_GAP),
            ]
        }
    }
}

pub fn draw(canvas: &mut Pixmap, ctx: &DrawContext, cfg: &MetricConfig, raw: &str) {
    let value = format_value(cfg, raw);
    for segment in layout(cfg, &value, ctx.font) {
        ctx.text(canvas, &segment.text, segment.size, segment.x, segment.y, cfg.color);
    }
}
