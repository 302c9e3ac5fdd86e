/// Text effects: drop shadow, outline and gradient fill.
/// Every text widget draws through `draw_text` so one effect bundle applies
/// uniformly.
use image::{imageops, Rgba as Px, RgbaImage};
use tiny_skia::Pixmap;

use crate::render::surface;
use crate::render::text::{FontProvider, GlyphMask};
use crate::theme::model::{GradientDirection, GradientEffect, Rgba, TextEffects};

/// Draw one line of text with its top-left at (x, y).
pub fn draw_text(
    canvas: &mut Pixmap,
    font: &dyn FontProvider,
    text: &str,
    size: f32,
    x: i32,
    y: i32,
    color: Rgba,
    effects: &TextEffects,
) {
    if text.is_empty() || size <= 0.0 {
        return;
    }
    let mask = font.rasterize(text, size);
    if mask.is_empty() {
        return;
    }

    let shadow = &effects.shadow;
    if shadow.enabled {
        let (sx, sy) = (x + shadow.offset_x, y + shadow.offset_y);
        if shadow.blur > 0 {
            draw_blurred(canvas, &mask, sx, sy, shadow.color, shadow.blur);
        } else if let Some(stamp) = tint(&mask, |_, _| shadow.color) {
            surface::draw_over(canvas, &stamp, sx, sy, 1.0);
        }
    }

    let outline = &effects.outline;
    if outline.enabled && outline.width > 0 {
        if let Some(stamp) = tint(&mask, |_, _| outline.color) {
            let w = outline.width as i32;
            for dy in -w..=w {
                for dx in -w..=w {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    surface::draw_over(canvas, &stamp, x + dx, y + dy, 1.0);
                }
            }
        }
    }

    let fill = if effects.gradient.enabled {
        let (w, h) = (mask.width, mask.height);
        tint(&mask, |px, py| gradient_at(&effects.gradient, px, py, w, h))
    } else {
        tint(&mask, |_, _| color)
    };
    if let Some(fill) = fill {
        surface::draw_over(canvas, &fill, x, y, 1.0);
    }
}

/// Color the mask; alpha is the color's alpha scaled by coverage.
fn tint(mask: &GlyphMask, color_at: impl Fn(u32, u32) -> Rgba) -> Option<Pixmap> {
    let img = RgbaImage::from_fn(mask.width, mask.height, |px, py| {
        let c = color_at(px, py);
        let a = (c.a as u32 * mask.at(px, py) as u32 / 255) as u8;
        Px([c.r, c.g, c.b, a])
    });
    surface::pixmap_from_rgba(&img)
}

/// Shadow on a scratch surface padded by twice the blur radius on
/// each side so the blur has room to spread.
fn draw_blurred(canvas: &mut Pixmap, mask: &GlyphMask, x: i32, y: i32, color: Rgba, blur: u32) {
    let pad = blur * 2;
    let mut scratch = RgbaImage::from_pixel(
        mask.width + pad * 2,
        mask.height + pad * 2,
        Px([color.r, color.g, color.b, 0]),
    );
    for my in 0..mask.height {
        for mx in 0..mask.width {
            let a = (color.a as u32 * mask.at(mx, my) as u32 / 255) as u8;
            scratch.put_pixel(mx + pad, my + pad, Px([color.r, color.g, color.b, a]));
        }
    }
    let blurred = imageops::blur(&scratch, blur as f32);
    if let Some(stamp) = surface::pixmap_from_rgba(&blurred) {
        surface::draw_over(canvas, &stamp, x - pad as i32, y - pad as i32, 1.0);
    }
}

fn gradient_at(g: &GradientEffect, x: u32, y: u32, w: u32, h: u32) -> Rgba {
    let ratio = |num: u32, den: u32| if den == 0 { 0.0 } else { num as f32 / den as f32 };
    let t = match g.direction {
        GradientDirection::Vertical => ratio(y, h.saturating_sub(1)),
        GradientDirection::Horizontal => ratio(x, w.saturating_sub(1)),
        GradientDirection::Diagonal => ratio(x + y, (w + h).saturating_sub(2)),
    };
    let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    Rgba::new(
        lerp(g.color1.r, g.color2.r),
        lerp(g.color1.g, g.color2.g),
        lerp(g.color1.b, g.color2.b),
        lerp(g.color1.a, g.color2.a),
    )
}
