/// Pixel-buffer plumbing between `image` buffers and tiny-skia pixmaps.
use image::imageops;
use image::{RgbImage, RgbaImage};
use tiny_skia::{Pixmap, PixmapPaint, Transform};

use crate::theme::model::Rotation;

/// Convert straight-alpha RGBA into a premultiplied pixmap.
pub fn pixmap_from_rgba(img: &RgbaImage) -> Option<Pixmap> {
    let (w, h) = img.dimensions();
    let mut pixmap = Pixmap::new(w, h)?;
    let data = pixmap.data_mut();
    for (i, pixel) in img.pixels().enumerate() {
        let a = pixel[3] as f32 / 255.0;
        data[i * 4] = (pixel[0] as f32 * a).round() as u8;
        data[i * 4 + 1] = (pixel[1] as f32 * a).round() as u8;
        data[i * 4 + 2] = (pixel[2] as f32 * a).round() as u8;
        data[i * 4 + 3] = pixel[3];
    }
    Some(pixmap)
}

/// Opaque pixmap filled with one color.
pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(width, height)?;
    pixmap.fill(tiny_skia::Color::from_rgba8(rgb[0], rgb[1], rgb[2], 255));
    Some(pixmap)
}

/// Draw `src` over `target` at (x, y), scaled by `opacity`.
pub fn draw_over(target: &mut Pixmap, src: &Pixmap, x: i32, y: i32, opacity: f32) {
    let paint = PixmapPaint {
        opacity: opacity.clamp(0.0, 1.0),
        ..PixmapPaint::default()
    };
    target.draw_pixmap(x, y, src.as_ref(), &paint, Transform::identity(), None);
}

/// Drop alpha, treating the canvas as composited over black.
pub fn flatten(pixmap: &Pixmap) -> RgbImage {
    let (w, h) = (pixmap.width(), pixmap.height());
    let mut out = RgbImage::new(w, h);
    // premultiplied over black is the premultiplied color itself
    for (dst, src) in out.pixels_mut().zip(pixmap.data().chunks_exact(4)) {
        dst.0 = [src[0], src[1], src[2]];
    }
    out
}

/// Rotate clockwise by the configured amount.
pub fn rotate(frame: RgbImage, rotation: Rotation) -> RgbImage {
    match rotation {
        Rotation::R0 => frame,
        Rotation::R90 => imageops::rotate90(&frame),
        Rotation::R180 => imageops::rotate180(&frame),
        Rotation::R270 => imageops::rotate270(&frame),
    }
}
