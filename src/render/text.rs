/// Font access for every text draw.
/// A `FontProvider` measures and rasterizes single lines; the compositor
/// never touches rusttype directly.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusttype::{point, Font, Scale};
use tracing::{debug, info, warn};

/// Well-known locations tried when neither the theme nor the command line
/// names a font.
const FALLBACK_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/noto/NotoSans-Bold.ttf",
];

/// Line box of a run of text at a given size
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextExtent {
    pub width: u32,
    pub height: u32,
    /// Distance from the top of the line box to the baseline
    pub ascent: f32,
}

/// 8-bit coverage for one line, origin at the top-left of its line box
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GlyphMask {
    pub width: u32,
    pub height: u32,
    pub coverage: Vec<u8>,
}

impl GlyphMask {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.coverage.iter().all(|&c| c == 0)
    }

    #[inline]
    pub fn at(&self, x: u32, y: u32) -> u8 {
        self.coverage[(y * self.width + x) as usize]
    }
}

pub trait FontProvider: Send + Sync {
    fn measure(&self, text: &str, size: f32) -> TextExtent;
    fn rasterize(&self, text: &str, size: f32) -> GlyphMask;
}

pub type SharedFont = Arc<dyn FontProvider>;

pub struct TrueTypeFont {
    font: Font<'static>,
    path: PathBuf,
}

impl TrueTypeFont {
    pub fn from_file(path: &Path) -> Option<Self> {
        let data = match fs::read(path) {
            Ok(d) => d,
            Err(e) => {
                debug!("Cannot read font {}: {}", path.display(), e);
                return None;
            }
        };
        let font = Font::try_from_vec(data)?;
        Some(Self {
            font,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn line_metrics(&self, size: f32) -> (Scale, f32, u32) {
        let scale = Scale::uniform(size);
        let v = self.font.v_metrics(scale);
        let height = (v.ascent - v.descent).ceil().max(0.0) as u32;
        (scale, v.ascent, height)
    }
}

impl FontProvider for TrueTypeFont {
    fn measure(&self, text: &str, size: f32) -> TextExtent {
        let (scale, ascent, height) = self.line_metrics(size);
        let width = self
            .font
            .layout(text, scale, point(0.0, ascent))
            .last()
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0);
        TextExtent {
            width: width.ceil().max(0.0) as u32,
            height,
            ascent,
        }
    }

    fn rasterize(&self, text: &str, size: f32) -> GlyphMask {
        let extent = self.measure(text, size);
        let (scale, ascent, _) = self.line_metrics(size);
        let (w, h) = (extent.width, extent.height);
        let mut coverage = vec![0u8; (w * h) as usize];

        for glyph in self.font.layout(text, scale, point(0.0, ascent)) {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, v| {
                let px = bb.min.x + gx as i32;
                let py = bb.min.y + gy as i32;
                if px >= 0 && py >= 0 && (px as u32) < w && (py as u32) < h {
                    let idx = (py as u32 * w + px as u32) as usize;
                    let c = (v * 255.0).round() as u8;
                    coverage[idx] = coverage[idx].max(c);
                }
            });
        }

        GlyphMask {
            width: w,
            height: h,
            coverage,
        }
    }
}

/// Draws nothing; used when no font file can be found.
pub struct NoFont;

impl FontProvider for NoFont {
    fn measure(&self, _text: &str, _size: f32) -> TextExtent {
        TextExtent::default()
    }

    fn rasterize(&self, _text: &str, _size: f32) -> GlyphMask {
        GlyphMask::default()
    }
}

/// Resolve the font for a theme: the theme's own font, then the
/// command-line font, then well-known system paths.
pub fn load_font(theme_font: Option<&Path>, default_font: Option<&Path>) -> SharedFont {
    let candidates = theme_font
        .into_iter()
        .chain(default_font)
        .map(Path::to_path_buf)
        .chain(FALLBACK_FONTS.iter().map(PathBuf::from));

    for path in candidates {
        if let Some(font) = TrueTypeFont::from_file(&path) {
            info!("Using font {}", font.path().display());
            return Arc::new(font);
        }
    }

    warn!("No usable TrueType font found, text will not be drawn");
    Arc::new(NoFont)
}
