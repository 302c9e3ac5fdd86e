/// Still images and image collections, plus the scale modes shared by every
/// background kind.
use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use tracing::debug;

use crate::render::sources::BackgroundError;
use crate::theme::model::ScaleMode;

pub const COLLECTION_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "webp"];

const OPAQUE_BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Fit `img` to exactly `width`x`height` using `mode`.
pub fn fit(img: &RgbaImage, width: u32, height: u32, mode: ScaleMode) -> RgbaImage {
    let (iw, ih) = img.dimensions();
    if iw == 0 || ih == 0 {
        return RgbaImage::from_pixel(width, height, OPAQUE_BLACK);
    }

    match mode {
        ScaleMode::Stretch => {
            if (iw, ih) == (width, height) {
                img.clone()
            } else {
                imageops::resize(img, width, height, FilterType::Lanczos3)
            }
        }
        ScaleMode::ScaledFit => {
            // shrink only, never enlarge
            let scale = (width as f32 / iw as f32).min(height as f32 / ih as f32).min(1.0);
            let nw = ((iw as f32 * scale).round() as u32).max(1);
            let nh = ((ih as f32 * scale).round() as u32).max(1);
            let scaled = if (nw, nh) == (iw, ih) {
                img.clone()
            } else {
                imageops::resize(img, nw, nh, FilterType::Lanczos3)
            };
            let mut canvas = RgbaImage::from_pixel(width, height, OPAQUE_BLACK);
            let x = (width as i64 - nw as i64) / 2;
            let y = (height as i64 - nh as i64) / 2;
            imageops::overlay(&mut canvas, &scaled, x, y);
            canvas
        }
        ScaleMode::ScaledFill => {
            let img_ratio = iw as f32 / ih as f32;
            let target_ratio = width as f32 / height as f32;
            let (nw, nh) = if img_ratio > target_ratio {
                (((height as f32 * img_ratio) as u32).max(width), height)
            } else {
                (width, ((width as f32 / img_ratio) as u32).max(height))
            };
            let scaled = imageops::resize(img, nw, nh, FilterType::Lanczos3);
            let x = (nw - width) / 2;
            let y = (nh - height) / 2;
            imageops::crop_imm(&scaled, x, y, width, height).to_image()
        }
        ScaleMode::Centered => {
            let mut canvas = RgbaImage::from_pixel(width, height, OPAQUE_BLACK);
            let x = (width as i64 - iw as i64) / 2;
            let y = (height as i64 - ih as i64) / 2;
            imageops::overlay(&mut canvas, img, x, y);
            canvas
        }
        ScaleMode::Tiled => {
            let mut canvas = RgbaImage::from_pixel(width, height, OPAQUE_BLACK);
            for y in (0..height).step_by(ih as usize) {
                for x in (0..width).step_by(iw as usize) {
                    imageops::overlay(&mut canvas, img, x as i64, y as i64);
                }
            }
            canvas
        }
    }
}

pub fn open(path: &Path) -> Result<DynamicImage, BackgroundError> {
    if !path.exists() {
        return Err(BackgroundError::NotFound(path.to_path_buf()));
    }
    debug!("Loading image: {}", path.display());
    image::open(path).map_err(|source| BackgroundError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_still(path: &Path, width: u32, height: u32, mode: ScaleMode) -> Result<RgbaImage, BackgroundError> {
    let img = open(path)?.to_rgba8();
    Ok(fit(&img, width, height, mode))
}

/// Image files in `dir` with a known extension, sorted by name.
pub fn collection_files(dir: &Path) -> Result<Vec<PathBuf>, BackgroundError> {
    if !dir.is_dir() {
        return Err(BackgroundError::NotFound(dir.to_path_buf()));
    }
    let entries = fs::read_dir(dir).map_err(|source| BackgroundError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && has_extension(p, COLLECTION_EXTENSIONS))
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(BackgroundError::EmptyCollection(dir.to_path_buf()));
    }
    Ok(files)
}

pub fn load_collection(dir: &Path, width: u32, height: u32, mode: ScaleMode) -> Result<Vec<RgbaImage>, BackgroundError> {
    let files = collection_files(dir)?;
    debug!("Image collection {}: {} files", dir.display(), files.len());
    files
        .iter()
        .map(|f| load_still(f, width, height, mode))
        .collect()
}

/// Case-insensitive extension check
pub fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| allowed.iter().any(|a| a.eq_ignore_ascii_case(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([255, 0, 0, 255]))
    }

    #[test]
    fn test_every_mode_hits_target_size() {
        let modes = [
            ScaleMode::Stretch,
            ScaleMode::ScaledFit,
            ScaleMode::ScaledFill,
            ScaleMode::Centered,
            ScaleMode::Tiled,
        ];
        for src in [red(640, 200), red(50, 300), red(320, 240), red(1, 1)] {
            for mode in modes {
                let out = fit(&src, 320, 240, mode);
                assert_eq!(out.dimensions(), (320, 240), "{:?} from {:?}", mode, src.dimensions());
            }
        }
    }

    #[test]
    fn test_scaled_fit_letterboxes() {
        let out = fit(&red(640, 240), 320, 240, ScaleMode::ScaledFit);
        // 640x240 shrinks to 320x120, centered vertically
        assert_eq!(out.get_pixel(160, 0), &OPAQUE_BLACK);
        assert!(out.get_pixel(160, 120)[0] > 250);
    }

    #[test]
    fn test_centered_pads_small_image() {
        let out = fit(&red(10, 10), 320, 240, ScaleMode::Centered);
        assert_eq!(out.get_pixel(0, 0), &OPAQUE_BLACK);
        assert_eq!(out.get_pixel(160, 120)[0], 255);
    }

    #[test]
    fn test_has_extension_case_insensitive() {
        assert!(has_extension(Path::new("a/B.PNG"), COLLECTION_EXTENSIONS));
        assert!(has_extension(Path::new("c.Jpeg"), COLLECTION_EXTENSIONS));
        assert!(!has_extension(Path::new("d.gif"), COLLECTION_EXTENSIONS));
        assert!(!has_extension(Path::new("noext"), COLLECTION_EXTENSIONS));
    }

    #[test]
    fn test_collection_sorted_and_filtered() {
        let dir = std::env::temp_dir().join(format!("collection-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        red(4, 4).save(dir.join("b.png")).unwrap();
        red(4, 4).save(dir.join("A.PNG")).unwrap();
        fs::write(dir.join("notes.txt"), "x").unwrap();

        let files = collection_files(&dir).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.file_name().unwrap().to_owned()).collect();
        assert_eq!(names, vec!["A.PNG", "b.png"]);

        let frames = load_collection(&dir, 8, 6, ScaleMode::Stretch).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].dimensions(), (8, 6));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_empty_collection_errors() {
        let dir = std::env::temp_dir().join(format!("collection-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        assert!(matches!(collection_files(&dir), Err(BackgroundError::EmptyCollection(_))));
        fs::remove_dir_all(&dir).ok();
        assert!(matches!(collection_files(&dir), Err(BackgroundError::NotFound(_))));
    }
}
