/// Background frame sources: a device-sized, cyclic frame sequence with
/// per-frame display durations.
pub mod gif;
pub mod image;
pub mod video;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use ::image::RgbaImage;
use thiserror::Error;
use tiny_skia::Pixmap;
use tracing::{info, warn};

use crate::render::surface;
use crate::theme::model::{BackgroundConfig, BackgroundKind};

/// Display time of a still image, a collection slide or a solid color.
pub const STILL_DURATION: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum BackgroundError {
    #[error("background not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: ::image::ImageError,
    },
    #[error("failed to decode GIF {path}: {source}")]
    Gif {
        path: PathBuf,
        #[source]
        source: ::gif::DecodingError,
    },
    #[error("no images in collection {0}")]
    EmptyCollection(PathBuf),
    #[error("video decoding unavailable: {0}")]
    VideoUnsupported(String),
    #[error("failed to decode video {path}: {reason}")]
    Video { path: PathBuf, reason: String },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no frames in {0}")]
    NoFrames(PathBuf),
    #[error("invalid output size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
}

pub struct BackgroundSource {
    frames: Vec<Pixmap>,
    durations: Vec<Duration>,
    cursor: usize,
    started: Instant,
}

impl BackgroundSource {
    /// Decode the configured background. Missing files fail here rather
    /// than at the first frame.
    pub fn load(config: &BackgroundConfig, width: u32, height: u32) -> Result<Self, BackgroundError> {
        let mode = config.scale_mode;
        let path = &config.path;

        let kind = if config.enabled { config.kind } else { BackgroundKind::Color };
        let decoded: Vec<(RgbaImage, Duration)> = match kind {
            BackgroundKind::Color => Vec::new(),
            BackgroundKind::Image => vec![(image::load_still(path, width, height, mode)?, STILL_DURATION)],
            BackgroundKind::Gif => gif::load(path, width, height, mode)?,
            BackgroundKind::Video => match video::load(path, width, height, mode) {
                Ok((frames, duration)) => frames.into_iter().map(|f| (f, duration)).collect(),
                Err(BackgroundError::VideoUnsupported(reason)) => {
                    warn!("Video background unavailable ({}), loading as still image", reason);
                    vec![(image::load_still(path, width, height, mode)?, STILL_DURATION)]
                }
                Err(e) => return Err(e),
            },
            BackgroundKind::ImageCollection => image::load_collection(path, width, height, mode)?
                .into_iter()
                .map(|f| (f, STILL_DURATION))
                .collect(),
        };

        let base = surface::solid(width, height, config.color).ok_or(BackgroundError::InvalidSize { width, height })?;

        let (frames, durations) = if decoded.is_empty() {
            (vec![base], vec![STILL_DURATION])
        } else {
            let mut frames = Vec::with_capacity(decoded.len());
            let mut durations = Vec::with_capacity(decoded.len());
            for (img, duration) in decoded {
                frames.push(blend_over(&base, &img, config.alpha)?);
                durations.push(duration);
            }
            (frames, durations)
        };

        info!(
            "Background {:?} ready: {} frame(s), first lasts {:?}",
            kind,
            frames.len(),
            durations[0]
        );
        Self::from_frames(frames, durations)
    }

    pub fn from_frames(frames: Vec<Pixmap>, durations: Vec<Duration>) -> Result<Self, BackgroundError> {
        if frames.is_empty() || frames.len() != durations.len() {
            return Err(BackgroundError::NoFrames(PathBuf::new()));
        }
        Ok(Self {
            frames,
            durations,
            cursor: 0,
            started: Instant::now(),
        })
    }

    pub fn current_frame(&mut self) -> (&Pixmap, Duration) {
        self.current_frame_at(Instant::now())
    }

    /// Advance (wrapping) once the current frame has been shown for its own
    /// duration, then return the frame under the cursor.
    pub fn current_frame_at(&mut self, now: Instant) -> (&Pixmap, Duration) {
        if self.frames.len() > 1 && now.saturating_duration_since(self.started) >= self.durations[self.cursor] {
            self.cursor = (self.cursor + 1) % self.frames.len();
            self.started = now;
        }
        (&self.frames[self.cursor], self.durations[self.cursor])
    }

    pub fn current_duration(&self) -> Duration {
        self.durations[self.cursor]
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

/// solid * (1 - alpha) + frame * alpha; the result is opaque.
fn blend_over(base: &Pixmap, frame: &RgbaImage, alpha: f32) -> Result<Pixmap, BackgroundError> {
    let (width, height) = frame.dimensions();
    let layer = surface::pixmap_from_rgba(frame).ok_or(BackgroundError::InvalidSize { width, height })?;
    let mut out = base.clone();
    surface::draw_over(&mut out, &layer, 0, 0, alpha);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::model::ScaleMode;
    use ::image::Rgba;

    fn config(kind: BackgroundKind, path: PathBuf) -> BackgroundConfig {
        BackgroundConfig {
            enabled: true,
            kind,
            path,
            scale_mode: ScaleMode::Stretch,
            color: [10, 20, 30],
            alpha: 1.0,
        }
    }

    fn pixel(p: &Pixmap, x: u32, y: u32) -> [u8; 3] {
        surface::flatten(p).get_pixel(x, y).0
    }

    fn temp_path(ext: &str) -> PathBuf {
        std::env::temp_dir().join(format!("bg-{}.{}", uuid::Uuid::new_v4(), ext))
    }

    #[test]
    fn test_color_background() {
        let mut src = BackgroundSource::load(&config(BackgroundKind::Color, PathBuf::new()), 320, 240).unwrap();
        let (frame, duration) = src.current_frame();
        assert_eq!((frame.width(), frame.height()), (320, 240));
        assert_eq!(duration, STILL_DURATION);
        assert_eq!(pixel(frame, 100, 100), [10, 20, 30]);
    }

    #[test]
    fn test_disabled_background_is_solid() {
        let mut cfg = config(BackgroundKind::Image, PathBuf::from("/nonexistent.png"));
        cfg.enabled = false;
        let mut src = BackgroundSource::load(&cfg, 16, 8).unwrap();
        assert_eq!(pixel(src.current_frame().0, 0, 0), [10, 20, 30]);
    }

    #[test]
    fn test_missing_image_fails_at_load() {
        let cfg = config(BackgroundKind::Image, PathBuf::from("/nonexistent.png"));
        assert!(matches!(
            BackgroundSource::load(&cfg, 16, 8),
            Err(BackgroundError::NotFound(_))
        ));
    }

    #[test]
    fn test_image_resized_and_alpha_blended() {
        let path = temp_path("png");
        RgbaImage::from_pixel(4, 4, Rgba([200, 200, 200, 255])).save(&path).unwrap();

        let mut cfg = config(BackgroundKind::Image, path.clone());
        cfg.color = [0, 0, 0];
        cfg.alpha = 0.5;
        let mut src = BackgroundSource::load(&cfg, 32, 16).unwrap();
        let (frame, _) = src.current_frame();
        assert_eq!((frame.width(), frame.height()), (32, 16));
        let px = pixel(frame, 16, 8);
        assert!((98..=102).contains(&px[0]), "{:?}", px);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_gif_cycles_with_own_durations() {
        let path = temp_path("gif");
        gif::tests::write_test_gif(&path, [10, 30]);

        let mut src = BackgroundSource::load(&config(BackgroundKind::Gif, path.clone()), 20, 10).unwrap();
        assert_eq!(src.frame_count(), 2);

        let t0 = src.started;
        assert_eq!(src.current_frame_at(t0).1, Duration::from_millis(100));
        // not yet due
        src.current_frame_at(t0 + Duration::from_millis(50));
        assert_eq!(src.cursor(), 0);

        let t1 = t0 + Duration::from_millis(100);
        let (frame, duration) = src.current_frame_at(t1);
        assert_eq!((frame.width(), frame.height()), (20, 10));
        assert_eq!(duration, Duration::from_millis(300));
        assert_eq!(src.cursor(), 1);

        // the second frame holds for its own, longer duration
        src.current_frame_at(t1 + Duration::from_millis(200));
        assert_eq!(src.cursor(), 1);
        src.current_frame_at(t1 + Duration::from_millis(300));
        assert_eq!(src.cursor(), 0);
        assert_eq!(src.current_duration(), Duration::from_millis(100));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_cycle_repeats_after_frame_count_advances() {
        let frames = (0..3).map(|_| surface::solid(4, 4, [0, 0, 0]).unwrap()).collect();
        let durations = vec![
            Duration::from_millis(10),
            Duration::from_millis(20),
            Duration::from_millis(30),
        ];
        let mut src = BackgroundSource::from_frames(frames, durations).unwrap();

        let mut now = src.started;
        let mut seen = Vec::new();
        for _ in 0..6 {
            now += src.current_duration();
            let (_, d) = src.current_frame_at(now);
            seen.push((src.cursor(), d));
        }
        assert_eq!(seen[..3], seen[3..]);
    }

    #[test]
    fn test_video_falls_back_to_still_for_unsupported_extension() {
        let path = temp_path("png");
        RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255])).save(&path).unwrap();
        let mut src = BackgroundSource::load(&config(BackgroundKind::Video, path.clone()), 8, 8).unwrap();
        assert_eq!(src.frame_count(), 1);
        assert!(pixel(src.current_frame().0, 4, 4)[0] > 250);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_from_frames_rejects_empty() {
        assert!(BackgroundSource::from_frames(Vec::new(), Vec::new()).is_err());
    }
}
