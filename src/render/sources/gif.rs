/// Animated GIF decoding with disposal handling.
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use gif::DisposalMethod;
use image::{Rgba, RgbaImage};
use tracing::debug;

use crate::render::sources::BackgroundError;
use crate::render::sources::image::fit;
use crate::theme::model::ScaleMode;

/// Frames faster than this are slowed down to it.
pub const MIN_FRAME_DELAY: Duration = Duration::from_millis(67);
/// Used when a frame carries no delay.
pub const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

pub fn frame_delay(centiseconds: u16) -> Duration {
    if centiseconds == 0 {
        return DEFAULT_FRAME_DELAY;
    }
    Duration::from_millis(centiseconds as u64 * 10).max(MIN_FRAME_DELAY)
}

/// Decode every frame of `path`, composed onto the logical screen and fit
/// to `width`x`height`.
pub fn load(
    path: &Path,
    width: u32,
    height: u32,
    mode: ScaleMode,
) -> Result<Vec<(RgbaImage, Duration)>, BackgroundError> {
    if !path.exists() {
        return Err(BackgroundError::NotFound(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|source| BackgroundError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let gif_err = |source| BackgroundError::Gif {
        path: path.to_path_buf(),
        source,
    };

    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = options.read_info(file).map_err(gif_err)?;

    let (sw, sh) = (decoder.width() as u32, decoder.height() as u32);
    if sw == 0 || sh == 0 {
        return Err(BackgroundError::NoFrames(path.to_path_buf()));
    }
    let mut screen = RgbaImage::new(sw, sh);
    let mut frames = Vec::new();

    while let Some(frame) = decoder.read_next_frame().map_err(gif_err)? {
        let (fx, fy) = (frame.left as u32, frame.top as u32);
        let (fw, fh) = (frame.width as u32, frame.height as u32);
        let previous = (frame.dispose == DisposalMethod::Previous).then(|| screen.clone());

        for y in 0..fh {
            for x in 0..fw {
                let i = ((y * fw + x) * 4) as usize;
                let Some(px) = frame.buffer.get(i..i + 4) else {
                    continue;
                };
                // transparent index leaves the screen untouched
                if px[3] == 0 {
                    continue;
                }
                let (sx, sy) = (fx + x, fy + y);
                if sx < sw && sy < sh {
                    screen.put_pixel(sx, sy, Rgba([px[0], px[1], px[2], px[3]]));
                }
            }
        }

        frames.push((fit(&screen, width, height, mode), frame_delay(frame.delay)));

        match frame.dispose {
            DisposalMethod::Background => {
                for y in fy..(fy + fh).min(sh) {
                    for x in fx..(fx + fw).min(sw) {
                        screen.put_pixel(x, y, Rgba([0, 0, 0, 0]));
                    }
                }
            }
            DisposalMethod::Previous => {
                if let Some(prev) = previous {
                    screen = prev;
                }
            }
            _ => {}
        }
    }

    if frames.is_empty() {
        return Err(BackgroundError::NoFrames(path.to_path_buf()));
    }
    debug!("Loaded GIF {}: {} frames", path.display(), frames.len());
    Ok(frames)
}
