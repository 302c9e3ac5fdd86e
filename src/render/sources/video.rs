/// Video backgrounds decoded eagerly through the ffmpeg command-line tools.
/// Frames stream out of ffmpeg as raw RGBA and are fit to the output size one
/// at a time, so only device-sized frames are kept.
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use image::RgbaImage;
use tracing::{debug, info};

use crate::render::sources::BackgroundError;
use crate::render::sources::image::{fit, has_extension};
use crate::theme::model::ScaleMode;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov", "webm", "flv", "wmv", "m4v"];

const FALLBACK_FPS: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub fps: Option<f64>,
}

impl StreamInfo {
    pub fn frame_duration(&self) -> Duration {
        let fps = self.fps.filter(|f| f.is_finite() && *f > 0.0).unwrap_or(FALLBACK_FPS);
        Duration::from_secs_f64(1.0 / fps)
    }
}

pub fn is_video(path: &Path) -> bool {
    has_extension(path, VIDEO_EXTENSIONS)
}

/// Parse `ffprobe -of csv=p=0` output: `width,height,num/den`.
pub fn parse_probe(line: &str) -> Option<StreamInfo> {
    let mut fields = line.trim().split(',');
    let width = fields.next()?.trim().parse().ok()?;
    let height = fields.next()?.trim().parse().ok()?;
    let fps = fields.next().and_then(parse_rate);
    Some(StreamInfo { width, height, fps })
}

fn parse_rate(rate: &str) -> Option<f64> {
    let rate = rate.trim();
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num.parse::<f64>().ok()? / den
        }
        None => rate.parse().ok()?,
    };
    (fps > 0.0).then_some(fps)
}

fn tool_error(tool: &str, path: &Path, e: std::io::Error) -> BackgroundError {
    if e.kind() == ErrorKind::NotFound {
        BackgroundError::VideoUnsupported(format!("{} not installed", tool))
    } else {
        BackgroundError::Video {
            path: path.to_path_buf(),
            reason: format!("{}: {}", tool, e),
        }
    }
}

fn probe(path: &Path) -> Result<StreamInfo, BackgroundError> {
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-select_streams", "v:0"])
        .args(["-show_entries", "stream=width,height,r_frame_rate"])
        .args(["-of", "csv=p=0"])
        .arg(path)
        .output()
        .map_err(|e| tool_error("ffprobe", path, e))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !output.status.success() {
        return Err(BackgroundError::Video {
            path: path.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    stdout
        .lines()
        .find_map(parse_probe)
        .filter(|info| info.width > 0 && info.height > 0)
        .ok_or_else(|| BackgroundError::Video {
            path: path.to_path_buf(),
            reason: "no video stream".to_string(),
        })
}

/// Raw RGBA on stdout at the coded size ffprobe reports; rotation metadata
/// is ignored so frames slice at `width * height * 4`.
fn decode_command(path: &Path) -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-v", "error", "-nostdin", "-noautorotate", "-i"])
        .arg(path)
        .args(["-f", "rawvideo", "-pix_fmt", "rgba", "-"]);
    cmd
}

fn reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("ffmpeg kill failed: {}", e);
    }
    if let Err(e) = child.wait() {
        debug!("ffmpeg wait failed: {}", e);
    }
}

/// Decode every frame. Unsupported extensions and missing tools yield
/// `VideoUnsupported`; an unreadable file is a hard error.
pub fn load(
    path: &Path,
    width: u32,
    height: u32,
    mode: ScaleMode,
) -> Result<(Vec<RgbaImage>, Duration), BackgroundError> {
    if !path.exists() {
        return Err(BackgroundError::NotFound(path.to_path_buf()));
    }
    if !is_video(path) {
        return Err(BackgroundError::VideoUnsupported(format!(
            "unsupported extension: {}",
            path.display()
        )));
    }

    let info = probe(path)?;
    debug!("Video {}: {}x{} @ {:?} fps", path.display(), info.width, info.height, info.fps);

    let mut child = decode_command(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| tool_error("ffmpeg", path, e))?;

    let video_err = |reason: String| BackgroundError::Video {
        path: path.to_path_buf(),
        reason,
    };
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| video_err("ffmpeg stdout unavailable".to_string()))?;

    let frame_len = (info.width * info.height * 4) as usize;
    let mut buf = vec![0u8; frame_len];
    let mut frames = Vec::new();
    loop {
        match stdout.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => {
                reap(&mut child);
                return Err(video_err(e.to_string()));
            }
        }
        let Some(raw) = RgbaImage::from_raw(info.width, info.height, buf.clone()) else {
            break;
        };
        frames.push(fit(&raw, width, height, mode));
    }

    let status = child.wait().map_err(|e| video_err(e.to_string()))?;
    if frames.is_empty() {
        return Err(if status.success() {
            BackgroundError::NoFrames(path.to_path_buf())
        } else {
            video_err(format!("ffmpeg exited with {}", status))
        });
    }

    let duration = info.frame_duration();
    info!("Decoded video {}: {} frames, {:?} per frame", path.display(), frames.len(), duration);
    Ok((frames, duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe() {
        let info = parse_probe("1920,1080,30000/1001").unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
        assert!((info.fps.unwrap() - 29.97).abs() < 0.01);

        let info = parse_probe("640,480,0/0").unwrap();
        assert_eq!(info.fps, None);
        assert_eq!(info.frame_duration(), Duration::from_secs_f64(1.0 / 30.0));

        assert!(parse_probe("garbage").is_none());
    }

    #[test]
    fn test_frame_duration_from_fps() {
        let info = StreamInfo {
            width: 1,
            height: 1,
            fps: Some(25.0),
        };
        assert_eq!(info.frame_duration(), Duration::from_millis(40));
    }

    #[test]
    fn test_extension_gate() {
        assert!(is_video(Path::new("clip.MP4")));
        assert!(is_video(Path::new("clip.webm")));
        assert!(!is_video(Path::new("clip.gif")));
    }

    #[test]
    fn test_decode_keeps_coded_orientation() {
        let cmd = decode_command(Path::new("clip.mp4"));
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        let noautorotate = args.iter().position(|a| a == "-noautorotate").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(noautorotate < input);
        assert_eq!(args[input + 1], "clip.mp4");
    }

    #[cfg(unix)]
    #[test]
    fn test_reap_collects_child() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        reap(&mut child);
        assert!(child.try_wait().unwrap().is_some());
    }

    #[test]
    fn test_missing_file_is_hard_error() {
        let err = load(Path::new("/nonexistent/clip.mp4"), 8, 8, ScaleMode::Stretch).unwrap_err();
        assert!(matches!(err, BackgroundError::NotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let path = std::env::temp_dir().join(format!("clip-{}.txt", uuid::Uuid::new_v4()));
        std::fs::write(&path, "x").unwrap();
        let err = load(&path, 8, 8, ScaleMode::Stretch).unwrap_err();
        assert!(matches!(err, BackgroundError::VideoUnsupported(_)));
        std::fs::remove_file(&path).ok();
    }
}
