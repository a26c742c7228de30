//! FFprobe source information.

use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;

use crate::capture::CaptureSource;
use crate::error::{MediaError, MediaResult};

/// Decoded geometry and stream information for a capture source.
#[derive(Debug, Clone)]
pub struct MediaInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Duration in seconds, when the source is finite
    pub duration: Option<f64>,
    /// Video codec
    pub codec: String,
}

impl MediaInfo {
    /// Resolution string, "WxH".
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Probe a capture source for geometry and stream information.
///
/// A file that fails to probe is invalid input; a device or stream that
/// fails to probe is unavailable.
pub async fn probe_media(source: &CaptureSource) -> MediaResult<MediaInfo> {
    if let CaptureSource::File(path) = source {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.clone()));
        }
    }

    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    let mut args: Vec<String> = vec![
        "-v".into(),
        "quiet".into(),
        "-print_format".into(),
        "json".into(),
        "-show_format".into(),
        "-show_streams".into(),
    ];
    args.extend(source.input_args());
    args.push(source.input());

    let output = Command::new("ffprobe")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(probe_failure(source, &stderr));
    }

    let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| probe_failure(source, "no video stream found"))?;

    let (width, height) = match (video_stream.width, video_stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(probe_failure(source, "stream reports no geometry")),
    };

    let fps = video_stream
        .avg_frame_rate
        .as_ref()
        .or(video_stream.r_frame_rate.as_ref())
        .and_then(|r| parse_frame_rate(r))
        .unwrap_or(30.0);

    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|d| d.parse::<f64>().ok());

    Ok(MediaInfo {
        width,
        height,
        fps,
        duration,
        codec: video_stream.codec_name.clone().unwrap_or_default(),
    })
}

fn probe_failure(source: &CaptureSource, detail: &str) -> MediaError {
    let detail = if detail.is_empty() {
        "probe failed".to_string()
    } else {
        detail.to_string()
    };
    match source {
        CaptureSource::File(path) => {
            MediaError::invalid_input(format!("'{}' does not decode: {detail}", path.display()))
        }
        _ => MediaError::source_unavailable(format!("'{}': {detail}", source.describe())),
    }
}

/// Parse a frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[test]
    fn test_resolution_string() {
        let info = MediaInfo {
            width: 1920,
            height: 1080,
            fps: 30.0,
            duration: Some(12.5),
            codec: "h264".into(),
        };
        assert_eq!(info.resolution(), "1920x1080");
    }

    #[tokio::test]
    async fn test_probe_missing_file_is_invalid_input() {
        let err = probe_media(&CaptureSource::file("/nonexistent/clip.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
