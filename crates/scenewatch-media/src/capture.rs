//! Frame capture via FFmpeg.
//!
//! Every source is decoded by an FFmpeg child process writing raw RGB24
//! frames to stdout. Frame geometry comes from a prior probe; the reader
//! slices stdout into `width * height * 3`-byte frames.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// One decoded RGB24 frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Zero-based frame index within the capture
    pub index: u64,
    pub width: u32,
    pub height: u32,
    /// Raw RGB24 pixels, `width * height * 3` bytes
    pub pixels: Vec<u8>,
}

/// A decodable input: local file, capture device, or RTSP stream.
#[derive(Debug, Clone)]
pub enum CaptureSource {
    /// Local media file (image or video)
    File(PathBuf),
    /// V4L2 capture device, e.g. /dev/video0
    Device(String),
    /// RTSP stream URL
    Rtsp(String),
}

impl CaptureSource {
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }

    /// Input description used in logs and errors.
    pub fn describe(&self) -> String {
        match self {
            CaptureSource::File(path) => path.display().to_string(),
            CaptureSource::Device(device) => device.clone(),
            CaptureSource::Rtsp(url) => url.clone(),
        }
    }

    /// FFmpeg/FFprobe arguments placed before the input.
    pub(crate) fn input_args(&self) -> Vec<String> {
        match self {
            CaptureSource::File(_) => Vec::new(),
            CaptureSource::Device(_) => vec!["-f".into(), "v4l2".into()],
            CaptureSource::Rtsp(_) => vec!["-rtsp_transport".into(), "tcp".into()],
        }
    }

    /// The input operand itself.
    pub(crate) fn input(&self) -> String {
        self.describe()
    }
}

/// Build the FFmpeg argument list for a rawvideo pipe capture.
fn build_capture_args(source: &CaptureSource, duration: Option<Duration>) -> Vec<String> {
    let mut args: Vec<String> = vec!["-v".into(), "error".into()];
    args.extend(source.input_args());
    args.push("-i".into());
    args.push(source.input());
    if let Some(duration) = duration {
        args.push("-t".into());
        args.push(format!("{:.3}", duration.as_secs_f64()));
    }
    args.extend([
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgb24".into(),
        "pipe:1".into(),
    ]);
    args
}

/// Stream of decoded frames from an FFmpeg child process.
pub struct FrameStream {
    child: Child,
    stdout: ChildStdout,
    width: u32,
    height: u32,
    frame_len: usize,
    next_index: u64,
    deadline: Option<Instant>,
}

impl FrameStream {
    /// Spawn FFmpeg for `source` and start reading frames of the given
    /// geometry. When `duration` is set, capture stops once it elapses:
    /// FFmpeg is told to stop via `-t`, and the reader enforces its own
    /// deadline in case a stalled network source never reaches it.
    pub async fn open(
        source: CaptureSource,
        geometry: (u32, u32),
        duration: Option<Duration>,
    ) -> MediaResult<Self> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let (width, height) = geometry;
        if width == 0 || height == 0 {
            return Err(MediaError::invalid_input(format!(
                "capture geometry {}x{} is not decodable",
                width, height
            )));
        }

        let args = build_capture_args(&source, duration);
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                MediaError::source_unavailable(format!(
                    "failed to start decoder for '{}': {e}",
                    source.describe()
                ))
            })?;

        let stdout = child.stdout.take().expect("stdout not captured");
        info!(source = %source.describe(), width, height, "capture started");

        // Grace on top of the requested duration so FFmpeg's own -t clock
        // normally wins; the reader deadline only fires for stalled sources.
        let deadline = duration.map(|d| Instant::now() + d + Duration::from_secs(2));

        Ok(Self {
            child,
            stdout,
            width,
            height,
            frame_len: width as usize * height as usize * 3,
            next_index: 0,
            deadline,
        })
    }

    /// Read the next frame; `None` once the source ends or the capture
    /// duration expires.
    pub async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        let mut pixels = vec![0u8; self.frame_len];

        let read = match self.deadline {
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, self.stdout.read_exact(&mut pixels)).await {
                    Ok(read) => read,
                    Err(_) => {
                        debug!("capture duration elapsed, stopping decoder");
                        let _ = self.child.start_kill();
                        return Ok(None);
                    }
                }
            }
            None => self.stdout.read_exact(&mut pixels).await,
        };

        match read {
            Ok(_) => {
                let frame = Frame {
                    index: self.next_index,
                    width: self.width,
                    height: self.height,
                    pixels,
                };
                self.next_index += 1;
                Ok(Some(frame))
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Frames read so far.
    pub fn frames_read(&self) -> u64 {
        self.next_index
    }
}
