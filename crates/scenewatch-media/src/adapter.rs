//! High-level detection operations over capture sources.
//!
//! Inference is CPU/GPU bound and non-cancelable once started, so every
//! call runs on a blocking worker while the capture loop stays async.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use scenewatch_models::DetectionRecord;

use crate::capture::{CaptureSource, Frame, FrameStream};
use crate::detector::{Detector, FrameDetections};
use crate::error::{MediaError, MediaResult};
use crate::probe;

/// Decoded image metadata.
#[derive(Debug, Clone, Copy)]
pub struct ImageMeta {
    pub width: u32,
    pub height: u32,
}

impl ImageMeta {
    /// Resolution string, "WxH".
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Decode one image and run inference once.
///
/// Fails with [`MediaError::InvalidInput`] when the path does not decode to
/// an image.
pub async fn detect_image(
    detector: Arc<dyn Detector>,
    path: impl AsRef<Path>,
) -> MediaResult<(Vec<DetectionRecord>, ImageMeta)> {
    let path = path.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || {
        let img = image::open(&path).map_err(|e| {
            MediaError::invalid_input(format!(
                "'{}' does not decode as an image: {e}",
                path.display()
            ))
        })?;
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        let frame = Frame {
            index: 0,
            width,
            height,
            pixels: rgb.into_raw(),
        };
        let detections = detector.detect_frame(&frame)?;
        Ok((detections, ImageMeta { width, height }))
    })
    .await
    .map_err(|e| MediaError::internal(format!("detection task failed: {e}")))?
}

/// Run inference on one already-decoded frame.
pub async fn detect_frame(
    detector: Arc<dyn Detector>,
    frame: Frame,
) -> MediaResult<Vec<DetectionRecord>> {
    tokio::task::spawn_blocking(move || detector.detect_frame(&frame))
        .await
        .map_err(|e| MediaError::internal(format!("detection task failed: {e}")))?
}

/// Decode every frame of a video file and run inference on each,
/// concatenating results tagged with the frame index.
pub async fn detect_video(
    detector: Arc<dyn Detector>,
    path: impl AsRef<Path>,
) -> MediaResult<Vec<FrameDetections>> {
    let source = CaptureSource::file(path.as_ref());
    let info = probe::probe_media(&source).await?;
    let mut stream = FrameStream::open(source, (info.width, info.height), None).await?;

    let mut out = Vec::new();
    while let Some(frame) = stream.next_frame().await? {
        let frame_index = frame.index;
        let detections = detect_frame(Arc::clone(&detector), frame).await?;
        out.push(FrameDetections {
            frame_index,
            detections,
        });
    }

    info!(
        frames = out.len(),
        detections = out.iter().map(|f| f.detections.len()).sum::<usize>(),
        "video detection completed"
    );

    Ok(out)
}
