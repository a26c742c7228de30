//! Webcam and RTSP detection handlers.
//!
//! Both run the same time-bounded loop: one scene row up front, then one
//! detection batch per frame until the caller-specified duration elapses.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Form, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use scenewatch_media::{CaptureSource, FrameStream, MediaInfo};
use scenewatch_models::{NewScene, SceneId, SceneUpdate, SourceKind};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Response for the streaming endpoints.
#[derive(Serialize)]
pub struct StreamDetectionResponse {
    pub scene_id: SceneId,
    pub message: String,
}

/// Form parameters for `POST /detect/webcam`.
///
/// Fields are optional so a missing parameter maps to 422 instead of the
/// extractor's default rejection.
#[derive(Debug, Deserialize)]
pub struct WebcamParams {
    pub duration: Option<i64>,
}

/// Form parameters for `POST /detect/rtsp`.
#[derive(Debug, Deserialize)]
pub struct RtspParams {
    pub rtsp_url: Option<String>,
    pub duration: Option<i64>,
}

/// Capture the local webcam for a caller-specified duration.
pub async fn detect_webcam(
    State(state): State<AppState>,
    Form(params): Form<WebcamParams>,
) -> ApiResult<Json<StreamDetectionResponse>> {
    let duration = require_positive_duration(params.duration)?;

    let source = CaptureSource::Device(state.config.webcam_device.clone());
    // A webcam that won't open is a server-side fault.
    let media_info = scenewatch_media::probe_media(&source)
        .await
        .map_err(|e| ApiError::internal(format!("failed to open webcam: {e}")))?;

    let media_path = format!("webcam_stream_{}", Uuid::new_v4());
    let scene_id = run_stream_detection(
        &state,
        source,
        SourceKind::Webcam,
        media_path,
        media_info,
        duration,
    )
    .await?;

    Ok(Json(StreamDetectionResponse {
        scene_id,
        message: format!(
            "Webcam detection completed for {} seconds",
            duration.as_secs()
        ),
    }))
}

/// Capture an RTSP stream for a caller-specified duration.
pub async fn detect_rtsp(
    State(state): State<AppState>,
    Form(params): Form<RtspParams>,
) -> ApiResult<Json<StreamDetectionResponse>> {
    let rtsp_url = params
        .rtsp_url
        .ok_or_else(|| ApiError::unprocessable("missing parameter 'rtsp_url'"))?;
    if !rtsp_url.starts_with("rtsp://") {
        return Err(ApiError::unprocessable(
            "rtsp_url must begin with 'rtsp://'",
        ));
    }
    let duration = require_positive_duration(params.duration)?;

    let source = CaptureSource::Rtsp(rtsp_url);
    // An unreachable stream maps to 400, before any scene row exists.
    let media_info = scenewatch_media::probe_media(&source).await?;

    let media_path = source.describe();
    let scene_id = run_stream_detection(
        &state,
        source,
        SourceKind::RtspStream,
        media_path,
        media_info,
        duration,
    )
    .await?;

    Ok(Json(StreamDetectionResponse {
        scene_id,
        message: format!(
            "RTSP stream detection completed for {} seconds",
            duration.as_secs()
        ),
    }))
}

fn require_positive_duration(duration: Option<i64>) -> ApiResult<Duration> {
    match duration {
        Some(secs) if secs > 0 => Ok(Duration::from_secs(secs as u64)),
        Some(_) => Err(ApiError::unprocessable(
            "duration must be greater than zero",
        )),
        None => Err(ApiError::unprocessable("missing parameter 'duration'")),
    }
}

/// Shared capture loop: scene first, then one detection batch per frame
/// until the duration elapses, then finalize.
async fn run_stream_detection(
    state: &AppState,
    source: CaptureSource,
    kind: SourceKind,
    media_path: String,
    media_info: MediaInfo,
    duration: Duration,
) -> ApiResult<SceneId> {
    let scene_id = state
        .store
        .add_scene(NewScene::new(kind, media_path).with_resolution(media_info.resolution()))
        .await?;
    metrics::record_scene_created(kind.as_str());

    let mut stream = FrameStream::open(
        source,
        (media_info.width, media_info.height),
        Some(duration),
    )
    .await?;

    let mut total_detections = 0u64;
    while let Some(frame) = stream.next_frame().await? {
        let records = scenewatch_media::detect_frame(Arc::clone(&state.detector), frame).await?;
        if !records.is_empty() {
            state.store.add_detections(scene_id, &records).await?;
            total_detections += records.len() as u64;
        }
    }

    let frames = stream.frames_read();
    state
        .store
        .update_scene(scene_id, SceneUpdate::processed())
        .await?;

    metrics::record_frames_processed(kind.as_str(), frames);
    metrics::record_detections(kind.as_str(), total_detections);
    info!(
        scene_id = %scene_id,
        source = %kind,
        frames,
        detections = total_detections,
        "stream detection completed"
    );

    Ok(scene_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_duration_accepted() {
        assert_eq!(
            require_positive_duration(Some(10)).unwrap(),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_zero_and_negative_duration_rejected() {
        assert!(require_positive_duration(Some(0)).is_err());
        assert!(require_positive_duration(Some(-5)).is_err());
        assert!(require_positive_duration(None).is_err());
    }
}
