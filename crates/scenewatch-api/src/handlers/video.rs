//! Video detection handler.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use tracing::info;

use scenewatch_media::CaptureSource;
use scenewatch_models::{DetectionRecord, NewScene, SceneId, SceneUpdate, SourceKind};

use crate::error::ApiResult;
use crate::handlers::upload::{ensure_content_type, read_file_field};
use crate::metrics;
use crate::state::AppState;

const ALLOWED_VIDEO_TYPES: &[&str] = &["video/mp4", "video/avi", "video/mpeg"];

/// Response for `POST /detect/video`.
#[derive(Serialize)]
pub struct VideoDetectionResponse {
    pub scene_id: SceneId,
    pub total_detections: usize,
}

/// Run detection on every frame of an uploaded video and persist the
/// aggregated batch.
pub async fn detect_video(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<VideoDetectionResponse>> {
    let upload = read_file_field(multipart).await?;
    ensure_content_type(&upload, ALLOWED_VIDEO_TYPES)?;

    let path =
        scenewatch_media::save_upload(&state.config.upload_dir, &upload.file_name, &upload.bytes)
            .await?;

    // An upload FFprobe can't decode surfaces as 400, before any scene row.
    let media_info = scenewatch_media::probe_media(&CaptureSource::file(&path)).await?;

    let frames = scenewatch_media::detect_video(Arc::clone(&state.detector), &path).await?;
    let detections: Vec<DetectionRecord> = frames
        .iter()
        .flat_map(|f| f.detections.iter().cloned())
        .collect();

    let scene_id = state
        .store
        .add_scene(
            NewScene::new(SourceKind::VideoUpload, path.to_string_lossy())
                .with_resolution(media_info.resolution()),
        )
        .await?;
    metrics::record_scene_created(SourceKind::VideoUpload.as_str());

    state.store.add_detections(scene_id, &detections).await?;
    state
        .store
        .update_scene(scene_id, SceneUpdate::processed())
        .await?;

    metrics::record_frames_processed(SourceKind::VideoUpload.as_str(), frames.len() as u64);
    metrics::record_detections(SourceKind::VideoUpload.as_str(), detections.len() as u64);
    info!(
        scene_id = %scene_id,
        frames = frames.len(),
        detections = detections.len(),
        "video detection completed"
    );

    Ok(Json(VideoDetectionResponse {
        scene_id,
        total_detections: detections.len(),
    }))
}
