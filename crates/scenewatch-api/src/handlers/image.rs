//! Image detection handler.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use tracing::info;

use scenewatch_models::{DetectionRecord, NewScene, SceneId, SceneUpdate, SourceKind};

use crate::error::ApiResult;
use crate::handlers::upload::{ensure_content_type, read_file_field};
use crate::metrics;
use crate::state::AppState;

const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/jpg"];

/// Response for `POST /detect/image`.
#[derive(Serialize)]
pub struct ImageDetectionResponse {
    pub scene_id: SceneId,
    pub detections: Vec<DetectionRecord>,
    pub annotated_image: String,
}

/// Run detection on an uploaded image and persist the result.
pub async fn detect_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<ImageDetectionResponse>> {
    let upload = read_file_field(multipart).await?;
    ensure_content_type(&upload, ALLOWED_IMAGE_TYPES)?;

    let path =
        scenewatch_media::save_upload(&state.config.upload_dir, &upload.file_name, &upload.bytes)
            .await?;

    // Decode failure surfaces as 400 here, before any scene row exists.
    let (detections, meta) =
        scenewatch_media::detect_image(Arc::clone(&state.detector), &path).await?;

    let scene_id = state
        .store
        .add_scene(
            NewScene::new(SourceKind::ImageUpload, path.to_string_lossy())
                .with_resolution(meta.resolution()),
        )
        .await?;
    metrics::record_scene_created(SourceKind::ImageUpload.as_str());

    state.store.add_detections(scene_id, &detections).await?;

    let annotated = scenewatch_media::annotate_image(&path, &detections).await?;

    state
        .store
        .update_scene(scene_id, SceneUpdate::processed())
        .await?;

    metrics::record_frames_processed(SourceKind::ImageUpload.as_str(), 1);
    metrics::record_detections(SourceKind::ImageUpload.as_str(), detections.len() as u64);
    info!(
        scene_id = %scene_id,
        detections = detections.len(),
        "image detection completed"
    );

    Ok(Json(ImageDetectionResponse {
        scene_id,
        detections,
        annotated_image: annotated.to_string_lossy().to_string(),
    }))
}
