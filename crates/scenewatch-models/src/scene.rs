//! Scene metadata models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a scene, assigned by the store on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(pub i64);

impl SceneId {
    /// Get the inner row id.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SceneId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Capture source a scene originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Uploaded still image
    ImageUpload,
    /// Uploaded video file
    VideoUpload,
    /// Local webcam capture session
    Webcam,
    /// RTSP network stream session
    RtspStream,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::ImageUpload => "image_upload",
            SourceKind::VideoUpload => "video_upload",
            SourceKind::Webcam => "webcam",
            SourceKind::RtspStream => "rtsp_stream",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata for a scene about to be inserted.
///
/// `timestamp`, `camera_id` and `media_path` are required; the store rejects
/// records whose required string fields are empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewScene {
    /// Capture timestamp
    pub timestamp: DateTime<Utc>,

    /// Latitude of the capture location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,

    /// Longitude of the capture location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,

    /// Source resolution, "WxH"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,

    /// Identifier of the capturing source
    pub camera_id: String,

    /// Path to the media file, or the stream URL
    pub media_path: String,
}

impl NewScene {
    /// Create scene metadata for a capture happening now.
    pub fn new(kind: SourceKind, media_path: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            latitude: None,
            longitude: None,
            resolution: None,
            camera_id: kind.as_str().to_string(),
            media_path: media_path.into(),
        }
    }

    /// Set the source resolution.
    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }

    /// Set the capture location.
    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }
}

/// A stored scene row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Unique scene id, immutable once assigned
    pub id: SceneId,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    pub camera_id: String,
    pub media_path: String,
    /// Whether the detection request that created this scene completed
    pub processed: bool,
}

/// Partial update of a scene; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed: Option<bool>,
}

impl SceneUpdate {
    /// Mark the owning request as completed.
    pub fn processed() -> Self {
        Self {
            processed: Some(true),
            ..Self::default()
        }
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.latitude.is_none()
            && self.longitude.is_none()
            && self.resolution.is_none()
            && self.media_path.is_none()
            && self.processed.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_strings() {
        assert_eq!(SourceKind::ImageUpload.as_str(), "image_upload");
        assert_eq!(SourceKind::Webcam.as_str(), "webcam");
        assert_eq!(SourceKind::RtspStream.to_string(), "rtsp_stream");
    }

    #[test]
    fn test_new_scene_defaults() {
        let scene = NewScene::new(SourceKind::VideoUpload, "uploads/clip.mp4");
        assert_eq!(scene.camera_id, "video_upload");
        assert_eq!(scene.media_path, "uploads/clip.mp4");
        assert!(scene.resolution.is_none());
        assert!(scene.latitude.is_none());
    }

    #[test]
    fn test_new_scene_builders() {
        let scene = NewScene::new(SourceKind::ImageUpload, "uploads/a.jpg")
            .with_resolution("1920x1080")
            .with_location(40.7128, -74.0060);
        assert_eq!(scene.resolution.as_deref(), Some("1920x1080"));
        assert_eq!(scene.latitude, Some(40.7128));
        assert_eq!(scene.longitude, Some(-74.0060));
    }

    #[test]
    fn test_scene_update_is_empty() {
        assert!(SceneUpdate::default().is_empty());
        assert!(!SceneUpdate::processed().is_empty());
    }
}
