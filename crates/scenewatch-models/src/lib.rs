//! Shared data models for the SceneWatch backend.
//!
//! This crate provides Serde-serializable types for:
//! - Scenes (one capture event: image, video, webcam or RTSP session)
//! - Detections (bounding boxes found within a scene)
//! - Capture source kinds

pub mod detection;
pub mod scene;

// Re-export common types
pub use detection::{DetectionRecord, InvalidDetection};
pub use scene::{NewScene, Scene, SceneId, SceneUpdate, SourceKind};
