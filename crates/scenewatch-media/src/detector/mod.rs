//! Detection backends.
//!
//! [`Detector`] is the adapter seam: every model family implements it and
//! emits the fixed [`DetectionRecord`] contract, isolating callers from the
//! native output shape of the wrapped model. This repo ships the YOLOv8
//! ONNX backend plus a stub used by tests and model-less deployments.

pub mod yolov8;

use scenewatch_models::DetectionRecord;

use crate::capture::Frame;
use crate::error::MediaResult;

pub use yolov8::{YoloV8Config, YoloV8Detector, COCO_CLASSES};

/// Detections for one frame of a multi-frame source, tagged with the frame
/// index they were found in.
#[derive(Debug, Clone)]
pub struct FrameDetections {
    pub frame_index: u64,
    pub detections: Vec<DetectionRecord>,
}

/// A pretrained object-detection backend.
///
/// Implementations run inference on one decoded frame at a time and
/// normalize the model's native output into [`DetectionRecord`]s with
/// corner-format boxes in source pixel coordinates.
pub trait Detector: Send + Sync {
    /// Backend identifier for logging.
    fn name(&self) -> &'static str;

    /// Run inference on one frame.
    fn detect_frame(&self, frame: &Frame) -> MediaResult<Vec<DetectionRecord>>;
}

/// Backend that returns a fixed set of records for every frame.
///
/// Used by handler tests and deployments without model weights.
pub struct StubDetector {
    records: Vec<DetectionRecord>,
}

impl StubDetector {
    /// Stub returning the given records for every frame.
    pub fn new(records: Vec<DetectionRecord>) -> Self {
        Self { records }
    }

    /// Stub that never detects anything.
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl Detector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect_frame(&self, _frame: &Frame) -> MediaResult<Vec<DetectionRecord>> {
        Ok(self.records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame {
            index: 0,
            width: 2,
            height: 2,
            pixels: vec![0; 12],
        }
    }

    #[test]
    fn test_stub_detector_returns_fixed_records() {
        let record = DetectionRecord::new("person", 0.9, 1.0, 2.0, 3.0, 4.0);
        let stub = StubDetector::new(vec![record.clone()]);
        assert_eq!(stub.name(), "stub");
        assert_eq!(stub.detect_frame(&frame()).unwrap(), vec![record]);
    }

    #[test]
    fn test_empty_stub() {
        let stub = StubDetector::empty();
        assert!(stub.detect_frame(&frame()).unwrap().is_empty());
    }
}
