//! Detection records.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason a detection record failed validation.
#[derive(Debug, Error, PartialEq)]
pub enum InvalidDetection {
    #[error("confidence {0} outside [0, 1]")]
    Confidence(f32),

    #[error("inverted box: ({x_min}, {y_min}) to ({x_max}, {y_max})")]
    InvertedBox {
        x_min: f32,
        y_min: f32,
        x_max: f32,
        y_max: f32,
    },
}

/// One detected object: class, confidence and a corner-format bounding box
/// in source-resolution pixel coordinates.
///
/// This is the fixed record every model backend normalizes into, and the
/// wire format returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Class label, e.g. "person"
    pub class: String,
    /// Detection confidence in [0, 1]
    pub confidence: f32,
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
    /// Numeric class id where the backend emits one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<i64>,
}

impl DetectionRecord {
    /// Create a record without a numeric class id.
    pub fn new(
        class: impl Into<String>,
        confidence: f32,
        x_min: f32,
        y_min: f32,
        x_max: f32,
        y_max: f32,
    ) -> Self {
        Self {
            class: class.into(),
            confidence,
            x_min,
            y_min,
            x_max,
            y_max,
            class_id: None,
        }
    }

    /// Set the numeric class id.
    pub fn with_class_id(mut self, class_id: i64) -> Self {
        self.class_id = Some(class_id);
        self
    }

    /// Box width in pixels.
    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    /// Box height in pixels.
    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }

    /// Check the record invariants: confidence in [0, 1], corners ordered.
    pub fn validate(&self) -> Result<(), InvalidDetection> {
        if !(0.0..=1.0).contains(&self.confidence) || self.confidence.is_nan() {
            return Err(InvalidDetection::Confidence(self.confidence));
        }
        if self.x_min >= self.x_max || self.y_min >= self.y_max {
            return Err(InvalidDetection::InvertedBox {
                x_min: self.x_min,
                y_min: self.y_min,
                x_max: self.x_max,
                y_max: self.y_max,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_record() {
        let rec = DetectionRecord::new("person", 0.95, 0.1, 0.2, 0.3, 0.4).with_class_id(0);
        assert!(rec.validate().is_ok());
        assert!((rec.width() - 0.2).abs() < 1e-6);
        assert!((rec.height() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_confidence_out_of_range() {
        let rec = DetectionRecord::new("person", 1.2, 0.0, 0.0, 1.0, 1.0);
        assert_eq!(rec.validate(), Err(InvalidDetection::Confidence(1.2)));
    }

    #[test]
    fn test_inverted_box() {
        let rec = DetectionRecord::new("car", 0.8, 5.0, 0.0, 4.0, 1.0);
        assert!(matches!(
            rec.validate(),
            Err(InvalidDetection::InvertedBox { .. })
        ));
    }

    #[test]
    fn test_wire_format_omits_missing_class_id() {
        let rec = DetectionRecord::new("dog", 0.5, 0.0, 0.0, 1.0, 1.0);
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json.get("class_id").is_none());
        assert_eq!(json["class"], "dog");

        let tagged = rec.with_class_id(16);
        let json = serde_json::to_value(&tagged).unwrap();
        assert_eq!(json["class_id"], 16);
    }
}
