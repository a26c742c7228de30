//! YOLOv8 ONNX detection backend.
//!
//! Uses ONNX Runtime with automatic execution provider selection:
//! - CUDA on Linux with NVIDIA GPU (when the `cuda` feature is enabled)
//! - CoreML on macOS
//! - CPU fallback on all platforms

use std::path::Path;
use std::sync::Mutex;

use image::{DynamicImage, ImageBuffer, Rgb};
use ndarray::Array;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use scenewatch_models::DetectionRecord;

use crate::capture::Frame;
use crate::detector::Detector;
use crate::error::{MediaError, MediaResult};

/// COCO class names (80 classes).
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck",
    "boat", "traffic light", "fire hydrant", "stop sign", "parking meter", "bench",
    "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra",
    "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase", "frisbee",
    "skis", "snowboard", "sports ball", "kite", "baseball bat", "baseball glove",
    "skateboard", "surfboard", "tennis racket", "bottle", "wine glass", "cup",
    "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier",
    "toothbrush",
];

/// Configuration for the YOLOv8 backend.
#[derive(Debug, Clone)]
pub struct YoloV8Config {
    /// Path to the ONNX model file
    pub model_path: String,
    /// Confidence threshold for candidate detections
    pub confidence_threshold: f32,
    /// IoU threshold for NMS
    pub nms_threshold: f32,
    /// Input image size (model expects square input)
    pub input_size: u32,
}

impl Default for YoloV8Config {
    fn default() -> Self {
        Self {
            model_path: "models/yolov8n.onnx".to_string(),
            confidence_threshold: 0.25,
            nms_threshold: 0.45,
            input_size: 640,
        }
    }
}

/// Object detector backed by a YOLOv8 ONNX model.
pub struct YoloV8Detector {
    session: Mutex<Session>,
    config: YoloV8Config,
}

impl YoloV8Detector {
    /// Load the model from `config.model_path`.
    ///
    /// Returns an error if the model file doesn't exist or cannot be loaded.
    pub fn new(config: YoloV8Config) -> MediaResult<Self> {
        let model_path = Path::new(&config.model_path);
        if !model_path.exists() {
            return Err(MediaError::model_not_found(&config.model_path));
        }

        let session = Mutex::new(create_session(model_path)?);
        info!(
            model_path = %config.model_path,
            input_size = config.input_size,
            "object detector initialized"
        );

        Ok(Self { session, config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &YoloV8Config {
        &self.config
    }

    /// Preprocess a frame for inference: resize to the model's square input,
    /// normalize to [0, 1], convert to NCHW.
    fn preprocess(&self, img: &DynamicImage) -> MediaResult<Value> {
        let input_size = self.config.input_size;

        let resized = img.resize_exact(
            input_size,
            input_size,
            image::imageops::FilterType::Triangle,
        );

        let rgb = resized.to_rgb8();
        let (w, h) = (input_size as usize, input_size as usize);

        let mut chw_data: Vec<f32> = Vec::with_capacity(3 * h * w);
        for c in 0..3 {
            for y in 0..h {
                for x in 0..w {
                    let pixel = rgb.get_pixel(x as u32, y as u32);
                    chw_data.push(pixel[c] as f32 / 255.0);
                }
            }
        }

        let shape = vec![1usize, 3, h, w];
        Tensor::from_array((shape, chw_data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| MediaError::internal(format!("failed to create tensor: {e}")))
    }

    fn run_inference(&self, input: Value) -> MediaResult<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::internal("session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::detection(format!("ONNX inference failed: {e}")))?;

        let output = outputs
            .get("output0")
            .ok_or_else(|| MediaError::detection("missing output0 tensor"))?;

        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::detection(format!("failed to extract tensor: {e}")))?;

        Ok(tensor.1.iter().copied().collect())
    }

    /// Normalize YOLOv8 output into detection records.
    ///
    /// The model emits `[1, 84, 8400]`: 4 bbox values (cx, cy, w, h in
    /// model input coordinates) plus 80 class scores per candidate. Boxes
    /// are converted to corner format, scaled to the source resolution and
    /// clamped to the frame.
    fn postprocess(
        &self,
        outputs: &[f32],
        orig_width: u32,
        orig_height: u32,
    ) -> MediaResult<Vec<DetectionRecord>> {
        let num_classes = COCO_CLASSES.len();
        let num_boxes = 8400;
        let num_features = 4 + num_classes;

        if outputs.len() != num_features * num_boxes {
            return Err(MediaError::detection(format!(
                "unexpected output size: expected {}, got {}",
                num_features * num_boxes,
                outputs.len()
            )));
        }

        let output_array = Array::from_shape_vec((num_features, num_boxes), outputs.to_vec())
            .map_err(|e| MediaError::detection(format!("failed to reshape output: {e}")))?;
        let transposed = output_array.t();

        let input_size = self.config.input_size as f32;
        let scale_w = orig_width as f32 / input_size;
        let scale_h = orig_height as f32 / input_size;

        let mut candidates: Vec<DetectionRecord> = Vec::new();
        for i in 0..num_boxes {
            let cx = transposed[[i, 0]];
            let cy = transposed[[i, 1]];
            let w = transposed[[i, 2]];
            let h = transposed[[i, 3]];

            let mut best_class = 0;
            let mut best_score = 0.0f32;
            for c in 0..num_classes {
                let score = transposed[[i, 4 + c]];
                if score > best_score {
                    best_score = score;
                    best_class = c;
                }
            }

            if best_score < self.config.confidence_threshold {
                continue;
            }

            let x_min = ((cx - w / 2.0) * scale_w).clamp(0.0, orig_width as f32);
            let y_min = ((cy - h / 2.0) * scale_h).clamp(0.0, orig_height as f32);
            let x_max = ((cx + w / 2.0) * scale_w).clamp(0.0, orig_width as f32);
            let y_max = ((cy + h / 2.0) * scale_h).clamp(0.0, orig_height as f32);

            // Degenerate after clamping
            if x_min >= x_max || y_min >= y_max {
                continue;
            }

            candidates.push(
                DetectionRecord::new(
                    COCO_CLASSES[best_class],
                    best_score.min(1.0),
                    x_min,
                    y_min,
                    x_max,
                    y_max,
                )
                .with_class_id(best_class as i64),
            );
        }

        Ok(non_maximum_suppression(
            candidates,
            self.config.nms_threshold,
        ))
    }
}

impl Detector for YoloV8Detector {
    fn name(&self) -> &'static str {
        "yolov8"
    }

    fn detect_frame(&self, frame: &Frame) -> MediaResult<Vec<DetectionRecord>> {
        let expected_len = frame.width as usize * frame.height as usize * 3;
        if frame.pixels.len() != expected_len {
            return Err(MediaError::internal(format!(
                "invalid frame data length: expected {}, got {}",
                expected_len,
                frame.pixels.len()
            )));
        }

        let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_raw(frame.width, frame.height, frame.pixels.clone())
                .ok_or_else(|| MediaError::internal("failed to create image buffer"))?;
        let img = DynamicImage::ImageRgb8(buffer);

        let input = self.preprocess(&img)?;
        let outputs = self.run_inference(input)?;
        let detections = self.postprocess(&outputs, frame.width, frame.height)?;

        debug!(
            frame = frame.index,
            count = detections.len(),
            "frame detection completed"
        );

        Ok(detections)
    }
}

/// Remove overlapping same-class detections, keeping the most confident.
fn non_maximum_suppression(
    mut detections: Vec<DetectionRecord>,
    nms_threshold: f32,
) -> Vec<DetectionRecord> {
    if detections.is_empty() {
        return detections;
    }

    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }

        keep.push(detections[i].clone());

        for j in (i + 1)..detections.len() {
            if suppressed[j] || detections[i].class_id != detections[j].class_id {
                continue;
            }
            if compute_iou(&detections[i], &detections[j]) > nms_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Intersection over union of two corner-format boxes.
fn compute_iou(a: &DetectionRecord, b: &DetectionRecord) -> f32 {
    let x1 = a.x_min.max(b.x_min);
    let y1 = a.y_min.max(b.y_min);
    let x2 = a.x_max.min(b.x_max);
    let y2 = a.y_max.min(b.y_max);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = a.width() * a.height();
    let area_b = b.width() * b.height();
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Create an ONNX Runtime session with automatic provider selection.
fn create_session(model_path: &Path) -> MediaResult<Session> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| MediaError::internal(format!("failed to read model file: {e}")))?;

    let mut builder = Session::builder()
        .map_err(|e| MediaError::internal(format!("failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| MediaError::internal(format!("failed to set optimization level: {e}")))?;

    // Try CUDA on Linux with cuda feature
    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!("using CUDA execution provider for object detection");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, trying alternatives");
    }

    // Try CoreML on macOS
    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!("using CoreML execution provider for object detection");
                return Ok(session);
            }
        }
        debug!("CoreML execution provider not available, using CPU");
    }

    info!("using CPU execution provider for object detection");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| MediaError::internal(format!("failed to load ONNX model: {e}")))
}
