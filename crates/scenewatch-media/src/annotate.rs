//! Annotated image rendering.

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};

use scenewatch_models::DetectionRecord;

use crate::error::{MediaError, MediaResult};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: u32 = 2;

/// Draw detection boxes on the image at `src` and write the result next to
/// it as `annotated_<name>`. Returns the output path.
pub async fn annotate_image(
    src: impl AsRef<Path>,
    detections: &[DetectionRecord],
) -> MediaResult<PathBuf> {
    let src = src.as_ref().to_path_buf();
    let detections = detections.to_vec();

    tokio::task::spawn_blocking(move || {
        let mut img = image::open(&src)
            .map_err(|e| {
                MediaError::invalid_input(format!(
                    "'{}' does not decode as an image: {e}",
                    src.display()
                ))
            })?
            .to_rgb8();

        for det in &detections {
            draw_box(&mut img, det);
        }

        let file_name = src
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());
        let out = src.with_file_name(format!("annotated_{file_name}"));
        img.save(&out)
            .map_err(|e| MediaError::internal(format!("failed to save annotated image: {e}")))?;
        Ok(out)
    })
    .await
    .map_err(|e| MediaError::internal(format!("annotation task failed: {e}")))?
}

/// Draw one rectangle border, clamped to the image bounds.
fn draw_box(img: &mut RgbImage, det: &DetectionRecord) {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return;
    }

    let x_min = (det.x_min.max(0.0) as u32).min(w - 1);
    let y_min = (det.y_min.max(0.0) as u32).min(h - 1);
    let x_max = (det.x_max.max(0.0) as u32).min(w - 1);
    let y_max = (det.y_max.max(0.0) as u32).min(h - 1);
    if x_min >= x_max || y_min >= y_max {
        return;
    }

    for t in 0..BOX_THICKNESS {
        let top = (y_min + t).min(h - 1);
        let bottom = y_max.saturating_sub(t);
        for x in x_min..=x_max {
            img.put_pixel(x, top, BOX_COLOR);
            img.put_pixel(x, bottom, BOX_COLOR);
        }

        let left = (x_min + t).min(w - 1);
        let right = x_max.saturating_sub(t);
        for y in y_min..=y_max {
            img.put_pixel(left, y, BOX_COLOR);
            img.put_pixel(right, y, BOX_COLOR);
        }
    }
}
