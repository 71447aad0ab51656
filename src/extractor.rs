//! Landmark extraction: image frame in, detected hands out.
//!
//! The pipeline consumes this as a black box; the reference implementation
//! runs the MediaPipe handpose estimator through ONNX Runtime with a
//! letterboxed 224x224 input and projects the landmarks back into
//! normalized image space.

use anyhow::{Context, Result, anyhow};
use image::{RgbaImage, imageops::FilterType};
use ndarray::Array4;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use std::path::{Path, PathBuf};

use crate::{
    model_fetch::{self, ModelKind},
    types::{Frame, HandLandmarkSet, Landmark, NUM_LANDMARKS},
};

/// Detects zero or more hands in a frame. No hands is a frequent, valid
/// result, not an error.
pub trait LandmarkExtractor: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<HandLandmarkSet>>;
}

const INPUT_SIZE: u32 = 224;
/// Below this detector score the frame is treated as hand-free.
const MIN_DETECTION_CONFIDENCE: f32 = 0.2;

#[derive(Clone, Debug)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
    orig_w: u32,
    orig_h: u32,
}

pub struct OrtLandmarkExtractor {
    session: Session,
}

impl OrtLandmarkExtractor {
    pub fn new(model_path: &Path) -> Result<Self> {
        model_fetch::ensure_model_ready(ModelKind::HandposeEstimator, model_path, |_evt| {})?;

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| {
                format!("failed to load handpose model from {}", model_path.display())
            })?;
        Ok(OrtLandmarkExtractor { session })
    }

    pub fn with_default_model() -> Result<Self> {
        Self::new(&default_handpose_model_path())
    }
}

pub fn default_handpose_model_path() -> PathBuf {
    model_fetch::default_model_path(ModelKind::HandposeEstimator)
}

impl LandmarkExtractor for OrtLandmarkExtractor {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<HandLandmarkSet>> {
        let (input, letterbox) = prepare_frame(frame)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run handpose session")?;

        if outputs.len() < 1 {
            return Err(anyhow!("handpose model returned no outputs"));
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flattened: Vec<f32> = coords.iter().copied().collect();

        let confidence = if outputs.len() > 1 {
            outputs[1]
                .try_extract_array::<f32>()
                .ok()
                .and_then(|arr| arr.iter().next().copied())
                .unwrap_or(0.0)
                .clamp(0.0, 1.0)
        } else {
            0.0
        };
        if confidence < MIN_DETECTION_CONFIDENCE {
            return Ok(Vec::new());
        }

        let points = decode_landmarks(&flattened, &letterbox)?;
        Ok(vec![HandLandmarkSet { points, confidence }])
    }
}

fn prepare_frame(frame: &Frame) -> Result<(Array4<f32>, Letterbox)> {
    let Some(img) = RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone()) else {
        return Err(anyhow!("failed to build RGBA image from frame"));
    };

    let scale = INPUT_SIZE as f32 / (frame.width.max(frame.height) as f32);
    let new_w = (frame.width as f32 * scale).round().max(1.0) as u32;
    let new_h = (frame.height as f32 * scale).round().max(1.0) as u32;
    let resized = image::imageops::resize(&img, new_w, new_h, FilterType::CatmullRom);

    let pad_x = ((INPUT_SIZE as i64 - new_w as i64) / 2).max(0) as f32;
    let pad_y = ((INPUT_SIZE as i64 - new_h as i64) / 2).max(0) as f32;
    let mut canvas =
        RgbaImage::from_pixel(INPUT_SIZE, INPUT_SIZE, image::Rgba([0u8, 0u8, 0u8, 255u8]));
    image::imageops::overlay(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    let mut input = Array4::<f32>::zeros((1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3));
    for y in 0..INPUT_SIZE {
        for x in 0..INPUT_SIZE {
            let pixel = canvas.get_pixel(x, y).0;
            input[[0, y as usize, x as usize, 0]] = pixel[0] as f32 / 255.0;
            input[[0, y as usize, x as usize, 1]] = pixel[1] as f32 / 255.0;
            input[[0, y as usize, x as usize, 2]] = pixel[2] as f32 / 255.0;
        }
    }

    let letterbox = Letterbox {
        scale,
        pad_x,
        pad_y,
        orig_w: frame.width,
        orig_h: frame.height,
    };
    Ok((input, letterbox))
}

/// Decodes the model's flat landmark tensor (pixel coordinates in the
/// letterboxed input space) into [0,1] image-space points.
fn decode_landmarks(flat: &[f32], letterbox: &Letterbox) -> Result<Vec<Landmark>> {
    if flat.len() < NUM_LANDMARKS * 3 {
        return Err(anyhow!(
            "unexpected landmarks length: got {}, need {}",
            flat.len(),
            NUM_LANDMARKS * 3
        ));
    }

    let w = letterbox.orig_w.max(1) as f32;
    let h = letterbox.orig_h.max(1) as f32;
    let points = flat
        .chunks_exact(3)
        .take(NUM_LANDMARKS)
        .map(|chunk| {
            let px = (chunk[0] - letterbox.pad_x) / letterbox.scale;
            let py = (chunk[1] - letterbox.pad_y) / letterbox.scale;
            Landmark {
                x: (px / w).clamp(0.0, 1.0),
                y: (py / h).clamp(0.0, 1.0),
                // Depth stays relative; scale it like x so hand proportions
                // survive the projection.
                z: chunk[2] / (letterbox.scale * w),
            }
        })
        .collect();
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letterbox_640x480() -> Letterbox {
        // 640x480 -> scale 0.35, 224x168 content, 28px vertical padding.
        Letterbox {
            scale: 0.35,
            pad_x: 0.0,
            pad_y: 28.0,
            orig_w: 640,
            orig_h: 480,
        }
    }

    #[test]
    fn decoded_landmarks_land_in_unit_space() {
        let mut flat = Vec::new();
        for i in 0..NUM_LANDMARKS {
            flat.extend_from_slice(&[i as f32 * 10.0, 28.0 + i as f32 * 7.0, 0.5]);
        }
        let points = decode_landmarks(&flat, &letterbox_640x480()).unwrap();
        assert_eq!(points.len(), NUM_LANDMARKS);
        for point in &points {
            assert!((0.0..=1.0).contains(&point.x));
            assert!((0.0..=1.0).contains(&point.y));
        }
        // First point sits at the top-left of the content area.
        assert_eq!(points[0].x, 0.0);
        assert_eq!(points[0].y, 0.0);
    }

    #[test]
    fn short_tensors_are_rejected() {
        let flat = vec![0.0f32; NUM_LANDMARKS * 3 - 1];
        assert!(decode_landmarks(&flat, &letterbox_640x480()).is_err());
    }
}
