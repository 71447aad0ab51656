//! Camera capture thread feeding the recognition pipeline.
//!
//! Frames are pushed into a bounded channel with `try_send`; when the
//! worker is busy the frame is dropped at the channel, which is the
//! pipeline's backpressure policy, not a failure.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};

use anyhow::anyhow;
use crossbeam_channel::Sender;
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraFormat, CameraIndex, CameraInfo, FrameFormat, RequestedFormat,
        RequestedFormatType, Resolution,
    },
};

use crate::{config::PipelineSettings, error::CaptureError, types::Frame};

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: CameraIndex,
    pub label: String,
}

/// Running capture thread. Stopping and dropping both release the device;
/// the pipeline handle owns one of these so camera and worker are torn
/// down together.
#[derive(Debug)]
pub struct CameraStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CameraStream {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn available_cameras() -> Result<Vec<CameraDevice>, CaptureError> {
    let cameras = query(ApiBackend::Auto).map_err(classify_nokhwa_error)?;
    Ok(cameras
        .into_iter()
        .map(|info| CameraDevice {
            index: info.index().clone(),
            label: format_camera_label(&info),
        })
        .collect())
}

fn format_camera_label(info: &CameraInfo) -> String {
    info.human_name()
}

/// Permission refusals are fatal to the feature and must not be retried;
/// nokhwa reports them platform-specifically, so classify by message.
fn classify_nokhwa_error(err: nokhwa::NokhwaError) -> CaptureError {
    let message = err.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("permission") || lowered.contains("denied") || lowered.contains("authoriz")
    {
        CaptureError::PermissionDenied(message)
    } else {
        CaptureError::Device(anyhow!(message))
    }
}

fn requested_formats(settings: &PipelineSettings) -> [RequestedFormat<'static>; 3] {
    let preferred = CameraFormat::new(
        Resolution::new(
            settings.capture_resolution.width,
            settings.capture_resolution.height,
        ),
        FrameFormat::MJPEG,
        settings.capture_frame_rate,
    );
    [
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(preferred)),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

fn build_camera(index: CameraIndex, settings: &PipelineSettings) -> Result<Camera, CaptureError> {
    let mut last_err = None;

    for requested in requested_formats(settings) {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(classify_nokhwa_error(err)),
            },
            Err(err) => last_err = Some(classify_nokhwa_error(err)),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        CaptureError::Device(anyhow!("failed to open camera with any supported format"))
    }))
}

pub fn start_camera_stream(
    index: CameraIndex,
    settings: &PipelineSettings,
    frame_tx: Sender<Frame>,
) -> Result<CameraStream, CaptureError> {
    // Fail fast before spawning the capture thread, so permission refusal
    // surfaces to the caller instead of dying inside the thread.
    build_camera(index.clone(), settings)?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    let settings = settings.clone();

    let handle = thread::spawn(move || {
        let mut camera = match build_camera(index, &settings) {
            Ok(cam) => cam,
            Err(err) => {
                log::error!("failed to open camera: {err:?}");
                return;
            }
        };

        while !stop_flag.load(Ordering::Relaxed) {
            let frame = match camera.frame() {
                Ok(frame) => frame,
                Err(err) => {
                    log::warn!("camera frame read failed: {err:?}");
                    continue;
                }
            };

            let decoded = match frame.decode_image::<RgbFormat>() {
                Ok(img) => img,
                Err(err) => {
                    log::warn!("failed to decode camera frame: {err:?}");
                    continue;
                }
            };

            let (width, height) = decoded.dimensions();
            let rgb = decoded.into_raw();
            if rgb.is_empty() {
                continue;
            }

            // Expand RGB to RGBA for the extractor input.
            let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
            for chunk in rgb.chunks_exact(3) {
                rgba.extend_from_slice(&[chunk[0], chunk[1], chunk[2], 255]);
            }

            let frame = Frame {
                rgba,
                width,
                height,
                timestamp: Instant::now(),
            };

            // Single-slot channel: drop when the worker is busy.
            let _ = frame_tx.try_send(frame);
        }
    });

    Ok(CameraStream {
        stop,
        handle: Some(handle),
    })
}
