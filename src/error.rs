use thiserror::Error;

use crate::types::NUM_LANDMARKS;

/// Failures while acquiring the camera. Only `PermissionDenied` is fatal to
/// the pipeline; everything else is reported once and the feature is
/// unavailable rather than crashing.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("camera device error: {0}")]
    Device(anyhow::Error),
}

impl CaptureError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, CaptureError::PermissionDenied(_))
    }
}

/// Rejections from the feature normalizer. The caller skips the frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeatureError {
    #[error("malformed landmark set: got {got} points, need {NUM_LANDMARKS}")]
    MalformedLandmarks { got: usize },
}

/// Failures from an inference backend. Both variants are handled by
/// dropping the current frame; neither ever halts the loop.
#[derive(Debug, Error)]
pub enum InferError {
    /// Local model artifact has not finished loading yet. Retried on the
    /// next frame with no error budget.
    #[error("sign classifier is not ready yet")]
    BackendUnavailable,
    /// Remote call failed: transport error, non-2xx status, or a response
    /// body that does not parse into a prediction. Counts toward remote
    /// degradation.
    #[error("remote inference failed: {0}")]
    Network(String),
}
