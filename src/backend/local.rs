//! In-process classifier backend running through ONNX Runtime.
//!
//! The model artifact is loaded once on a background thread; until the
//! warm-up finishes every call reports `BackendUnavailable` and the caller
//! drops the frame and retries on the next tick.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    thread,
    time::Instant,
};

use anyhow::{Context, Result};
use ndarray::Array2;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use crate::{
    config::InferenceMode,
    error::InferError,
    model_fetch::{self, ModelKind},
    types::{FEATURE_LEN, FeatureVector, Prediction},
};

use super::{InferenceBackend, prediction_from_logits};

/// Externally observable warm-up state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Loading,
    Ready,
    Failed,
}

enum Slot {
    NotLoaded,
    Loading,
    Ready(Session),
    Failed,
}

pub struct LocalBackend {
    model_path: PathBuf,
    slot: Arc<Mutex<Slot>>,
}

impl LocalBackend {
    pub fn new(model_path: PathBuf) -> Self {
        LocalBackend {
            model_path,
            slot: Arc::new(Mutex::new(Slot::NotLoaded)),
        }
    }

    /// Kicks off the one-time warm-up. Calling again while loading or
    /// after a successful load is a no-op; a failed load may be retried.
    pub fn warm_up(&self) {
        {
            let Ok(mut slot) = self.slot.lock() else {
                return;
            };
            match *slot {
                Slot::Loading | Slot::Ready(_) => return,
                Slot::NotLoaded | Slot::Failed => *slot = Slot::Loading,
            }
        }

        let model_path = self.model_path.clone();
        let slot = self.slot.clone();
        thread::spawn(move || {
            let loaded = load_session(&model_path);
            let Ok(mut slot) = slot.lock() else {
                return;
            };
            *slot = match loaded {
                Ok(session) => {
                    log::info!("sign classifier ready from {}", model_path.display());
                    Slot::Ready(session)
                }
                Err(err) => {
                    log::error!("failed to load sign classifier: {err:?}");
                    Slot::Failed
                }
            };
        });
    }

    pub fn load_state(&self) -> LoadState {
        match self.slot.lock() {
            Ok(slot) => match *slot {
                Slot::NotLoaded => LoadState::NotLoaded,
                Slot::Loading => LoadState::Loading,
                Slot::Ready(_) => LoadState::Ready,
                Slot::Failed => LoadState::Failed,
            },
            Err(_) => LoadState::Failed,
        }
    }
}

fn load_session(model_path: &PathBuf) -> Result<Session> {
    model_fetch::ensure_model_ready(ModelKind::SignClassifier, model_path, |_evt| {})?;

    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(2)?
        .commit_from_file(model_path)
        .with_context(|| format!("failed to load ORT session from {}", model_path.display()))
}

impl InferenceBackend for LocalBackend {
    fn infer(
        &mut self,
        features: &FeatureVector,
        captured_at: Instant,
    ) -> Result<Prediction, InferError> {
        let Ok(mut slot) = self.slot.lock() else {
            return Err(InferError::BackendUnavailable);
        };
        let Slot::Ready(session) = &mut *slot else {
            return Err(InferError::BackendUnavailable);
        };

        match run_session(session, features, captured_at) {
            Ok(prediction) => Ok(prediction),
            Err(err) => {
                // A faulting session is indistinguishable from a
                // not-yet-usable one for the caller: drop the frame and
                // retry next tick.
                log::warn!("local inference failed: {err:?}");
                Err(InferError::BackendUnavailable)
            }
        }
    }

    fn mode(&self) -> InferenceMode {
        InferenceMode::Local
    }
}

fn run_session(
    session: &mut Session,
    features: &FeatureVector,
    captured_at: Instant,
) -> Result<Prediction> {
    let input = Array2::from_shape_vec((1, FEATURE_LEN), features.as_slice().to_vec())?;
    let tensor = Tensor::from_array(input)?;
    let outputs = session
        .run(ort::inputs![tensor])
        .context("failed to run classifier session")?;

    let logits = outputs[0].try_extract_array::<f32>()?;
    let flattened: Vec<f32> = logits.iter().copied().collect();
    prediction_from_logits(&flattened, captured_at)
}
