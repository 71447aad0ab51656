//! Inference backends behind one interface.
//!
//! The mode and admission controllers are written once against
//! [`InferenceBackend`]; `local` runs the classifier in-process through ONNX
//! Runtime, `remote` calls the hosted model over HTTP.

pub mod local;
pub mod remote;

pub use local::{LoadState, LocalBackend};
pub use remote::RemoteBackend;

use std::{collections::HashMap, time::Instant};

use anyhow::{Result, anyhow};

use crate::{
    config::InferenceMode,
    error::InferError,
    types::{FeatureVector, Prediction, SignLabel},
};

/// One inference call: a 63-float feature vector in, a prediction out.
///
/// Failures are always recoverable from the caller's point of view: the
/// current frame is dropped and the loop continues.
pub trait InferenceBackend: Send {
    fn infer(
        &mut self,
        features: &FeatureVector,
        captured_at: Instant,
    ) -> Result<Prediction, InferError>;

    fn mode(&self) -> InferenceMode;
}

/// Turns raw classifier logits into a prediction: softmax over the closed
/// label set, argmax for the winning label.
pub(crate) fn prediction_from_logits(logits: &[f32], captured_at: Instant) -> Result<Prediction> {
    let class_count = SignLabel::ALL.len();
    if logits.len() < class_count {
        return Err(anyhow!(
            "classifier returned {} logits, need {class_count}",
            logits.len()
        ));
    }
    let logits = &logits[..class_count];

    // Stabilized softmax, as the deployed model server computes it.
    let max_logit = logits.iter().copied().fold(f32::MIN, f32::max);
    let exp: Vec<f32> = logits.iter().map(|l| (l - max_logit).exp()).collect();
    let sum: f32 = exp.iter().sum();
    if sum <= 0.0 || !sum.is_finite() {
        return Err(anyhow!("classifier logits do not form a distribution"));
    }

    let mut distribution = HashMap::with_capacity(class_count);
    let mut best = (0usize, f32::MIN);
    for (idx, value) in exp.iter().enumerate() {
        let probability = value / sum;
        if let Some(label) = SignLabel::from_class_index(idx) {
            distribution.insert(label, probability);
        }
        if probability > best.1 {
            best = (idx, probability);
        }
    }

    let label = SignLabel::from_class_index(best.0)
        .ok_or_else(|| anyhow!("argmax index {} outside the label set", best.0))?;

    Ok(Prediction {
        label,
        confidence: best.1.clamp(0.0, 1.0),
        distribution,
        timestamp: captured_at,
    })
}
