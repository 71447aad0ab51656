//! Hosted-model backend: one HTTP round trip per admitted feature vector.

use std::{collections::HashMap, time::Duration, time::Instant};

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::{
    config::InferenceMode,
    error::InferError,
    types::{FeatureVector, Prediction, SignLabel},
};

use super::InferenceBackend;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Wire shape of the hosted model's response. The deployed server names
/// the winning label `sign`.
#[derive(Debug, Deserialize)]
struct RemotePrediction {
    #[serde(alias = "sign")]
    label: String,
    confidence: f32,
    #[serde(default)]
    probabilities: HashMap<String, f32>,
}

pub struct RemoteBackend {
    client: Client,
    endpoint: String,
}

impl RemoteBackend {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client for remote inference")?;
        Ok(RemoteBackend {
            client,
            endpoint: endpoint.into(),
        })
    }

    fn request(&self, features: &FeatureVector) -> Result<RemotePrediction, InferError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&features.as_slice())
            .send()
            .map_err(|err| InferError::Network(err.to_string()))?
            .error_for_status()
            .map_err(|err| InferError::Network(err.to_string()))?;

        response
            .json::<RemotePrediction>()
            .map_err(|err| InferError::Network(format!("malformed prediction body: {err}")))
    }
}

impl InferenceBackend for RemoteBackend {
    fn infer(
        &mut self,
        features: &FeatureVector,
        captured_at: Instant,
    ) -> Result<Prediction, InferError> {
        let raw = self.request(features)?;
        parse_prediction(raw, captured_at)
    }

    fn mode(&self) -> InferenceMode {
        InferenceMode::Remote
    }
}

fn parse_prediction(raw: RemotePrediction, captured_at: Instant) -> Result<Prediction, InferError> {
    let label: SignLabel = raw
        .label
        .parse()
        .map_err(|err| InferError::Network(format!("{err}")))?;

    // Entries outside the alphabet (the artifact also knows "del" and
    // "space") are not part of the practice label set; skip them.
    let distribution = raw
        .probabilities
        .into_iter()
        .filter_map(|(name, probability)| {
            name.parse::<SignLabel>()
                .ok()
                .map(|label| (label, probability))
        })
        .collect();

    Ok(Prediction {
        label,
        confidence: raw.confidence.clamp(0.0, 1.0),
        distribution,
        timestamp: captured_at,
    })
}
