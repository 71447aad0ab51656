//! Durable practice-session logging behind a throttled, fire-and-forget
//! boundary. Practice correctness never blocks on persistence: failures
//! are logged and the attempt is dropped.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Serialize;

use crate::types::{PracticeAttempt, SignLabel};

/// Collaborator boundary toward the persistence API.
pub trait SessionRecorder: Send {
    fn record(&mut self, attempt: &PracticeAttempt) -> Result<()>;
}

impl SessionRecorder for Box<dyn SessionRecorder> {
    fn record(&mut self, attempt: &PracticeAttempt) -> Result<()> {
        (**self).record(attempt)
    }
}

/// Forwards at most one write per `(target, interval)` window to bound
/// write volume, no matter how many attempts the loop produces.
pub struct ThrottledRecorder<R> {
    inner: R,
    interval: Duration,
    last_sent: HashMap<SignLabel, Instant>,
}

impl<R: SessionRecorder> ThrottledRecorder<R> {
    pub fn new(inner: R, interval: Duration) -> Self {
        ThrottledRecorder {
            inner,
            interval,
            last_sent: HashMap::new(),
        }
    }

    /// Records the attempt if its target's window has elapsed. Recorder
    /// failures are swallowed here; only the log sees them.
    pub fn record(&mut self, attempt: &PracticeAttempt, now: Instant) {
        if let Some(last) = self.last_sent.get(&attempt.target) {
            if now.duration_since(*last) < self.interval {
                return;
            }
        }
        self.last_sent.insert(attempt.target, now);

        if let Err(err) = self.inner.record(attempt) {
            log::warn!("failed to record practice attempt: {err:?}");
        }
    }

    /// Records regardless of the window; used for terminal progress
    /// updates (mastery) that must not be thinned away.
    pub fn record_now(&mut self, attempt: &PracticeAttempt, now: Instant) {
        self.last_sent.insert(attempt.target, now);
        if let Err(err) = self.inner.record(attempt) {
            log::warn!("failed to record practice attempt: {err:?}");
        }
    }
}

#[derive(Serialize)]
struct SessionPayload<'a> {
    sign_detected: &'a str,
    confidence: f32,
    is_correct: bool,
}

/// Posts attempts to the progress API's practice-session endpoint.
pub struct HttpRecorder {
    client: Client,
    endpoint: String,
}

impl HttpRecorder {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("failed to build HTTP client for session recording")?;
        Ok(HttpRecorder {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl SessionRecorder for HttpRecorder {
    fn record(&mut self, attempt: &PracticeAttempt) -> Result<()> {
        let payload = SessionPayload {
            sign_detected: attempt.observed.as_str(),
            confidence: attempt.confidence,
            is_correct: attempt.correct,
        };
        self.client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .context("failed to send practice session")?
            .error_for_status()
            .context("practice session write rejected")?;
        Ok(())
    }
}

/// Recorder that keeps attempts in memory; used in tests and when no
/// persistence API is configured.
#[derive(Default)]
pub struct MemoryRecorder {
    pub attempts: Vec<PracticeAttempt>,
}

impl SessionRecorder for MemoryRecorder {
    fn record(&mut self, attempt: &PracticeAttempt) -> Result<()> {
        self.attempts.push(attempt.clone());
        Ok(())
    }
}
