//! Mode controller: tracks backend health and degrades the remote mode
//! after repeated network failures.
//!
//! The controller never switches backends on its own. Local and remote use
//! different accuracy/latency tradeoffs the user opted into, so degradation
//! only raises an advisory; changing mode stays an explicit user action
//! (which constructs a fresh pipeline and therefore fresh health state).

use std::time::Instant;

use crate::{
    backend::InferenceBackend,
    config::InferenceMode,
    error::InferError,
    types::{FeatureVector, Prediction},
};

/// Consecutive remote failures before the degraded advisory fires.
pub const REMOTE_ERROR_THRESHOLD: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeHealth {
    pub mode: InferenceMode,
    pub consecutive_remote_errors: u32,
    pub degraded: bool,
}

/// User-visible health transitions surfaced by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeAdvisory {
    /// The remote backend failed `REMOTE_ERROR_THRESHOLD` times in a row.
    RemoteDegraded { consecutive_errors: u32 },
    /// A remote call succeeded after the degraded advisory fired.
    RemoteRecovered,
}

pub struct ModeController {
    backend: Box<dyn InferenceBackend>,
    health: ModeHealth,
}

impl ModeController {
    pub fn new(backend: Box<dyn InferenceBackend>) -> Self {
        let mode = backend.mode();
        ModeController {
            backend,
            health: ModeHealth {
                mode,
                consecutive_remote_errors: 0,
                degraded: false,
            },
        }
    }

    pub fn health(&self) -> ModeHealth {
        self.health
    }

    /// Runs one inference call and folds the outcome into the health
    /// state. Errors are returned for the caller to drop the frame on;
    /// they are never fatal.
    pub fn infer(
        &mut self,
        features: &FeatureVector,
        captured_at: Instant,
    ) -> (Result<Prediction, InferError>, Option<ModeAdvisory>) {
        let result = self.backend.infer(features, captured_at);
        let advisory = match (&result, self.health.mode) {
            (Err(InferError::Network(_)), InferenceMode::Remote) => self.note_remote_failure(),
            (Ok(_), InferenceMode::Remote) => self.note_remote_success(),
            // Local has no network variability: an unavailable backend is
            // retried next frame with no error budget.
            _ => None,
        };
        (result, advisory)
    }

    fn note_remote_failure(&mut self) -> Option<ModeAdvisory> {
        self.health.consecutive_remote_errors += 1;
        if self.health.consecutive_remote_errors == REMOTE_ERROR_THRESHOLD {
            self.health.degraded = true;
            return Some(ModeAdvisory::RemoteDegraded {
                consecutive_errors: self.health.consecutive_remote_errors,
            });
        }
        None
    }

    fn note_remote_success(&mut self) -> Option<ModeAdvisory> {
        let was_degraded = self.health.degraded;
        self.health.consecutive_remote_errors = 0;
        self.health.degraded = false;
        was_degraded.then_some(ModeAdvisory::RemoteRecovered)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};

    use super::*;
    use crate::types::SignLabel;

    struct ScriptedBackend {
        mode: InferenceMode,
        script: VecDeque<Result<(), InferError>>,
    }

    impl ScriptedBackend {
        fn remote(script: Vec<Result<(), InferError>>) -> Self {
            ScriptedBackend {
                mode: InferenceMode::Remote,
                script: script.into(),
            }
        }
    }

    impl InferenceBackend for ScriptedBackend {
        fn infer(
            &mut self,
            _features: &FeatureVector,
            captured_at: Instant,
        ) -> Result<Prediction, InferError> {
            match self.script.pop_front().unwrap() {
                Ok(()) => Ok(Prediction {
                    label: SignLabel::A,
                    confidence: 0.9,
                    distribution: HashMap::new(),
                    timestamp: captured_at,
                }),
                Err(err) => Err(err),
            }
        }

        fn mode(&self) -> InferenceMode {
            self.mode
        }
    }

    fn features() -> FeatureVector {
        FeatureVector::new([0.0; crate::types::FEATURE_LEN])
    }

    fn net_err() -> Result<(), InferError> {
        Err(InferError::Network("boom".into()))
    }

    #[test]
    fn three_consecutive_failures_degrade_remote() {
        let backend = ScriptedBackend::remote(vec![net_err(), net_err(), net_err()]);
        let mut controller = ModeController::new(Box::new(backend));

        let now = Instant::now();
        let (_, first) = controller.infer(&features(), now);
        let (_, second) = controller.infer(&features(), now);
        assert_eq!(first, None);
        assert_eq!(second, None);
        assert!(!controller.health().degraded);

        let (_, third) = controller.infer(&features(), now);
        assert_eq!(
            third,
            Some(ModeAdvisory::RemoteDegraded {
                consecutive_errors: 3
            })
        );
        assert!(controller.health().degraded);
    }

    #[test]
    fn intervening_success_resets_the_error_count() {
        let backend = ScriptedBackend::remote(vec![net_err(), net_err(), Ok(()), net_err()]);
        let mut controller = ModeController::new(Box::new(backend));

        let now = Instant::now();
        controller.infer(&features(), now);
        controller.infer(&features(), now);
        controller.infer(&features(), now);
        assert_eq!(controller.health().consecutive_remote_errors, 0);

        let (_, advisory) = controller.infer(&features(), now);
        assert_eq!(advisory, None);
        assert_eq!(controller.health().consecutive_remote_errors, 1);
    }

    #[test]
    fn success_after_degradation_raises_recovery_advisory() {
        let backend = ScriptedBackend::remote(vec![net_err(), net_err(), net_err(), Ok(())]);
        let mut controller = ModeController::new(Box::new(backend));

        let now = Instant::now();
        for _ in 0..3 {
            controller.infer(&features(), now);
        }
        let (result, advisory) = controller.infer(&features(), now);
        assert!(result.is_ok());
        assert_eq!(advisory, Some(ModeAdvisory::RemoteRecovered));
        assert!(!controller.health().degraded);
    }

    #[test]
    fn local_unavailability_has_no_error_budget() {
        struct AlwaysLoading;
        impl InferenceBackend for AlwaysLoading {
            fn infer(
                &mut self,
                _features: &FeatureVector,
                _captured_at: Instant,
            ) -> Result<Prediction, InferError> {
                Err(InferError::BackendUnavailable)
            }
            fn mode(&self) -> InferenceMode {
                InferenceMode::Local
            }
        }

        let mut controller = ModeController::new(Box::new(AlwaysLoading));
        for _ in 0..10 {
            let (result, advisory) = controller.infer(&features(), Instant::now());
            assert!(matches!(result, Err(InferError::BackendUnavailable)));
            assert_eq!(advisory, None);
        }
        assert!(!controller.health().degraded);
        assert_eq!(controller.health().consecutive_remote_errors, 0);
    }
}
