//! Real-time ASL alphabet recognition and practice pipeline.
//!
//! Capture feeds a single recognition worker through a bounded channel;
//! the worker extracts hand landmarks, flattens them into the classifier's
//! feature vector, runs one throttled inference at a time against the
//! configured backend, and scores the predictions through a practice
//! state machine.

pub mod admission;
pub mod backend;
#[cfg(feature = "camera-nokhwa")]
pub mod capture;
pub mod config;
pub mod error;
pub mod extractor;
pub mod features;
pub mod mode;
pub mod model_fetch;
pub mod pipeline;
pub mod practice;
pub mod recorder;
pub mod types;

pub use config::{InferenceMode, PerformanceMode, PipelineSettings};
pub use pipeline::{PipelineEvent, PipelineHandle};
pub use practice::{
    ChallengeConfig, MasteryConfig, MasteryStatus, MasteryTracker, PracticeEvent, PracticeSession,
    TimedChallenge,
};
pub use types::{Frame, HandLandmarkSet, Landmark, Prediction, SignLabel};
