use std::time::Duration;

/// Which inference backend the user opted into. Never auto-switched; the
/// two backends trade accuracy and latency differently and changing is an
/// explicit user action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InferenceMode {
    Local,
    Remote,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureResolution {
    pub width: u32,
    pub height: u32,
}

impl CaptureResolution {
    pub const QVGA: CaptureResolution = CaptureResolution {
        width: 320,
        height: 240,
    };
    pub const VGA: CaptureResolution = CaptureResolution {
        width: 640,
        height: 480,
    };
}

/// Named presets trading latency for CPU/network cost. Each fixes the
/// throttle interval, capture frame rate, resolution and minimum
/// confidence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PerformanceMode {
    MaxPerformance,
    Balanced,
    BatterySaver,
}

/// Immutable settings injected at pipeline construction. Changing any of
/// these tears down the pipeline and builds a new one; a running loop is
/// never hot-patched.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub mode: InferenceMode,
    pub capture_resolution: CaptureResolution,
    pub capture_frame_rate: u32,
    pub throttle_interval_ms: u64,
    pub min_confidence: f32,
    /// Consecutive correct predictions required to mark a target mastered.
    pub mastery_goal: u32,
    /// Minimum spacing between recorder writes for one target.
    pub record_interval_ms: u64,
    /// Endpoint of the hosted model; required for `InferenceMode::Remote`.
    pub remote_endpoint: Option<String>,
}

impl PipelineSettings {
    pub fn preset(mode: PerformanceMode) -> Self {
        match mode {
            PerformanceMode::MaxPerformance => PipelineSettings {
                throttle_interval_ms: 100,
                capture_frame_rate: 30,
                capture_resolution: CaptureResolution::VGA,
                min_confidence: 0.7,
                ..PipelineSettings::default()
            },
            PerformanceMode::Balanced => PipelineSettings::default(),
            PerformanceMode::BatterySaver => PipelineSettings {
                throttle_interval_ms: 500,
                capture_frame_rate: 15,
                capture_resolution: CaptureResolution::QVGA,
                ..PipelineSettings::default()
            },
        }
    }

    pub fn with_mode(mut self, mode: InferenceMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_remote_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.remote_endpoint = Some(endpoint.into());
        self
    }

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_interval_ms)
    }

    pub fn record_interval(&self) -> Duration {
        Duration::from_millis(self.record_interval_ms)
    }
}

impl Default for PipelineSettings {
    /// The balanced profile: 250ms throttle, 30fps VGA capture, 0.8
    /// minimum confidence.
    fn default() -> Self {
        PipelineSettings {
            mode: InferenceMode::Local,
            capture_resolution: CaptureResolution::VGA,
            capture_frame_rate: 30,
            throttle_interval_ms: 250,
            min_confidence: 0.8,
            mastery_goal: 10,
            record_interval_ms: 1_000,
            remote_endpoint: None,
        }
    }
}
