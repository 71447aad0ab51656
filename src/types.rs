use std::{collections::HashMap, fmt, str::FromStr, time::Instant};

/// Number of tracked points per detected hand (MediaPipe hand convention).
pub const NUM_LANDMARKS: usize = 21;
/// Flattened feature length consumed by the sign classifier.
pub const FEATURE_LEN: usize = NUM_LANDMARKS * 3;

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

/// One tracked 3-D point on a detected hand. `x`/`y` are normalized to
/// [0,1] image space, `z` is depth relative to the wrist.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// All landmarks of one detected hand. A well-formed set has exactly
/// [`NUM_LANDMARKS`] points; the feature normalizer rejects anything else.
#[derive(Clone, Debug)]
pub struct HandLandmarkSet {
    pub points: Vec<Landmark>,
    pub confidence: f32,
}

/// Flattened landmark encoding fed to the classifier:
/// `[x0, y0, z0, x1, y1, z1, ..]`, always [`FEATURE_LEN`] floats.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureVector([f32; FEATURE_LEN]);

impl FeatureVector {
    pub fn new(values: [f32; FEATURE_LEN]) -> Self {
        FeatureVector(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

macro_rules! sign_labels {
    ($($variant:ident),+ $(,)?) => {
        /// The closed label set produced by the classifier: the 26 ASL
        /// alphabet letters, in the class-index order of the model artifact.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum SignLabel {
            $($variant),+
        }

        impl SignLabel {
            pub const ALL: &'static [SignLabel] = &[$(SignLabel::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(SignLabel::$variant => stringify!($variant)),+
                }
            }
        }
    };
}

sign_labels!(
    A, B, C, D, E, F, G, H, I, J, K, L, M, N, O, P, Q, R, S, T, U, V, W, X, Y, Z,
);

impl SignLabel {
    /// Maps a classifier output index to its label. The artifact's classes
    /// are the alphabet in A-Z order.
    pub fn from_class_index(index: usize) -> Option<SignLabel> {
        SignLabel::ALL.get(index).copied()
    }
}

impl FromStr for SignLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        SignLabel::ALL
            .iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(trimmed))
            .copied()
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

impl fmt::Display for SignLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct UnknownLabel(pub String);

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown sign label {:?}", self.0)
    }
}

impl std::error::Error for UnknownLabel {}

/// One successful inference result. Immutable once produced.
#[derive(Clone, Debug)]
pub struct Prediction {
    pub label: SignLabel,
    pub confidence: f32,
    pub distribution: HashMap<SignLabel, f32>,
    /// Capture timestamp of the source frame, not the inference completion.
    pub timestamp: Instant,
}

/// One scored attempt against the active practice target. Append-only;
/// owned by the practice state machine until flushed to the recorder.
#[derive(Clone, Debug)]
pub struct PracticeAttempt {
    pub target: SignLabel,
    pub observed: SignLabel,
    pub confidence: f32,
    pub timestamp: Instant,
    pub correct: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_index_order_is_alphabetical() {
        assert_eq!(SignLabel::from_class_index(0), Some(SignLabel::A));
        assert_eq!(SignLabel::from_class_index(25), Some(SignLabel::Z));
        assert_eq!(SignLabel::from_class_index(26), None);
    }

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!("A".parse::<SignLabel>().unwrap(), SignLabel::A);
        assert_eq!("q".parse::<SignLabel>().unwrap(), SignLabel::Q);
        assert!("del".parse::<SignLabel>().is_err());
    }
}
