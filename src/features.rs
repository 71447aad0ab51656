//! Feature normalizer: flattens one hand's landmarks into the fixed-length
//! vector the sign classifier was trained on.

use crate::{
    error::FeatureError,
    types::{FEATURE_LEN, FeatureVector, HandLandmarkSet, NUM_LANDMARKS},
};

/// Flattens a 21-point landmark set into `[x0, y0, z0, x1, y1, z1, ..]`.
///
/// Pure and deterministic. A set of any other size is rejected with
/// `MalformedLandmarks`; the caller skips the frame rather than crashing
/// the loop. No hand means no vector and no inference call.
pub fn flatten(hand: &HandLandmarkSet) -> Result<FeatureVector, FeatureError> {
    if hand.points.len() != NUM_LANDMARKS {
        return Err(FeatureError::MalformedLandmarks {
            got: hand.points.len(),
        });
    }

    let mut values = [0.0f32; FEATURE_LEN];
    for (i, point) in hand.points.iter().enumerate() {
        values[i * 3] = point.x;
        values[i * 3 + 1] = point.y;
        values[i * 3 + 2] = point.z;
    }
    Ok(FeatureVector::new(values))
}
