//! Single-slot admission gate in front of the inference backend.
//!
//! Frames arriving while a call is in flight, or before the throttle
//! interval has elapsed, are dropped rather than queued: stale landmark
//! data has no value once a newer frame exists, and bounding the in-flight
//! count at one keeps latency and memory bounded.

use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Dropped(DropReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The throttle interval since the last accepted call has not elapsed.
    Throttled,
    /// A previous inference call has not completed yet.
    InFlight,
}

/// Owns the admission state outright instead of scattering an
/// "already processing" flag and a "last call time" marker across
/// callbacks. Mutated only at `try_admit` and `complete`.
#[derive(Debug)]
pub struct AdmissionController {
    throttle_interval: Duration,
    last_accepted: Option<Instant>,
    in_flight: bool,
}

impl AdmissionController {
    pub fn new(throttle_interval: Duration) -> Self {
        AdmissionController {
            throttle_interval,
            last_accepted: None,
            in_flight: false,
        }
    }

    /// Claims the single admission slot if both gate conditions hold.
    /// An accepted call must be balanced with `complete()`.
    pub fn try_admit(&mut self, now: Instant) -> Admission {
        if self.in_flight {
            return Admission::Dropped(DropReason::InFlight);
        }
        if let Some(last) = self.last_accepted {
            if now.duration_since(last) < self.throttle_interval {
                return Admission::Dropped(DropReason::Throttled);
            }
        }

        self.last_accepted = Some(now);
        self.in_flight = true;
        Admission::Accepted
    }

    /// Releases the in-flight slot after the inference call finished,
    /// successfully or not.
    pub fn complete(&mut self) {
        self.in_flight = false;
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }
}
