//! Practice state machines: the mastery streak tracker and the
//! timed-challenge variant.
//!
//! Both are pure state machines over injected `Instant`s. The pipeline
//! worker feeds them accepted predictions and periodic `tick`s; they hand
//! back attempts for the recorder and events for the UI.

use std::time::{Duration, Instant};

use crate::types::{PracticeAttempt, Prediction, SignLabel};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MasteryStatus {
    NotStarted,
    InProgress,
    Mastered,
    Abandoned,
}

impl MasteryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MasteryStatus::Mastered | MasteryStatus::Abandoned)
    }
}

/// Progress against one target sign. Total counters are monotonic; only
/// the streak resets.
#[derive(Clone, Debug, PartialEq)]
pub struct MasterySession {
    pub target: SignLabel,
    pub consecutive_correct: u32,
    pub total_attempts: u32,
    pub total_correct: u32,
    pub status: MasteryStatus,
}

#[derive(Clone, Copy, Debug)]
pub struct MasteryConfig {
    /// Consecutive correct, sufficiently confident predictions required.
    pub mastery_goal: u32,
    pub min_confidence: f32,
}

impl Default for MasteryConfig {
    fn default() -> Self {
        MasteryConfig {
            mastery_goal: 10,
            min_confidence: 0.8,
        }
    }
}

/// Side effects emitted by the practice machines.
#[derive(Clone, Debug, PartialEq)]
pub enum PracticeEvent {
    /// The mastery goal was reached; the session is terminal.
    Mastered { session: MasterySession },
    /// No correct match arrived in time; show the canonical reference for
    /// the target.
    HintShown { target: SignLabel },
    /// The challenge moved past `completed`, by match or by timeout.
    Advanced {
        completed: SignLabel,
        matched: bool,
        next: Option<SignLabel>,
    },
    ChallengeFinished { summary: ChallengeSummary },
}

/// Tracks a streak toward mastery of a single target.
pub struct MasteryTracker {
    config: MasteryConfig,
    session: MasterySession,
}

impl MasteryTracker {
    pub fn new(target: SignLabel, config: MasteryConfig) -> Self {
        MasteryTracker {
            config,
            session: MasterySession {
                target,
                consecutive_correct: 0,
                total_attempts: 0,
                total_correct: 0,
                status: MasteryStatus::NotStarted,
            },
        }
    }

    pub fn session(&self) -> &MasterySession {
        &self.session
    }

    /// Scores one accepted prediction. Every miss zeroes the streak; a
    /// correct prediction below the confidence floor is a miss.
    ///
    /// Returns `None` once the session is terminal.
    pub fn observe(
        &mut self,
        prediction: &Prediction,
    ) -> Option<(PracticeAttempt, Vec<PracticeEvent>)> {
        if self.session.status.is_terminal() {
            return None;
        }
        self.session.status = MasteryStatus::InProgress;
        self.session.total_attempts += 1;

        let correct = prediction.label == self.session.target
            && prediction.confidence >= self.config.min_confidence;

        let mut events = Vec::new();
        if correct {
            self.session.total_correct += 1;
            self.session.consecutive_correct += 1;
            if self.session.consecutive_correct >= self.config.mastery_goal {
                self.session.status = MasteryStatus::Mastered;
                events.push(PracticeEvent::Mastered {
                    session: self.session.clone(),
                });
            }
        } else {
            self.session.consecutive_correct = 0;
        }

        let attempt = PracticeAttempt {
            target: self.session.target,
            observed: prediction.label,
            confidence: prediction.confidence,
            timestamp: prediction.timestamp,
            correct,
        };
        Some((attempt, events))
    }

    /// User walked away before mastering; terminal unless already mastered.
    pub fn abandon(&mut self) {
        if !self.session.status.is_terminal() {
            self.session.status = MasteryStatus::Abandoned;
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ChallengeConfig {
    /// Deadline for a correct match after entering a target.
    pub letter_timeout: Duration,
    /// How long the hint stays up before the forced advance.
    pub hint_display: Duration,
    pub min_confidence: f32,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        ChallengeConfig {
            letter_timeout: Duration::from_secs(10),
            hint_display: Duration::from_secs(3),
            min_confidence: 0.8,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChallengeSummary {
    pub total_targets: u32,
    pub matched: u32,
    /// Targets force-advanced past after the hint window: attempted but
    /// not mastered.
    pub timed_out: u32,
}

/// Phase of the active target. This enum is the transition lock: while
/// `Hinting`, observations are ignored and only the hint deadline can
/// advance the machine, so re-entrant advances cannot happen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ChallengePhase {
    Prompting { entered_at: Instant },
    Hinting { until: Instant },
    Finished,
}

/// Runs an ordered sequence of targets under per-target deadlines. Forward
/// progress is guaranteed even under adversarial input (camera pointed
/// away): the wall-clock `tick` alone drives hint and advance.
pub struct TimedChallenge {
    config: ChallengeConfig,
    targets: Vec<SignLabel>,
    index: usize,
    phase: ChallengePhase,
    matched: u32,
    timed_out: u32,
}

impl TimedChallenge {
    pub fn new(targets: Vec<SignLabel>, config: ChallengeConfig, now: Instant) -> Self {
        let phase = if targets.is_empty() {
            ChallengePhase::Finished
        } else {
            ChallengePhase::Prompting { entered_at: now }
        };
        TimedChallenge {
            config,
            targets,
            index: 0,
            phase,
            matched: 0,
            timed_out: 0,
        }
    }

    pub fn current_target(&self) -> Option<SignLabel> {
        if self.phase == ChallengePhase::Finished {
            return None;
        }
        self.targets.get(self.index).copied()
    }

    pub fn is_finished(&self) -> bool {
        self.phase == ChallengePhase::Finished
    }

    pub fn summary(&self) -> ChallengeSummary {
        ChallengeSummary {
            total_targets: self.targets.len() as u32,
            matched: self.matched,
            timed_out: self.timed_out,
        }
    }

    /// Scores one accepted prediction against the active target. A correct
    /// match advances immediately; during the hint window all matches are
    /// ignored.
    pub fn observe(
        &mut self,
        prediction: &Prediction,
    ) -> (Option<PracticeAttempt>, Vec<PracticeEvent>) {
        let ChallengePhase::Prompting { .. } = self.phase else {
            return (None, Vec::new());
        };
        let Some(target) = self.targets.get(self.index).copied() else {
            return (None, Vec::new());
        };

        let correct = prediction.label == target
            && prediction.confidence >= self.config.min_confidence;
        let attempt = PracticeAttempt {
            target,
            observed: prediction.label,
            confidence: prediction.confidence,
            timestamp: prediction.timestamp,
            correct,
        };

        let events = if correct {
            self.advance(true, prediction.timestamp)
        } else {
            Vec::new()
        };
        (Some(attempt), events)
    }

    /// Advances the wall clock. Must be called even when no predictions
    /// arrive; deadlines are independent of inference throughput.
    pub fn tick(&mut self, now: Instant) -> Vec<PracticeEvent> {
        match self.phase {
            ChallengePhase::Prompting { entered_at }
                if now.duration_since(entered_at) >= self.config.letter_timeout =>
            {
                let target = self.targets[self.index];
                self.phase = ChallengePhase::Hinting {
                    until: now + self.config.hint_display,
                };
                vec![PracticeEvent::HintShown { target }]
            }
            ChallengePhase::Hinting { until } if now >= until => self.advance(false, now),
            _ => Vec::new(),
        }
    }

    fn advance(&mut self, matched: bool, now: Instant) -> Vec<PracticeEvent> {
        let completed = self.targets[self.index];
        if matched {
            self.matched += 1;
        } else {
            self.timed_out += 1;
        }
        self.index += 1;

        let next = self.targets.get(self.index).copied();
        let mut events = vec![PracticeEvent::Advanced {
            completed,
            matched,
            next,
        }];
        match next {
            Some(_) => self.phase = ChallengePhase::Prompting { entered_at: now },
            None => {
                self.phase = ChallengePhase::Finished;
                events.push(PracticeEvent::ChallengeFinished {
                    summary: self.summary(),
                });
            }
        }
        events
    }
}

/// The two practice variants behind one surface for the pipeline worker.
pub enum PracticeSession {
    Mastery(MasteryTracker),
    Challenge(TimedChallenge),
}

impl PracticeSession {
    pub fn observe(
        &mut self,
        prediction: &Prediction,
    ) -> (Option<PracticeAttempt>, Vec<PracticeEvent>) {
        match self {
            PracticeSession::Mastery(tracker) => match tracker.observe(prediction) {
                Some((attempt, events)) => (Some(attempt), events),
                None => (None, Vec::new()),
            },
            PracticeSession::Challenge(challenge) => challenge.observe(prediction),
        }
    }

    pub fn tick(&mut self, now: Instant) -> Vec<PracticeEvent> {
        match self {
            // The untimed variant has no deadlines.
            PracticeSession::Mastery(_) => Vec::new(),
            PracticeSession::Challenge(challenge) => challenge.tick(now),
        }
    }

    pub fn is_finished(&self) -> bool {
        match self {
            PracticeSession::Mastery(tracker) => tracker.session().status.is_terminal(),
            PracticeSession::Challenge(challenge) => challenge.is_finished(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn prediction(label: SignLabel, confidence: f32, at: Instant) -> Prediction {
        Prediction {
            label,
            confidence,
            distribution: HashMap::new(),
            timestamp: at,
        }
    }

    fn config() -> MasteryConfig {
        MasteryConfig {
            mastery_goal: 10,
            min_confidence: 0.8,
        }
    }

    #[test]
    fn ten_consecutive_correct_predictions_master_the_target() {
        let mut tracker = MasteryTracker::new(SignLabel::A, config());
        assert_eq!(tracker.session().status, MasteryStatus::NotStarted);

        let now = Instant::now();
        let mut mastered = Vec::new();
        for _ in 0..10 {
            let (_, events) = tracker.observe(&prediction(SignLabel::A, 0.85, now)).unwrap();
            mastered.extend(events);
        }

        let session = tracker.session();
        assert_eq!(session.status, MasteryStatus::Mastered);
        assert_eq!(session.total_attempts, 10);
        assert_eq!(session.total_correct, 10);
        assert_eq!(mastered.len(), 1);
        assert!(matches!(mastered[0], PracticeEvent::Mastered { .. }));
    }

    #[test]
    fn any_miss_zeroes_the_streak_but_not_the_totals() {
        let mut tracker = MasteryTracker::new(SignLabel::A, config());
        let now = Instant::now();

        for _ in 0..9 {
            tracker.observe(&prediction(SignLabel::A, 0.9, now)).unwrap();
        }
        assert_eq!(tracker.session().consecutive_correct, 9);

        let (attempt, events) = tracker.observe(&prediction(SignLabel::B, 0.9, now)).unwrap();
        assert!(!attempt.correct);
        assert!(events.is_empty());

        let session = tracker.session();
        assert_eq!(session.consecutive_correct, 0);
        assert_eq!(session.status, MasteryStatus::InProgress);
        assert_eq!(session.total_attempts, 10);
        assert_eq!(session.total_correct, 9);
    }

    #[test]
    fn low_confidence_match_counts_as_a_miss() {
        let mut tracker = MasteryTracker::new(SignLabel::A, config());
        let now = Instant::now();

        tracker.observe(&prediction(SignLabel::A, 0.9, now)).unwrap();
        let (attempt, _) = tracker.observe(&prediction(SignLabel::A, 0.79, now)).unwrap();
        assert!(!attempt.correct);
        assert_eq!(tracker.session().consecutive_correct, 0);
    }

    #[test]
    fn terminal_sessions_ignore_further_predictions() {
        let mut tracker = MasteryTracker::new(SignLabel::A, MasteryConfig {
            mastery_goal: 1,
            min_confidence: 0.5,
        });
        let now = Instant::now();
        tracker.observe(&prediction(SignLabel::A, 0.9, now)).unwrap();
        assert_eq!(tracker.session().status, MasteryStatus::Mastered);

        assert!(tracker.observe(&prediction(SignLabel::A, 0.9, now)).is_none());
        assert_eq!(tracker.session().total_attempts, 1);
    }

    #[test]
    fn abandoning_an_in_progress_session_is_terminal() {
        let mut tracker = MasteryTracker::new(SignLabel::A, config());
        tracker
            .observe(&prediction(SignLabel::B, 0.9, Instant::now()))
            .unwrap();
        tracker.abandon();
        assert_eq!(tracker.session().status, MasteryStatus::Abandoned);
        assert!(tracker
            .observe(&prediction(SignLabel::A, 0.9, Instant::now()))
            .is_none());
    }

    fn challenge_config() -> ChallengeConfig {
        ChallengeConfig {
            letter_timeout: Duration::from_secs(10),
            hint_display: Duration::from_secs(3),
            min_confidence: 0.8,
        }
    }

    #[test]
    fn timeout_shows_hint_then_force_advances() {
        let t0 = Instant::now();
        let mut challenge = TimedChallenge::new(
            vec![SignLabel::A, SignLabel::B],
            challenge_config(),
            t0,
        );

        // Nothing fires before the deadline.
        assert!(challenge.tick(t0 + Duration::from_secs(9)).is_empty());

        let events = challenge.tick(t0 + Duration::from_secs(10));
        assert_eq!(
            events,
            vec![PracticeEvent::HintShown {
                target: SignLabel::A
            }]
        );

        // Matches during the hint window are ignored; only the clock can
        // advance the machine.
        let during_hint = t0 + Duration::from_secs(11);
        let (attempt, events) = challenge.observe(&prediction(SignLabel::A, 0.95, during_hint));
        assert!(attempt.is_none());
        assert!(events.is_empty());

        let events = challenge.tick(t0 + Duration::from_secs(13));
        assert_eq!(
            events,
            vec![PracticeEvent::Advanced {
                completed: SignLabel::A,
                matched: false,
                next: Some(SignLabel::B),
            }]
        );
        assert_eq!(challenge.current_target(), Some(SignLabel::B));
        assert_eq!(challenge.summary().timed_out, 1);
    }

    #[test]
    fn correct_match_advances_before_the_deadline() {
        let t0 = Instant::now();
        let mut challenge = TimedChallenge::new(
            vec![SignLabel::A, SignLabel::B],
            challenge_config(),
            t0,
        );

        let (attempt, events) =
            challenge.observe(&prediction(SignLabel::A, 0.9, t0 + Duration::from_secs(2)));
        assert!(attempt.unwrap().correct);
        assert_eq!(
            events,
            vec![PracticeEvent::Advanced {
                completed: SignLabel::A,
                matched: true,
                next: Some(SignLabel::B),
            }]
        );

        // The next target gets a fresh deadline from the advance time.
        assert!(challenge.tick(t0 + Duration::from_secs(11)).is_empty());
        let events = challenge.tick(t0 + Duration::from_secs(12));
        assert_eq!(
            events,
            vec![PracticeEvent::HintShown {
                target: SignLabel::B
            }]
        );
    }

    #[test]
    fn final_advance_emits_the_summary() {
        let t0 = Instant::now();
        let mut challenge = TimedChallenge::new(vec![SignLabel::A], challenge_config(), t0);

        let (_, events) = challenge.observe(&prediction(SignLabel::A, 0.9, t0));
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            PracticeEvent::ChallengeFinished {
                summary: ChallengeSummary {
                    total_targets: 1,
                    matched: 1,
                    timed_out: 0,
                }
            }
        );
        assert!(challenge.is_finished());
        assert_eq!(challenge.current_target(), None);
    }

    #[test]
    fn wrong_sign_does_not_advance_but_is_recorded() {
        let t0 = Instant::now();
        let mut challenge = TimedChallenge::new(vec![SignLabel::A], challenge_config(), t0);

        let (attempt, events) = challenge.observe(&prediction(SignLabel::B, 0.9, t0));
        let attempt = attempt.unwrap();
        assert!(!attempt.correct);
        assert_eq!(attempt.observed, SignLabel::B);
        assert!(events.is_empty());
        assert_eq!(challenge.current_target(), Some(SignLabel::A));
    }
}
