//! The recognition worker: the one place where capture, extraction,
//! admission, inference, practice scoring and recording meet.
//!
//! A single worker thread drains the frame channel to the freshest frame
//! and runs the whole per-frame path synchronously, so at most one
//! inference is in flight system-wide and predictions reach the practice
//! machine in capture order. Challenge deadlines are driven by a receive
//! timeout, so they fire even when no frames ever arrive.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::{
    admission::{Admission, AdmissionController},
    backend::InferenceBackend,
    config::PipelineSettings,
    error::InferError,
    extractor::LandmarkExtractor,
    features,
    mode::{ModeAdvisory, ModeController},
    practice::{PracticeEvent, PracticeSession},
    recorder::{SessionRecorder, ThrottledRecorder},
    types::{Frame, Prediction},
};

/// How often the worker wakes to service wall-clock deadlines when no
/// frames arrive.
const IDLE_TICK: Duration = Duration::from_millis(50);

/// Everything the pipeline surfaces to its consumer.
#[derive(Clone, Debug)]
pub enum PipelineEvent {
    Prediction(Prediction),
    Practice(PracticeEvent),
    Advisory(ModeAdvisory),
    /// The local model is still warming up; show a loading indicator.
    BackendLoading,
}

/// Owns every resource of a running pipeline: the stop flag, the worker
/// thread, and (when a camera is attached) the capture stream. Dropping
/// the handle releases all of them together, on every exit path.
pub struct PipelineHandle {
    stop: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
    #[cfg(feature = "camera-nokhwa")]
    camera: Option<crate::capture::CameraStream>,
}

impl PipelineHandle {
    #[cfg(feature = "camera-nokhwa")]
    pub fn attach_camera(&mut self, camera: crate::capture::CameraStream) {
        self.camera = Some(camera);
    }

    pub fn shutdown(self) {
        // Drop runs the teardown.
    }

    fn release(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        #[cfg(feature = "camera-nokhwa")]
        drop(self.camera.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Spawns the worker thread over an already-running frame source.
///
/// The settings value is immutable for the lifetime of the pipeline;
/// changing settings means dropping this handle and starting over.
pub fn start(
    settings: PipelineSettings,
    extractor: Box<dyn LandmarkExtractor>,
    backend: Box<dyn InferenceBackend>,
    practice: PracticeSession,
    recorder: Box<dyn SessionRecorder>,
    frame_rx: Receiver<Frame>,
    event_tx: Sender<PipelineEvent>,
) -> PipelineHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let worker = thread::spawn(move || {
        let mut worker = Worker {
            extractor,
            mode: ModeController::new(backend),
            practice,
            admission: AdmissionController::new(settings.throttle_interval()),
            recorder: ThrottledRecorder::new(recorder, settings.record_interval()),
            event_tx,
            loading_notified: false,
        };
        worker.run(frame_rx, stop_flag);
        log::debug!("pipeline worker stopped");
    });

    PipelineHandle {
        stop,
        worker: Some(worker),
        #[cfg(feature = "camera-nokhwa")]
        camera: None,
    }
}

struct Worker {
    extractor: Box<dyn LandmarkExtractor>,
    mode: ModeController,
    practice: PracticeSession,
    admission: AdmissionController,
    recorder: ThrottledRecorder<Box<dyn SessionRecorder>>,
    event_tx: Sender<PipelineEvent>,
    loading_notified: bool,
}

impl Worker {
    fn run(&mut self, frame_rx: Receiver<Frame>, stop: Arc<AtomicBool>) {
        while !stop.load(Ordering::Relaxed) {
            if !self.service_deadlines(Instant::now()) {
                return;
            }
            if self.practice.is_finished() {
                return;
            }

            let frame = match frame_rx.recv_timeout(IDLE_TICK) {
                Ok(frame) => drain_to_freshest(&frame_rx, frame),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return,
            };

            if !self.process_frame(frame) {
                return;
            }
        }
    }

    /// Fires pending hint/advance transitions. Returns false when the
    /// event consumer went away.
    fn service_deadlines(&mut self, now: Instant) -> bool {
        for event in self.practice.tick(now) {
            if !self.emit(PipelineEvent::Practice(event)) {
                return false;
            }
        }
        true
    }

    /// The per-frame path: extract, normalize, admit, infer, score,
    /// record. Every failure short of a dead consumer drops the frame and
    /// keeps the loop alive.
    fn process_frame(&mut self, frame: Frame) -> bool {
        let hands = match self.extractor.detect(&frame) {
            Ok(hands) => hands,
            Err(err) => {
                log::warn!("landmark extraction failed: {err:?}");
                return true;
            }
        };
        // No hands is a frequent, valid result: no vector, no inference.
        let Some(hand) = hands
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        else {
            return true;
        };

        let features = match features::flatten(hand) {
            Ok(vector) => vector,
            Err(err) => {
                log::debug!("skipping frame: {err}");
                return true;
            }
        };

        match self.admission.try_admit(Instant::now()) {
            Admission::Accepted => {}
            Admission::Dropped(reason) => {
                log::trace!("frame dropped at admission: {reason:?}");
                return true;
            }
        }
        let (result, advisory) = self.mode.infer(&features, frame.timestamp);
        self.admission.complete();

        if let Some(advisory) = advisory {
            if !self.emit(PipelineEvent::Advisory(advisory)) {
                return false;
            }
        }

        let prediction = match result {
            Ok(prediction) => {
                self.loading_notified = false;
                prediction
            }
            Err(InferError::BackendUnavailable) => {
                if !self.loading_notified {
                    self.loading_notified = true;
                    return self.emit(PipelineEvent::BackendLoading);
                }
                return true;
            }
            Err(InferError::Network(err)) => {
                log::warn!("inference call failed: {err}");
                return true;
            }
        };

        if !self.emit(PipelineEvent::Prediction(prediction.clone())) {
            return false;
        }

        let (attempt, events) = self.practice.observe(&prediction);
        if let Some(attempt) = attempt {
            let mastered = events
                .iter()
                .any(|event| matches!(event, PracticeEvent::Mastered { .. }));
            // The terminal progress update always reaches the recorder;
            // ordinary attempts are thinned by the write throttle.
            if mastered {
                self.recorder.record_now(&attempt, Instant::now());
            } else {
                self.recorder.record(&attempt, Instant::now());
            }
        }
        for event in events {
            if !self.emit(PipelineEvent::Practice(event)) {
                return false;
            }
        }
        true
    }

    fn emit(&self, event: PipelineEvent) -> bool {
        self.event_tx.send(event).is_ok()
    }
}

/// Freshest-frame-wins: a backlog means we fell behind, and stale landmark
/// data has no value once a newer frame exists.
fn drain_to_freshest(frame_rx: &Receiver<Frame>, first: Frame) -> Frame {
    let mut frame = first;
    while let Ok(newer) = frame_rx.try_recv() {
        frame = newer;
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_keeps_only_the_newest_frame() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let stamp = Instant::now();
        for i in 0..3u32 {
            tx.send(Frame {
                rgba: vec![i as u8],
                width: 1,
                height: 1,
                timestamp: stamp,
            })
            .unwrap();
        }

        let first = rx.recv().unwrap();
        let freshest = drain_to_freshest(&rx, first);
        assert_eq!(freshest.rgba, vec![2]);
        assert!(rx.try_recv().is_err());
    }
}
