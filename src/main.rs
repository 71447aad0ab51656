use anyhow::{Context, Result};
use crossbeam_channel::{bounded, unbounded};

use sign_tutor::{
    InferenceMode, PerformanceMode, PipelineEvent, PipelineSettings, SignLabel,
    backend::{InferenceBackend, LocalBackend, RemoteBackend},
    extractor::OrtLandmarkExtractor,
    model_fetch::{self, ModelKind},
    practice::{MasteryConfig, MasteryTracker, PracticeEvent, PracticeSession},
    recorder::{HttpRecorder, MemoryRecorder, SessionRecorder},
};

fn main() -> Result<()> {
    env_logger::init();

    let target: SignLabel = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "A".to_string())
        .parse()?;

    let mut settings = PipelineSettings::preset(PerformanceMode::Balanced);
    if let Ok(endpoint) = std::env::var("SIGN_TUTOR_REMOTE_URL") {
        settings = settings
            .with_mode(InferenceMode::Remote)
            .with_remote_endpoint(endpoint);
    }

    let backend: Box<dyn InferenceBackend> = match settings.mode {
        InferenceMode::Local => {
            let local = LocalBackend::new(model_fetch::default_model_path(ModelKind::SignClassifier));
            local.warm_up();
            Box::new(local)
        }
        InferenceMode::Remote => {
            let endpoint = settings
                .remote_endpoint
                .clone()
                .context("remote mode requires SIGN_TUTOR_REMOTE_URL")?;
            Box::new(RemoteBackend::new(endpoint)?)
        }
    };

    let recorder: Box<dyn SessionRecorder> = match std::env::var("SIGN_TUTOR_PROGRESS_URL") {
        Ok(endpoint) => Box::new(HttpRecorder::new(endpoint)?),
        Err(_) => Box::new(MemoryRecorder::default()),
    };

    let extractor = Box::new(OrtLandmarkExtractor::with_default_model()?);
    let practice = PracticeSession::Mastery(MasteryTracker::new(
        target,
        MasteryConfig {
            mastery_goal: settings.mastery_goal,
            min_confidence: settings.min_confidence,
        },
    ));

    let (frame_tx, frame_rx) = bounded(1);
    let (event_tx, event_rx) = unbounded();

    #[allow(unused_mut)]
    let mut handle = sign_tutor::pipeline::start(
        settings.clone(),
        extractor,
        backend,
        practice,
        recorder,
        frame_rx,
        event_tx,
    );

    #[cfg(feature = "camera-nokhwa")]
    {
        use sign_tutor::capture;

        let cameras = capture::available_cameras()?;
        let device = cameras
            .first()
            .context("no camera available")?;
        log::info!("capturing from {}", device.label);
        let stream = capture::start_camera_stream(device.index.clone(), &settings, frame_tx)?;
        handle.attach_camera(stream);
    }
    #[cfg(not(feature = "camera-nokhwa"))]
    // No frame source in camera-less builds; keep the channel open so the
    // worker idles instead of exiting.
    let _frame_source = frame_tx;

    println!("practice target: {target} (mastery at {} in a row)", settings.mastery_goal);
    for event in event_rx {
        match event {
            PipelineEvent::Prediction(prediction) => {
                println!(
                    "saw {} ({:.0}%)",
                    prediction.label,
                    prediction.confidence * 100.0
                );
            }
            PipelineEvent::BackendLoading => println!("classifier is loading..."),
            PipelineEvent::Advisory(advisory) => println!("advisory: {advisory:?}"),
            PipelineEvent::Practice(PracticeEvent::Mastered { session }) => {
                println!(
                    "mastered {} after {} attempts ({} correct)",
                    session.target, session.total_attempts, session.total_correct
                );
                break;
            }
            PipelineEvent::Practice(event) => println!("{event:?}"),
        }
    }

    handle.shutdown();
    Ok(())
}
