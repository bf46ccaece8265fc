use super::labels::{color_for_letter, letter_for_class};
use super::overlay::PredictionOverlay;
use crate::camera::{CameraOpener, VideoSource};
use crate::error::Result;
use crate::events::{EventBus, FrameSource, PipelineEvent, TaskKind, TaskOutcome};
use crate::frame::Frame;
use crate::landmarks::HandLandmarker;
use crate::task::BackgroundTask;
use crate::training::TrainedModel;
use image::RgbImage;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type LandmarkerFactory = Box<dyn FnOnce() -> Result<Box<dyn HandLandmarker>> + Send>;

#[derive(Default)]
struct InferenceStats {
    frames: AtomicU64,
    predictions: AtomicU64,
    skipped_mismatch: AtomicU64,
}

/// Counters of a running or finished inference loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceStatsSnapshot {
    pub frames: u64,
    pub predictions: u64,
    pub skipped_mismatch: u64,
}

/// Per-frame work: detect, classify, annotate
struct FrameAnnotator {
    model: TrainedModel,
    landmarker: Box<dyn HandLandmarker>,
    overlay: PredictionOverlay,
    event_bus: EventBus,
    stats: Arc<InferenceStats>,
}

impl FrameAnnotator {
    /// Returns the image to show: annotated when a prediction was made
    fn process(&mut self, frame: &Frame) -> RgbImage {
        let mut image = (*frame.image).clone();

        let hand = match self.landmarker.detect(&image) {
            Ok(Some(hand)) => hand,
            Ok(None) => return image,
            Err(e) => {
                warn!("Hand detection failed on frame {}: {}", frame.id, e);
                return image;
            }
        };

        let features = hand.wrist_relative_features();
        let Some(prediction) = self.model.predict(&features) else {
            warn!(
                "Model expects {} features but frame {} produced {}",
                self.model.n_features(),
                frame.id,
                features.len()
            );
            self.stats.skipped_mismatch.fetch_add(1, Ordering::Relaxed);
            return image;
        };

        let letter = letter_for_class(&prediction.class);
        let color = color_for_letter(letter);
        let bbox = hand.bounding_box(image.width(), image.height());
        let text = format!("{} ({:.2})", letter, prediction.confidence);
        self.overlay.draw_skeleton(&mut image, &hand);
        self.overlay.annotate(&mut image, bbox, &text, color);

        debug!("Frame {}: {}", frame.id, text);
        self.stats.predictions.fetch_add(1, Ordering::Relaxed);
        self.event_bus.publish(PipelineEvent::Prediction {
            label: letter.to_string(),
            confidence: prediction.confidence,
        });
        image
    }
}

/// Live capture, landmark detection, classification and annotation on one thread
pub struct InferencePipeline {
    task: BackgroundTask<TaskOutcome>,
    stats: Arc<InferenceStats>,
}

impl InferencePipeline {
    /// Spawn the loop. The model is loaded first, then the landmarker is created,
    /// then the camera is opened; any failure ends the task with a failed outcome.
    pub fn start<F>(
        model_path: PathBuf,
        opener: Arc<dyn CameraOpener>,
        make_landmarker: F,
        overlay: PredictionOverlay,
        event_bus: EventBus,
        read_retry: Duration,
    ) -> Result<Self>
    where
        F: FnOnce() -> Result<Box<dyn HandLandmarker>> + Send + 'static,
    {
        let stats = Arc::new(InferenceStats::default());
        let worker_stats = Arc::clone(&stats);
        let make_landmarker: LandmarkerFactory = Box::new(make_landmarker);

        let task = BackgroundTask::spawn("inference", move |token| {
            let outcome = run_inference(
                model_path,
                opener,
                make_landmarker,
                overlay,
                event_bus.clone(),
                read_retry,
                worker_stats,
                &token,
            );
            event_bus.publish(PipelineEvent::TaskFinished {
                task: TaskKind::Inference,
                outcome: outcome.clone(),
            });
            outcome
        })?;

        Ok(Self { task, stats })
    }

    pub fn stats(&self) -> InferenceStatsSnapshot {
        InferenceStatsSnapshot {
            frames: self.stats.frames.load(Ordering::Relaxed),
            predictions: self.stats.predictions.load(Ordering::Relaxed),
            skipped_mismatch: self.stats.skipped_mismatch.load(Ordering::Relaxed),
        }
    }

    /// True once the loop has ended on its own (setup failure)
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the loop and wait until the camera is released
    pub fn stop(self) -> Option<TaskOutcome> {
        info!("Stopping inference");
        self.task.stop()
    }

    /// Wait for a loop that ended on its own
    pub fn join(self) -> Option<TaskOutcome> {
        self.task.join()
    }
}

#[allow(clippy::too_many_arguments)]
fn run_inference(
    model_path: PathBuf,
    opener: Arc<dyn CameraOpener>,
    make_landmarker: LandmarkerFactory,
    overlay: PredictionOverlay,
    event_bus: EventBus,
    read_retry: Duration,
    stats: Arc<InferenceStats>,
    token: &CancellationToken,
) -> TaskOutcome {
    info!("Loading model from {}", model_path.display());
    let model = match TrainedModel::load(&model_path) {
        Ok(model) => model,
        Err(e) => {
            return TaskOutcome::failure(format!(
                "Failed to load model '{}': {}",
                model_path.display(),
                e
            ))
        }
    };
    info!(
        "Model loaded: {} classes, {} features, trained {}",
        model.classes.len(),
        model.n_features(),
        model.trained_at.to_rfc3339()
    );

    let landmarker = match make_landmarker() {
        Ok(landmarker) => landmarker,
        Err(e) => return TaskOutcome::failure(format!("Failed to start hand detector: {}", e)),
    };

    let mut source: Box<dyn VideoSource> = match opener.open() {
        Ok(source) => source,
        Err(e) => {
            event_bus.publish(PipelineEvent::CameraStatusChanged { connected: false });
            return TaskOutcome::failure(format!("Failed to open camera: {}", e));
        }
    };
    event_bus.publish(PipelineEvent::CameraStatusChanged { connected: true });
    info!("Inference loop started");

    let mut annotator = FrameAnnotator {
        model,
        landmarker,
        overlay,
        event_bus: event_bus.clone(),
        stats: Arc::clone(&stats),
    };

    while !token.is_cancelled() {
        let frame = match source.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Error reading camera frame: {}", e);
                std::thread::sleep(read_retry);
                continue;
            }
        };

        let image = annotator.process(&frame);
        stats.frames.fetch_add(1, Ordering::Relaxed);
        event_bus.publish(PipelineEvent::FrameReady {
            source: FrameSource::Inference,
            frame: Frame::new(frame.id, frame.timestamp, image),
        });
    }

    drop(source);
    event_bus.publish(PipelineEvent::CameraStatusChanged { connected: false });
    info!("Camera released, inference stopped");

    let frames = stats.frames.load(Ordering::Relaxed);
    let predictions = stats.predictions.load(Ordering::Relaxed);
    TaskOutcome::success(format!(
        "Inference stopped after {} frames ({} predictions)",
        frames, predictions
    ))
}
