pub mod app;
pub mod camera;
pub mod collection;
pub mod config;
pub mod credentials;
pub mod dataset;
pub mod error;
pub mod events;
pub mod frame;
pub mod frame_slot;
pub mod inference;
pub mod landmarks;
pub mod task;
pub mod training;

pub use app::{Session, ShellCommand, ShellMode, ShutdownReason, Workflow};
pub use camera::{CameraOpener, CameraOpenerBuilder, SyntheticCameraOpener, VideoSource};
pub use collection::{CapturePipeline, Collector, CollectorSettings, DirectoryRepository, ImageRepository};
pub use config::SignlabConfig;
pub use credentials::{CredentialStore, LoginOutcome};
pub use dataset::{DatasetBuilder, DatasetReport};
pub use error::{Result, SignlabError};
pub use events::{EventBus, EventFilter, EventReceiver, PipelineEvent, TaskKind, TaskOutcome};
pub use frame::Frame;
pub use frame_slot::FrameSlot;
pub use inference::{InferencePipeline, PredictionOverlay};
pub use landmarks::{HandLandmarker, HandLandmarks, MockLandmarker, SubprocessLandmarker};
pub use task::BackgroundTask;
pub use training::{EvaluationSummary, ModelTrainer, TrainedModel};
