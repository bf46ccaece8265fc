use super::commands::{apply_collect_command, key_help, CommandEffect};
use super::keyboard_input::KeyboardInputHandler;
use super::reporter::{print_line, EventReporter};
use super::types::{Session, ShellCommand, ShellMode, ShutdownReason};
use crate::camera::CameraOpener;
use crate::collection::{CapturePipeline, CollectorSettings, DirectoryRepository};
use crate::config::{LandmarkConfig, SignlabConfig};
use crate::credentials::{CredentialStore, LoginOutcome};
use crate::dataset::DatasetBuilder;
use crate::error::{CredentialError, Result, SignlabError};
use crate::events::{EventBus, EventFilter, EventReceiver, TaskOutcome};
use crate::inference::{InferencePipeline, PredictionOverlay};
use crate::landmarks::{DetectionMode, HandLandmarker, MockLandmarker, SubprocessLandmarker};
use crate::task::BackgroundTask;
use crate::training::ModelTrainer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How often a waiting shell checks whether its background task has ended
const TASK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Where hand landmarks come from
#[derive(Debug, Clone)]
enum LandmarkSource {
    Helper(LandmarkConfig),
    Mock,
}

/// Runs one workflow at a time on behalf of the command line
pub struct Workflow {
    config: SignlabConfig,
    event_bus: EventBus,
    opener: Arc<dyn CameraOpener>,
    landmarks: LandmarkSource,
}

impl Workflow {
    pub fn new(config: SignlabConfig, event_bus: EventBus, opener: Arc<dyn CameraOpener>) -> Self {
        let landmarks = LandmarkSource::Helper(config.landmarks.clone());
        Self {
            config,
            event_bus,
            opener,
            landmarks,
        }
    }

    /// Use the built-in colour-based detector instead of the helper process
    pub fn with_mock_landmarks(mut self, mock: bool) -> Self {
        if mock {
            self.landmarks = LandmarkSource::Mock;
        }
        self
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    fn landmarker_factory(
        &self,
        mode: DetectionMode,
    ) -> impl FnOnce() -> Result<Box<dyn HandLandmarker>> + Send + 'static {
        let source = self.landmarks.clone();
        move || -> Result<Box<dyn HandLandmarker>> {
            match source {
                LandmarkSource::Helper(config) => {
                    Ok(Box::new(SubprocessLandmarker::spawn(&config, mode)?))
                }
                LandmarkSource::Mock => Ok(Box::new(MockLandmarker::new())),
            }
        }
    }

    fn read_retry(&self) -> Duration {
        Duration::from_millis(self.config.camera.read_retry_ms)
    }

    fn start_reporter(&self, token: &CancellationToken) -> JoinHandle<()> {
        let receiver = EventReceiver::new(
            self.event_bus.subscribe(),
            EventFilter::All,
            "shell-reporter".to_string(),
        );
        tokio::spawn(EventReporter::new().run(receiver, token.clone()))
    }

    pub async fn register(&self, username: &str, password: &str, confirm_password: &str) -> Result<()> {
        let store = CredentialStore::connect(&self.config.credentials)
            .await?
            .with_event_bus(self.event_bus.clone());
        let result = store.register(username, password, confirm_password).await;
        store.close().await;
        result
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let store = CredentialStore::connect(&self.config.credentials).await?;
        let outcome = store.verify(username, password).await;
        store.close().await;
        outcome
    }

    /// Log in; the collection, dataset, training and inference workflows need the session
    pub async fn open_session(&self, username: &str, password: &str) -> Result<Session> {
        match self.login(username, password).await? {
            LoginOutcome::Authenticated => {
                info!("Session opened for '{}'", username.trim());
                Ok(Session::new(username.trim().to_string()))
            }
            outcome => Err(CredentialError::LoginFailed {
                username: username.trim().to_string(),
                reason: outcome.message().to_string(),
            }
            .into()),
        }
    }

    /// Walk the image tree and write the landmark table
    pub async fn build_dataset(&self, session: &Session) -> Result<TaskOutcome> {
        info!("Building dataset for '{}'", session.username());
        let token = CancellationToken::new();
        let reporter = self.start_reporter(&token);

        let builder = DatasetBuilder::new(
            self.config.data_dir(),
            self.config.dataset_path(),
            self.event_bus.clone(),
        );
        let task = builder.spawn(self.landmarker_factory(DetectionMode::Static))?;
        let outcome = wait_for_task(task).await;

        token.cancel();
        let _ = reporter.await;
        outcome
    }

    pub async fn train(&self, session: &Session) -> Result<TaskOutcome> {
        info!("Training model for '{}'", session.username());
        let token = CancellationToken::new();
        let reporter = self.start_reporter(&token);

        let trainer = ModelTrainer::new(
            self.config.dataset_path(),
            self.config.model_path(),
            self.event_bus.clone(),
        );
        let outcome = wait_for_task(trainer.spawn()?).await;

        token.cancel();
        let _ = reporter.await;
        outcome
    }

    /// Interactive image collection until the operator quits
    pub async fn collect(&self, session: &Session) -> Result<ShutdownReason> {
        info!("Collecting images for '{}'", session.username());
        let token = CancellationToken::new();
        let reporter = self.start_reporter(&token);

        let repository = DirectoryRepository::new(self.config.data_dir());
        let pipeline = CapturePipeline::start(
            Arc::clone(&self.opener),
            Arc::new(repository),
            CollectorSettings::default(),
            self.event_bus.clone(),
            self.read_retry(),
        )?;
        print_line(key_help(ShellMode::Collect));

        let (sender, mut commands) = mpsc::unbounded_channel();
        let mut keyboard = KeyboardInputHandler::new(ShellMode::Collect, sender);
        keyboard.start();

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut poll = tokio::time::interval(TASK_POLL_INTERVAL);

        let reason = loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Received SIGINT signal (Ctrl+C)");
                    break ShutdownReason::Signal("SIGINT".to_string());
                }
                command = commands.recv() => {
                    let Some(command) = command else {
                        break ShutdownReason::UserRequest;
                    };
                    match apply_collect_command(pipeline.collector(), command) {
                        Ok(CommandEffect::Quit) => break ShutdownReason::UserRequest,
                        Ok(CommandEffect::Continue(Some(message))) => print_line(&message),
                        Ok(CommandEffect::Continue(None)) => {}
                        Err(e) => error!("Command {:?} failed: {}", command, e),
                    }
                }
                _ = poll.tick() => {
                    if pipeline.camera_finished() {
                        break ShutdownReason::PipelineEnded("camera stopped".to_string());
                    }
                }
            }
        };

        info!("Collection ending: {:?}", reason);
        keyboard.stop().await;
        tokio::task::spawn_blocking(move || pipeline.shutdown())
            .await
            .map_err(|e| SignlabError::system(format!("capture shutdown failed: {}", e)))?;

        token.cancel();
        let _ = reporter.await;
        Ok(reason)
    }

    /// Live recognition until the operator quits or the loop fails to start
    pub async fn infer(&self, session: &Session) -> Result<TaskOutcome> {
        info!("Starting recognition for '{}'", session.username());
        let token = CancellationToken::new();
        let reporter = self.start_reporter(&token);

        let pipeline = InferencePipeline::start(
            self.config.model_path(),
            Arc::clone(&self.opener),
            self.landmarker_factory(DetectionMode::Video),
            PredictionOverlay::from_config(&self.config.inference),
            self.event_bus.clone(),
            self.read_retry(),
        )?;
        print_line(key_help(ShellMode::Infer));

        let (sender, mut commands) = mpsc::unbounded_channel();
        let mut keyboard = KeyboardInputHandler::new(ShellMode::Infer, sender);
        keyboard.start();

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut poll = tokio::time::interval(TASK_POLL_INTERVAL);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Received SIGINT signal (Ctrl+C)");
                    break;
                }
                command = commands.recv() => {
                    if matches!(command, Some(ShellCommand::Quit) | None) {
                        break;
                    }
                }
                _ = poll.tick() => {
                    if pipeline.is_finished() {
                        break;
                    }
                }
            }
        }

        keyboard.stop().await;
        let stats = pipeline.stats();
        let outcome = tokio::task::spawn_blocking(move || pipeline.stop())
            .await
            .map_err(|e| SignlabError::system(format!("inference shutdown failed: {}", e)))?
            .ok_or_else(|| SignlabError::component("inference", "worker thread panicked"))?;
        if stats.skipped_mismatch > 0 {
            warn!(
                "{} frames were skipped because the model expects a different feature count",
                stats.skipped_mismatch
            );
        }

        token.cancel();
        let _ = reporter.await;
        Ok(outcome)
    }
}

/// Wait for a background task; Ctrl+C cancels it and still waits for its outcome
async fn wait_for_task(task: BackgroundTask<TaskOutcome>) -> Result<TaskOutcome> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while !task.is_finished() {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Received SIGINT signal, cancelling {}", task.name());
                task.cancel();
                break;
            }
            _ = tokio::time::sleep(TASK_POLL_INTERVAL) => {}
        }
    }

    let name = task.name().to_string();
    tokio::task::spawn_blocking(move || task.join())
        .await
        .map_err(|e| SignlabError::system(format!("{} join failed: {}", name, e)))?
        .ok_or_else(|| SignlabError::component(name, "worker thread panicked".to_string()))
}
