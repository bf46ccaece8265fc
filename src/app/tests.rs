use super::*;
use crate::camera::SyntheticCameraOpener;
use crate::collection::{Collector, CollectorSettings, DirectoryRepository, COLLECTION_MODES};
use crate::config::SignlabConfig;
use crate::credentials::LoginOutcome;
use crate::error::{CredentialError, SignlabError};
use crate::events::{EventBus, FrameSource, PipelineEvent, TaskKind};
use crate::frame::Frame;
use crate::frame_slot::FrameSlot;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use image::{Rgb, RgbImage};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn start_collector(root: &Path, target: usize) -> Collector {
    let settings = CollectorSettings {
        modes: COLLECTION_MODES.to_vec(),
        target,
        cooldown: Duration::from_millis(2),
    };
    Collector::start(
        settings,
        Arc::new(DirectoryRepository::new(root)),
        FrameSlot::new(),
        EventBus::new(64),
    )
    .unwrap()
}

fn continue_message(effect: CommandEffect) -> String {
    match effect {
        CommandEffect::Continue(Some(message)) => message,
        other => panic!("Unexpected effect: {:?}", other),
    }
}

fn test_config(root: &Path) -> SignlabConfig {
    let mut config = SignlabConfig::default();
    config.collection.data_dir = root.join("data").display().to_string();
    config.dataset.path = root.join("dataset.csv").display().to_string();
    config.model.path = root.join("model.json").display().to_string();
    config.credentials.database_url = format!("sqlite://{}", root.join("users.db").display());
    config.credentials.bcrypt_cost = 4;
    config.inference.font_path = root.join("missing.ttf").display().to_string();
    config
}

fn workflow(config: SignlabConfig) -> Workflow {
    Workflow::new(
        config,
        EventBus::new(256),
        Arc::new(SyntheticCameraOpener::new(32, 24, 100)),
    )
    .with_mock_landmarks(true)
}

async fn logged_in(workflow: &Workflow) -> Session {
    workflow
        .register("ana", "password123", "password123")
        .await
        .unwrap();
    workflow.open_session("ana", "password123").await.unwrap()
}

#[test]
fn test_collect_key_bindings() {
    let mode = ShellMode::Collect;
    assert_eq!(command_for_key(mode, key(KeyCode::Char(' '))), Some(ShellCommand::ToggleCapture));
    assert_eq!(command_for_key(mode, key(KeyCode::Char('m'))), Some(ShellCommand::NextMode));
    assert_eq!(command_for_key(mode, key(KeyCode::Char('n'))), Some(ShellCommand::NextClass));
    assert_eq!(command_for_key(mode, key(KeyCode::Char('p'))), Some(ShellCommand::PrevClass));
    assert_eq!(command_for_key(mode, key(KeyCode::Char('r'))), Some(ShellCommand::ResetMode));
    assert_eq!(command_for_key(mode, key(KeyCode::Char('s'))), Some(ShellCommand::ShowStatus));
    assert_eq!(command_for_key(mode, key(KeyCode::Char('q'))), Some(ShellCommand::Quit));
    assert_eq!(command_for_key(mode, key(KeyCode::Char('x'))), None);
}

#[test]
fn test_infer_key_bindings() {
    let mode = ShellMode::Infer;
    assert_eq!(command_for_key(mode, key(KeyCode::Char('q'))), Some(ShellCommand::Quit));
    assert_eq!(command_for_key(mode, key(KeyCode::Esc)), Some(ShellCommand::Quit));
    assert_eq!(command_for_key(mode, key(KeyCode::Char(' '))), None);
    assert_eq!(command_for_key(mode, key(KeyCode::Char('r'))), None);

    let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
    assert_eq!(command_for_key(mode, ctrl_c), Some(ShellCommand::Quit));
    assert_eq!(command_for_key(mode, key(KeyCode::Char('c'))), None);
}

#[test]
fn test_collect_commands_drive_collector() {
    let temp_dir = TempDir::new().unwrap();
    let collector = start_collector(temp_dir.path(), 5);

    let message = continue_message(apply_collect_command(&collector, ShellCommand::ToggleCapture).unwrap());
    assert!(message.starts_with("Capturing class 0 / right_hand_good_light"));
    assert!(collector.is_capturing());

    let message = continue_message(apply_collect_command(&collector, ShellCommand::ToggleCapture).unwrap());
    assert!(message.starts_with("Paused at"));
    assert!(!collector.is_capturing());

    let message = continue_message(apply_collect_command(&collector, ShellCommand::NextMode).unwrap());
    assert_eq!(message, "Class 0 / right_hand_poor_light: 0/5");

    let message = continue_message(apply_collect_command(&collector, ShellCommand::PrevClass).unwrap());
    assert_eq!(message, "Class 0 / right_hand_poor_light: 0/5");

    let message = continue_message(apply_collect_command(&collector, ShellCommand::NextClass).unwrap());
    assert_eq!(message, "Class 1 / right_hand_good_light: 0/5");
    assert!(temp_dir.path().join("1").is_dir());

    let message = continue_message(apply_collect_command(&collector, ShellCommand::ShowStatus).unwrap());
    assert!(message.starts_with("=== Class 1 status ==="));

    let message = continue_message(apply_collect_command(&collector, ShellCommand::ResetMode).unwrap());
    assert_eq!(message, "Deleted 0 files of class 1 / right_hand_good_light");

    assert_eq!(
        apply_collect_command(&collector, ShellCommand::Quit).unwrap(),
        CommandEffect::Quit
    );
    collector.shutdown();
}

#[test]
fn test_toggle_refused_for_complete_mode() {
    let temp_dir = TempDir::new().unwrap();
    let class_dir = temp_dir.path().join("0");
    fs::create_dir_all(&class_dir).unwrap();
    for name in ["md_lb_0.jpg", "md_lb_1.jpg"] {
        RgbImage::from_pixel(4, 4, Rgb([90, 90, 90]))
            .save(class_dir.join(name))
            .unwrap();
    }

    let collector = start_collector(temp_dir.path(), 2);
    let message = continue_message(apply_collect_command(&collector, ShellCommand::ToggleCapture).unwrap());
    assert!(message.contains("already complete"));
    assert!(!collector.is_capturing());
    collector.shutdown();
}

#[test]
fn test_reporter_filters_noise() {
    let mut reporter = EventReporter::new();

    let frame = PipelineEvent::FrameReady {
        source: FrameSource::Inference,
        frame: Frame::new(1, SystemTime::now(), RgbImage::new(2, 2)),
    };
    assert!(reporter.line_for(&frame).is_none());

    let prediction = |label: &str| PipelineEvent::Prediction {
        label: label.to_string(),
        confidence: 0.9,
    };
    assert_eq!(reporter.line_for(&prediction("A")).unwrap(), "Sign: A (0.90)");
    assert!(reporter.line_for(&prediction("A")).is_none());
    assert!(reporter.line_for(&prediction("B")).is_some());

    let progress = PipelineEvent::Progress {
        task: TaskKind::Training,
        percent: 20,
    };
    assert_eq!(reporter.line_for(&progress).unwrap(), "training: 20%");
    assert!(reporter.line_for(&progress).is_none());

    let status = |count: usize, capturing: bool| PipelineEvent::CaptureStatus {
        class_id: 0,
        mode: "right_hand_good_light".to_string(),
        count,
        target: 1000,
        capturing,
    };
    assert!(reporter.line_for(&status(7, true)).is_none());
    assert!(reporter.line_for(&status(50, true)).is_some());
    assert!(reporter.line_for(&status(7, false)).is_some());

    let finished = PipelineEvent::ClassCompleted {
        class_id: 3,
        total_images: 4000,
    };
    assert!(reporter.line_for(&finished).unwrap().contains("class 3"));
}

#[tokio::test]
async fn test_train_without_dataset_fails() {
    let temp_dir = TempDir::new().unwrap();
    let workflow = workflow(test_config(temp_dir.path()));
    let session = logged_in(&workflow).await;

    let outcome = workflow.train(&session).await.unwrap();
    assert!(!outcome.success);
    assert!(outcome.message.contains("does not exist"));
    assert!(!temp_dir.path().join("model.json").exists());
}

#[tokio::test]
async fn test_build_dataset_then_train() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    for (class, base) in [("0", [200u8, 40, 40]), ("1", [40, 40, 200])] {
        let dir = data_dir.join(class);
        fs::create_dir_all(&dir).unwrap();
        for i in 0..6u8 {
            let color = base.map(|c| c.saturating_add(i * 4));
            RgbImage::from_pixel(16, 16, Rgb(color))
                .save(dir.join(format!("md_lb_{}.jpg", i)))
                .unwrap();
        }
    }
    let workflow = workflow(test_config(temp_dir.path()));
    let session = logged_in(&workflow).await;

    let outcome = workflow.build_dataset(&session).await.unwrap();
    assert!(outcome.success, "{}", outcome.message);
    assert!(outcome.message.contains("12 rows"));
    assert!(temp_dir.path().join("dataset.csv").exists());

    let outcome = workflow.train(&session).await.unwrap();
    assert!(outcome.success, "{}", outcome.message);
    let evaluation = outcome.evaluation.unwrap();
    assert_eq!(evaluation.labels, vec!["0", "1"]);
    assert!(temp_dir.path().join("model.json").exists());
}

#[tokio::test]
async fn test_infer_without_model_ends_immediately() {
    let temp_dir = TempDir::new().unwrap();
    let workflow = workflow(test_config(temp_dir.path()));
    let session = logged_in(&workflow).await;

    let outcome = workflow.infer(&session).await.unwrap();
    assert!(!outcome.success);
    assert!(outcome.message.contains("Failed to load model"));
}

#[tokio::test]
async fn test_register_and_login() {
    let temp_dir = TempDir::new().unwrap();
    let workflow = workflow(test_config(temp_dir.path()));

    workflow
        .register("ana", "password123", "password123")
        .await
        .unwrap();
    let err = workflow
        .register("ana", "password123", "password123")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SignlabError::Credential(CredentialError::UserExists { .. })
    ));

    assert_eq!(
        workflow.login("ana", "password123").await.unwrap(),
        LoginOutcome::Authenticated
    );
    assert_eq!(
        workflow.login("ana", "wrong-password").await.unwrap(),
        LoginOutcome::WrongPassword
    );
    assert_eq!(
        workflow.login("nobody", "password123").await.unwrap(),
        LoginOutcome::UnknownUser
    );
}

#[tokio::test]
async fn test_session_requires_successful_login() {
    let temp_dir = TempDir::new().unwrap();
    let workflow = workflow(test_config(temp_dir.path()));

    let err = workflow.open_session("ana", "password123").await.unwrap_err();
    assert!(matches!(
        err,
        SignlabError::Credential(CredentialError::LoginFailed { ref reason, .. })
            if reason == "User does not exist"
    ));

    let session = logged_in(&workflow).await;
    assert_eq!(session.username(), "ana");

    let err = workflow.open_session("ana", "wrong-password").await.unwrap_err();
    assert!(matches!(
        err,
        SignlabError::Credential(CredentialError::LoginFailed { ref reason, .. })
            if reason == "Incorrect password"
    ));

    let session = workflow.open_session(" ana ", "password123").await.unwrap();
    assert_eq!(session.username(), "ana");
}

#[test]
fn test_key_help_mentions_every_binding() {
    let help = key_help(ShellMode::Collect);
    for binding in ["[space]", "[m]", "[n]", "[p]", "[r]", "[s]", "[q]"] {
        assert!(help.contains(binding), "{}", binding);
    }
    assert_eq!(key_help(ShellMode::Infer), "[q] quit");
}
