use super::*;
use crate::error::{DatasetError, SignlabError};
use crate::events::{EventBus, EventFilter, EventReceiver, PipelineEvent, TaskKind};
use crate::landmarks::{HandLandmarker, MockLandmarker};
use image::{Rgb, RgbImage};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn write_image(dir: &Path, name: &str, color: [u8; 3]) {
    fs::create_dir_all(dir).unwrap();
    RgbImage::from_pixel(16, 16, Rgb(color))
        .save(dir.join(name))
        .unwrap();
}

fn populate(root: &Path) {
    write_image(&root.join("0"), "md_lb_0.jpg", [200, 40, 40]);
    write_image(&root.join("0"), "md_lb_0_flipped.jpg", [200, 40, 40]);
    write_image(&root.join("0"), "md_lb_1.jpg", [0, 0, 0]);
    write_image(&root.join("1"), "md_lb_0.jpg", [40, 200, 40]);
    fs::write(root.join("1").join("md_lb_1.jpg"), b"corrupt").unwrap();
    fs::write(root.join("1").join("notes.txt"), b"ignored").unwrap();
}

#[test]
fn test_sort_labels_naturally() {
    let mut numeric = vec!["10".to_string(), "2".to_string(), "0".to_string()];
    sort_labels(&mut numeric);
    assert_eq!(numeric, vec!["0", "2", "10"]);

    let mut mixed = vec!["b".to_string(), "10".to_string(), "a".to_string()];
    sort_labels(&mut mixed);
    assert_eq!(mixed, vec!["10", "a", "b"]);
}

#[test]
fn test_build_writes_rows_and_report() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    let output = temp_dir.path().join("dataset.csv");
    populate(&data_dir);

    let event_bus = EventBus::new(64);
    let mut receiver = EventReceiver::new(
        event_bus.subscribe(),
        EventFilter::EventTypes(vec!["progress"]),
        "dataset-test".to_string(),
    );
    let builder = DatasetBuilder::new(&data_dir, &output, event_bus);
    let mut landmarker = MockLandmarker::new();

    let report = builder
        .build(&mut landmarker, &CancellationToken::new())
        .unwrap();

    assert_eq!(report.images, 5);
    assert_eq!(report.rows, 3);
    assert_eq!(report.skipped_no_hand, 1);
    assert_eq!(report.skipped_unreadable, 1);
    assert_eq!(report.classes, vec!["0", "1"]);
    assert_eq!(landmarker.calls(), 4);

    let content = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], table_header().join(","));
    assert!(lines[1].ends_with(",0"));
    assert!(lines[3].ends_with(",1"));
    // Wrist-relative: the first three values are zero
    assert!(lines[1].starts_with("0,0,0,"));

    let percents: Vec<u8> = receiver
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            PipelineEvent::Progress {
                task: TaskKind::DatasetBuild,
                percent,
            } => Some(percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_missing_root() {
    let temp_dir = TempDir::new().unwrap();
    let builder = DatasetBuilder::new(
        temp_dir.path().join("missing"),
        temp_dir.path().join("dataset.csv"),
        EventBus::new(8),
    );

    let result = builder.build(&mut MockLandmarker::new(), &CancellationToken::new());
    assert!(matches!(
        result,
        Err(SignlabError::Dataset(DatasetError::MissingRoot { .. }))
    ));
}

#[test]
fn test_no_classes_and_no_images() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(data_dir.join("readme.txt"), b"x").unwrap();
    let builder = DatasetBuilder::new(&data_dir, temp_dir.path().join("dataset.csv"), EventBus::new(8));

    let result = builder.build(&mut MockLandmarker::new(), &CancellationToken::new());
    assert!(matches!(
        result,
        Err(SignlabError::Dataset(DatasetError::NoClasses { .. }))
    ));

    fs::create_dir_all(data_dir.join("0")).unwrap();
    let result = builder.build(&mut MockLandmarker::new(), &CancellationToken::new());
    assert!(matches!(
        result,
        Err(SignlabError::Dataset(DatasetError::NoImages { .. }))
    ));
}

#[test]
fn test_no_rows_leaves_no_file() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    let output = temp_dir.path().join("dataset.csv");
    write_image(&data_dir.join("0"), "md_lb_0.jpg", [0, 0, 0]);

    let builder = DatasetBuilder::new(&data_dir, &output, EventBus::new(8));
    let result = builder.build(&mut MockLandmarker::new(), &CancellationToken::new());

    assert!(matches!(
        result,
        Err(SignlabError::Dataset(DatasetError::NoRows { images: 1 }))
    ));
    assert!(!output.exists());
}

#[test]
fn test_cancelled_build_leaves_no_file() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    let output = temp_dir.path().join("dataset.csv");
    populate(&data_dir);

    let token = CancellationToken::new();
    token.cancel();
    let builder = DatasetBuilder::new(&data_dir, &output, EventBus::new(8));
    let result = builder.build(&mut MockLandmarker::new(), &token);

    assert!(matches!(
        result,
        Err(SignlabError::Dataset(DatasetError::Cancelled))
    ));
    assert!(!output.exists());
}

#[test]
fn test_spawned_build_reports_outcome() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    let output = temp_dir.path().join("dataset.csv");
    populate(&data_dir);

    let event_bus = EventBus::new(64);
    let mut receiver = EventReceiver::new(
        event_bus.subscribe(),
        EventFilter::EventTypes(vec!["task_finished"]),
        "dataset-test".to_string(),
    );

    let task = DatasetBuilder::new(&data_dir, &output, event_bus)
        .spawn(|| Ok(Box::new(MockLandmarker::new()) as Box<dyn HandLandmarker>))
        .unwrap();
    let outcome = task.join().unwrap();

    assert!(outcome.success, "{}", outcome.message);
    assert!(outcome.message.contains("3 rows"));
    assert!(output.exists());
    assert_eq!(receiver.drain().len(), 1);
}

#[test]
fn test_spawned_build_reports_helper_failure() {
    let temp_dir = TempDir::new().unwrap();
    let task = DatasetBuilder::new(
        temp_dir.path(),
        temp_dir.path().join("dataset.csv"),
        EventBus::new(8),
    )
    .spawn(|| Err(SignlabError::landmarks("helper missing")))
    .unwrap();

    let outcome = task.join().unwrap();
    assert!(!outcome.success);
    assert!(outcome.message.contains("helper missing"));
}
