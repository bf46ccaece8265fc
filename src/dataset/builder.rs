use super::sort_labels;
use super::table::{write_table, FeatureRow};
use crate::error::{DatasetError, Result};
use crate::events::{EventBus, PipelineEvent, TaskKind, TaskOutcome};
use crate::landmarks::HandLandmarker;
use crate::task::BackgroundTask;
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Summary of a finished dataset build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetReport {
    pub output: PathBuf,
    pub images: usize,
    pub rows: usize,
    pub skipped_unreadable: usize,
    pub skipped_no_hand: usize,
    pub classes: Vec<String>,
}

impl DatasetReport {
    pub fn summary(&self) -> String {
        format!(
            "Dataset created: {} rows from {} images across {} classes ({} unreadable, {} without a hand) -> {}",
            self.rows,
            self.images,
            self.classes.len(),
            self.skipped_unreadable,
            self.skipped_no_hand,
            self.output.display()
        )
    }
}

struct ClassImages {
    label: String,
    images: Vec<PathBuf>,
}

/// Turns the class-indexed image tree into the landmark feature table
pub struct DatasetBuilder {
    data_dir: PathBuf,
    output: PathBuf,
    event_bus: EventBus,
}

impl DatasetBuilder {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(data_dir: P, output: Q, event_bus: EventBus) -> Self {
        Self {
            data_dir: data_dir.into(),
            output: output.into(),
            event_bus,
        }
    }

    fn scan(&self) -> Result<Vec<ClassImages>> {
        let root_display = self.data_dir.display().to_string();
        let is_empty = match fs::read_dir(&self.data_dir) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        };
        if is_empty {
            return Err(DatasetError::MissingRoot { path: root_display }.into());
        }

        let mut labels = Vec::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                labels.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        if labels.is_empty() {
            return Err(DatasetError::NoClasses { path: root_display }.into());
        }
        sort_labels(&mut labels);

        let mut classes = Vec::with_capacity(labels.len());
        for label in labels {
            let images = list_images(&self.data_dir.join(&label))?;
            classes.push(ClassImages { label, images });
        }

        if classes.iter().all(|c| c.images.is_empty()) {
            return Err(DatasetError::NoImages { path: root_display }.into());
        }
        Ok(classes)
    }

    /// Run landmark extraction over every image; the table is written only on success
    pub fn build(
        &self,
        landmarker: &mut dyn HandLandmarker,
        token: &CancellationToken,
    ) -> Result<DatasetReport> {
        info!("Building dataset from {}", self.data_dir.display());
        let classes = self.scan()?;
        let total: usize = classes.iter().map(|c| c.images.len()).sum();

        let mut rows = Vec::new();
        let mut processed = 0usize;
        let mut skipped_unreadable = 0usize;
        let mut skipped_no_hand = 0usize;
        let mut last_percent = None;

        for class in &classes {
            for path in &class.images {
                if token.is_cancelled() {
                    warn!("Dataset build cancelled after {} images", processed);
                    return Err(DatasetError::Cancelled.into());
                }

                match image::open(path) {
                    Ok(image) => match landmarker.detect(&image.to_rgb8())? {
                        Some(hand) => rows.push(FeatureRow {
                            features: hand.wrist_relative_features(),
                            label: class.label.clone(),
                        }),
                        None => {
                            warn!("No hand detected in {}", path.display());
                            skipped_no_hand += 1;
                        }
                    },
                    Err(e) => {
                        warn!("Could not load image {}: {}", path.display(), e);
                        skipped_unreadable += 1;
                    }
                }

                processed += 1;
                let percent = (processed * 100 / total) as u8;
                if last_percent != Some(percent) {
                    last_percent = Some(percent);
                    self.event_bus.publish(PipelineEvent::Progress {
                        task: TaskKind::DatasetBuild,
                        percent,
                    });
                }
                debug!("Processed {} from class '{}'", path.display(), class.label);
            }
        }

        if rows.is_empty() {
            return Err(DatasetError::NoRows { images: total }.into());
        }

        write_table(&self.output, &rows)?;

        Ok(DatasetReport {
            output: self.output.clone(),
            images: total,
            rows: rows.len(),
            skipped_unreadable,
            skipped_no_hand,
            classes: classes.into_iter().map(|c| c.label).collect(),
        })
    }

    /// Build on a background thread; the landmarker is created on that thread.
    ///
    /// The outcome is returned from the task and published as `TaskFinished`.
    pub fn spawn<F>(self, make_landmarker: F) -> Result<BackgroundTask<TaskOutcome>>
    where
        F: FnOnce() -> Result<Box<dyn HandLandmarker>> + Send + 'static,
    {
        BackgroundTask::spawn("dataset-builder", move |token| {
            let result = make_landmarker()
                .and_then(|mut landmarker| self.build(landmarker.as_mut(), &token));

            let outcome = match result {
                Ok(report) => TaskOutcome::success(report.summary()),
                Err(e) => TaskOutcome::failure(format!("Dataset creation failed: {}", e)),
            };
            self.event_bus.publish(PipelineEvent::TaskFinished {
                task: TaskKind::DatasetBuild,
                outcome: outcome.clone(),
            });
            outcome
        })
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_jpg = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".jpg"));
        if is_jpg && path.is_file() {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}
