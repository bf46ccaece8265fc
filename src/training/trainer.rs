use super::data::load_dataset;
use super::forest::{argmax, ForestParams, RandomForest};
use super::metrics::EvaluationSummary;
use super::split::stratified_split;
use crate::error::{Result, TrainingError};
use crate::events::{EventBus, PipelineEvent, TaskKind, TaskOutcome};
use crate::task::BackgroundTask;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Share of rows held out for evaluation
pub const TEST_FRACTION: f64 = 0.2;

/// Classifier artifact persisted after training
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub classes: Vec<String>,
    pub feature_names: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub forest: RandomForest,
}

/// A single classification
#[derive(Debug, Clone, PartialEq)]
pub struct ClassPrediction {
    pub class_index: usize,
    pub class: String,
    pub confidence: f32,
}

impl TrainedModel {
    pub fn n_features(&self) -> usize {
        self.forest.n_features()
    }

    /// Most probable class and its probability; `None` when the vector has the wrong length
    pub fn predict(&self, features: &[f32]) -> Option<ClassPrediction> {
        if features.len() != self.n_features() {
            return None;
        }
        let proba = self.forest.predict_proba(features);
        let class_index = argmax(&proba);
        Some(ClassPrediction {
            class_index,
            class: self.classes.get(class_index).cloned().unwrap_or_default(),
            confidence: proba[class_index],
        })
    }

    /// Write as JSON, replacing any previous model only once fully written
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let staging = path.with_extension("json.tmp");
        let json = serde_json::to_vec(self)?;
        fs::write(&staging, json)?;
        fs::rename(&staging, path)?;
        info!("Model saved to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let model: Self = serde_json::from_slice(&bytes)?;
        debug!(
            "Loaded model with {} classes and {} features from {}",
            model.classes.len(),
            model.n_features(),
            path.display()
        );
        Ok(model)
    }
}

/// Result of a successful training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub classes: Vec<String>,
    pub evaluation: EvaluationSummary,
    pub model_path: PathBuf,
}

/// Loads the feature table, fits the forest, evaluates and persists the model
pub struct ModelTrainer {
    dataset_path: PathBuf,
    model_path: PathBuf,
    params: ForestParams,
    event_bus: EventBus,
}

impl ModelTrainer {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(
        dataset_path: P,
        model_path: Q,
        event_bus: EventBus,
    ) -> Self {
        Self {
            dataset_path: dataset_path.into(),
            model_path: model_path.into(),
            params: ForestParams::default(),
            event_bus,
        }
    }

    pub fn with_params(mut self, params: ForestParams) -> Self {
        self.params = params;
        self
    }

    fn progress(&self, percent: u8) {
        self.event_bus.publish(PipelineEvent::Progress {
            task: TaskKind::Training,
            percent,
        });
    }

    /// Validate, split, fit, evaluate and save; nothing is written on failure
    pub fn train(&self) -> Result<TrainingReport> {
        info!("Loading dataset from {}", self.dataset_path.display());
        let data = load_dataset(&self.dataset_path)?;

        let classes = data.classes();
        if classes.len() < 2 {
            return Err(TrainingError::TooFewClasses {
                found: classes.len(),
            }
            .into());
        }
        if data.len() < 2 {
            return Err(TrainingError::TooFewRows { found: data.len() }.into());
        }
        self.progress(10);

        let y = data.encode(&classes);
        let split = stratified_split(&y, classes.len(), TEST_FRACTION, self.params.seed)?;
        let pick = |rows: &[usize]| -> (Vec<Vec<f32>>, Vec<usize>) {
            rows.iter()
                .map(|&i| (data.features[i].clone(), y[i]))
                .unzip()
        };
        let (x_train, y_train) = pick(&split.train);
        let (x_test, y_test) = pick(&split.test);
        info!(
            "Training on {} rows, evaluating on {} rows ({} classes)",
            x_train.len(),
            x_test.len(),
            classes.len()
        );
        self.progress(20);

        let started = Instant::now();
        let forest = RandomForest::fit(&x_train, &y_train, classes.len(), &self.params)?;
        info!(
            "Fitted {} trees in {:.1}s",
            self.params.n_trees,
            started.elapsed().as_secs_f32()
        );
        self.progress(80);

        let y_pred: Vec<usize> = x_test.iter().map(|row| forest.predict(row)).collect();
        let evaluation = EvaluationSummary::evaluate(&classes, &y_test, &y_pred);
        info!("Model accuracy: {}", evaluation.accuracy_percent());
        info!("Classification report:\n{}", evaluation.classification_report);
        info!("Confusion matrix:\n{}", evaluation.confusion_matrix_text());
        self.progress(90);

        let model = TrainedModel {
            classes: classes.clone(),
            feature_names: data.feature_names.clone(),
            trained_at: Utc::now(),
            forest,
        };
        model.save(&self.model_path)?;
        self.progress(100);

        Ok(TrainingReport {
            rows: data.len(),
            train_rows: x_train.len(),
            test_rows: x_test.len(),
            classes,
            evaluation,
            model_path: self.model_path.clone(),
        })
    }

    /// `train` with every error and panic turned into a failed outcome
    pub fn run(&self) -> TaskOutcome {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.train()));
        let outcome = match result {
            Ok(Ok(report)) => TaskOutcome::success(format!(
                "Model trained successfully, accuracy {} ({} rows), saved to {}",
                report.evaluation.accuracy_percent(),
                report.rows,
                report.model_path.display()
            ))
            .with_evaluation(report.evaluation),
            Ok(Err(e)) => TaskOutcome::failure(format!("Model training failed: {}", e)),
            Err(_) => TaskOutcome::failure("Model training failed: unexpected internal error"),
        };

        self.event_bus.publish(PipelineEvent::TaskFinished {
            task: TaskKind::Training,
            outcome: outcome.clone(),
        });
        outcome
    }

    pub fn spawn(self) -> Result<BackgroundTask<TaskOutcome>> {
        BackgroundTask::spawn("model-trainer", move |_token| self.run())
    }
}
