//! Classifier training on the landmark feature table.

mod data;
mod forest;
mod metrics;
mod split;
mod trainer;

pub use data::{load_dataset, LabeledData};
pub use forest::{ForestParams, RandomForest};
pub use metrics::EvaluationSummary;
pub use split::{stratified_split, Split};
pub use trainer::{ClassPrediction, ModelTrainer, TrainedModel, TrainingReport, TEST_FRACTION};
