use crate::dataset::{sort_labels, LABEL_COLUMN};
use crate::error::{Result, TrainingError};
use std::path::Path;
use tracing::debug;

/// Feature table loaded for training
#[derive(Debug, Clone)]
pub struct LabeledData {
    pub feature_names: Vec<String>,
    pub features: Vec<Vec<f32>>,
    pub labels: Vec<String>,
}

impl LabeledData {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Distinct labels in natural order
    pub fn classes(&self) -> Vec<String> {
        let mut classes = self.labels.clone();
        classes.sort();
        classes.dedup();
        sort_labels(&mut classes);
        classes
    }

    /// Label of every row as an index into `classes`
    pub fn encode(&self, classes: &[String]) -> Vec<usize> {
        self.labels
            .iter()
            .map(|label| classes.iter().position(|c| c == label).unwrap_or_default())
            .collect()
    }
}

/// Read the feature table, separating the label column from the features
pub fn load_dataset(path: &Path) -> Result<LabeledData> {
    let path_text = path.display().to_string();
    if !path.exists() {
        return Err(TrainingError::MissingDataset { path: path_text }.into());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(TrainingError::EmptyDataset { path: path_text }.into());
    }

    let label_index = headers
        .iter()
        .position(|h| h.trim() == LABEL_COLUMN)
        .ok_or_else(|| TrainingError::MissingLabelColumn {
            path: path_text.clone(),
        })?;
    let feature_names: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != label_index)
        .map(|(_, h)| h.to_string())
        .collect();

    let mut features = Vec::new();
    let mut labels = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let mut values = Vec::with_capacity(feature_names.len());
        for (i, field) in record.iter().enumerate() {
            if i == label_index {
                continue;
            }
            let value = field.trim().parse::<f32>().map_err(|e| TrainingError::MalformedRow {
                row: row + 1,
                details: format!("column {}: {:?}: {}", i, field, e),
            })?;
            values.push(value);
        }

        let label = record
            .get(label_index)
            .map(|l| l.trim().to_string())
            .unwrap_or_default();
        features.push(values);
        labels.push(label);
    }

    if features.is_empty() {
        return Err(TrainingError::EmptyDataset { path: path_text }.into());
    }

    debug!(
        "Loaded {} rows with {} features from {}",
        features.len(),
        feature_names.len(),
        path_text
    );
    Ok(LabeledData {
        feature_names,
        features,
        labels,
    })
}
