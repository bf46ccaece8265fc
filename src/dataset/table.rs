use crate::error::Result;
use crate::landmarks::feature_columns;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the label column in the feature table
pub const LABEL_COLUMN: &str = "label";

/// One labelled feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub features: Vec<f32>,
    pub label: String,
}

/// Header of the feature table: landmark columns followed by the label
pub fn table_header() -> Vec<String> {
    let mut header = feature_columns();
    header.push(LABEL_COLUMN.to_string());
    header
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "dataset.csv".into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write the table next to `path` and move it into place once complete
pub fn write_table(path: &Path, rows: &[FeatureRow]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let staging = staging_path(path);
    let result = write_rows(&staging, rows);
    if let Err(e) = result {
        let _ = fs::remove_file(&staging);
        return Err(e);
    }

    fs::rename(&staging, path)?;
    info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

fn write_rows(path: &Path, rows: &[FeatureRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table_header())?;

    for row in rows {
        let mut record: Vec<String> = row.features.iter().map(|v| v.to_string()).collect();
        record.push(row.label.clone());
        writer.write_record(&record)?;
    }

    writer.flush()?;
    debug!("Staged feature table at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_header_layout() {
        let header = table_header();
        assert_eq!(header.len(), 64);
        assert_eq!(header[0], "x0");
        assert_eq!(header[62], "z20");
        assert_eq!(header[63], "label");
    }

    #[test]
    fn test_write_table_replaces_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out").join("dataset.csv");
        let rows = vec![FeatureRow {
            features: vec![0.5; 63],
            label: "3".to_string(),
        }];

        write_table(&path, &rows).unwrap();
        write_table(&path, &rows).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("x0,y0,z0,x1"));
        assert!(lines[1].ends_with(",0.5,3"));
        assert!(!staging_path(&path).exists());
    }
}
