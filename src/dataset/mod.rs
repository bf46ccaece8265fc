//! Landmark feature table built from the collected images.

mod builder;
mod table;
#[cfg(test)]
mod tests;

pub use builder::{DatasetBuilder, DatasetReport};
pub use table::{table_header, write_table, FeatureRow, LABEL_COLUMN};

/// Sort labels numerically when all of them are integers, lexically otherwise
pub fn sort_labels(labels: &mut [String]) {
    let numeric: Option<Vec<i64>> = labels.iter().map(|l| l.parse().ok()).collect();
    match numeric {
        Some(_) => labels.sort_by_key(|l| l.parse::<i64>().unwrap_or_default()),
        None => labels.sort(),
    }
}
