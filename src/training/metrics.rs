use std::fmt::{self, Write};

/// Held-out evaluation of a trained model
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationSummary {
    /// Fraction of correct predictions in `0.0..=1.0`
    pub accuracy: f64,
    /// Labels present in either the truth or the predictions, in class order
    pub labels: Vec<String>,
    /// `confusion_matrix[true][predicted]`, indexed like `labels`
    pub confusion_matrix: Vec<Vec<usize>>,
    /// Precision/recall/F1/support table
    pub classification_report: String,
}

#[derive(Debug, Clone, Copy, Default)]
struct ClassScores {
    precision: f64,
    recall: f64,
    f1: f64,
    support: usize,
}

/// `num / den`, or 0 when the denominator is 0
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl EvaluationSummary {
    /// Score predictions against the truth; both hold indices into `class_names`
    pub fn evaluate(class_names: &[String], y_true: &[usize], y_pred: &[usize]) -> Self {
        let mut present: Vec<usize> = y_true.iter().chain(y_pred).copied().collect();
        present.sort_unstable();
        present.dedup();

        let position = |class: usize| present.binary_search(&class).unwrap_or_default();
        let mut matrix = vec![vec![0usize; present.len()]; present.len()];
        for (&t, &p) in y_true.iter().zip(y_pred) {
            matrix[position(t)][position(p)] += 1;
        }

        let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
        let accuracy = ratio(correct, y_true.len());
        let labels: Vec<String> = present
            .iter()
            .map(|&c| class_names.get(c).cloned().unwrap_or_else(|| c.to_string()))
            .collect();

        let scores: Vec<ClassScores> = (0..present.len())
            .map(|i| {
                let tp = matrix[i][i];
                let support: usize = matrix[i].iter().sum();
                let predicted: usize = matrix.iter().map(|row| row[i]).sum();
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassScores {
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        let classification_report = render_report(&labels, &scores, accuracy, y_true.len());

        Self {
            accuracy,
            labels,
            confusion_matrix: matrix,
            classification_report,
        }
    }

    /// Accuracy as a percentage with two decimals, e.g. `97.50%`
    pub fn accuracy_percent(&self) -> String {
        format!("{:.2}%", self.accuracy * 100.0)
    }

    /// Matrix rendered row by row with right-aligned cells
    pub fn confusion_matrix_text(&self) -> String {
        let width = self
            .confusion_matrix
            .iter()
            .flatten()
            .map(|v| v.to_string().len())
            .max()
            .unwrap_or(1);

        let rows: Vec<String> = self
            .confusion_matrix
            .iter()
            .map(|row| {
                let cells: Vec<String> = row.iter().map(|v| format!("{:>width$}", v)).collect();
                format!("[{}]", cells.join(" "))
            })
            .collect();
        format!("[{}]", rows.join("\n "))
    }
}

impl fmt::Display for EvaluationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Accuracy: {}", self.accuracy_percent())?;
        writeln!(f, "Classification report:\n{}", self.classification_report)?;
        write!(f, "Confusion matrix:\n{}", self.confusion_matrix_text())
    }
}

fn render_report(labels: &[String], scores: &[ClassScores], accuracy: f64, total: usize) -> String {
    let name_width = labels
        .iter()
        .map(String::len)
        .chain(["weighted avg".len()])
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>w$} {:>9} {:>9} {:>9} {:>9}\n",
        "",
        "precision",
        "recall",
        "f1-score",
        "support",
        w = name_width
    );
    for (label, s) in labels.iter().zip(scores) {
        let _ = writeln!(
            out,
            "{:>w$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
            label,
            s.precision,
            s.recall,
            s.f1,
            s.support,
            w = name_width
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:>w$} {:>9} {:>9} {:>9.2} {:>9}",
        "accuracy",
        "",
        "",
        accuracy,
        total,
        w = name_width
    );

    let n = scores.len().max(1) as f64;
    let mut macro_avg = [0.0f64; 3];
    let mut weighted_avg = [0.0f64; 3];
    for s in scores {
        for (i, value) in [s.precision, s.recall, s.f1].into_iter().enumerate() {
            macro_avg[i] += value / n;
            if total > 0 {
                weighted_avg[i] += value * s.support as f64 / total as f64;
            }
        }
    }

    for (name, avg) in [("macro avg", macro_avg), ("weighted avg", weighted_avg)] {
        let _ = writeln!(
            out,
            "{:>w$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
            name,
            avg[0],
            avg[1],
            avg[2],
            total,
            w = name_width
        );
    }

    out
}
