use crate::error::{Result, TrainingError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices of a train/test partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

fn split_error(details: String) -> crate::error::SignlabError {
    TrainingError::Split { details }.into()
}

/// Shuffled split that keeps each class's share in the test set.
///
/// The test size is `ceil(test_fraction * n)`. Every class needs at least two
/// members, and both sides must be able to hold one row per class.
pub fn stratified_split(
    labels: &[usize],
    n_classes: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<Split> {
    let n = labels.len();
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (row, &label) in labels.iter().enumerate() {
        members
            .get_mut(label)
            .ok_or_else(|| split_error(format!("label index {} outside {} classes", label, n_classes)))?
            .push(row);
    }

    if let Some(smallest) = members.iter().map(Vec::len).min() {
        if smallest < 2 {
            return Err(split_error(format!(
                "the least populated class has only {} member(s); every class needs at least 2",
                smallest
            )));
        }
    }

    let n_test = (test_fraction * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_test < n_classes {
        return Err(split_error(format!(
            "test size {} is smaller than the number of classes {}",
            n_test, n_classes
        )));
    }
    if n_train < n_classes {
        return Err(split_error(format!(
            "train size {} is smaller than the number of classes {}",
            n_train, n_classes
        )));
    }

    // Proportional allocation, leftover rows by largest remainder (lowest class first on ties)
    let mut allocation: Vec<usize> = Vec::with_capacity(n_classes);
    let mut remainders: Vec<(f64, usize)> = Vec::with_capacity(n_classes);
    for (class, rows) in members.iter().enumerate() {
        let exact = n_test as f64 * rows.len() as f64 / n as f64;
        allocation.push(exact.floor() as usize);
        remainders.push((exact - exact.floor(), class));
    }
    remainders.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    let mut leftover = n_test - allocation.iter().sum::<usize>();
    for &(_, class) in &remainders {
        if leftover == 0 {
            break;
        }
        if allocation[class] < members[class].len() - 1 {
            allocation[class] += 1;
            leftover -= 1;
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n_test);
    for (rows, take) in members.iter_mut().zip(&allocation) {
        rows.shuffle(&mut rng);
        test.extend_from_slice(&rows[..*take]);
        train.extend_from_slice(&rows[*take..]);
    }
    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    Ok(Split { train, test })
}
